//! Coordinate reference systems.
//!
//! A [`Crs`] is metadata attached to a whole feature collection. It is
//! identified either by a registry code (`EPSG:4326`) or by a parameterised
//! projection string (`+proj=utm +zone=33 +datum=WGS84`).

use crate::error::SfError;
use std::fmt;
use std::str::FromStr;

pub const WGS84: u32 = 4326;
pub const WEB_MERCATOR: u32 = 3857;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Crs {
    Epsg(u32),
    Proj(String),
    #[default]
    Undefined,
}

impl Crs {
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Crs::Undefined)
    }

    /// Whether coordinates are longitude/latitude degrees.
    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::Epsg(code) => matches!(code, 4326 | 4269 | 4258 | 4267 | 4230),
            Crs::Proj(definition) => proj_tokens(definition)
                .iter()
                .any(|token| token == "+proj=longlat" || token == "+proj=latlong"),
            Crs::Undefined => false,
        }
    }

    /// Whether two CRS describe the same coordinate space.
    ///
    /// Projection strings are compared token-wise, ignoring order and
    /// `+no_defs`/`+type=crs`. A WGS84 longlat string matches `EPSG:4326`.
    pub fn equivalent(&self, other: &Crs) -> bool {
        match (self, other) {
            (Crs::Epsg(a), Crs::Epsg(b)) => a == b,
            (Crs::Proj(a), Crs::Proj(b)) => proj_tokens(a) == proj_tokens(b),
            (Crs::Epsg(code), Crs::Proj(definition))
            | (Crs::Proj(definition), Crs::Epsg(code)) => {
                *code == WGS84 && is_wgs84_longlat(definition)
            }
            (Crs::Undefined, Crs::Undefined) => true,
            _ => false,
        }
    }

    /// The identifier understood by PROJ.
    pub fn to_proj_string(&self) -> Option<String> {
        match self {
            Crs::Epsg(code) => Some(format!("EPSG:{code}")),
            Crs::Proj(definition) => Some(definition.clone()),
            Crs::Undefined => None,
        }
    }

    /// Map a `gpkg_spatial_ref_sys` row back to a CRS.
    ///
    /// Rows under the `PROJ` organization carry a projection string as their
    /// definition. Other non-EPSG organizations are treated as undefined.
    pub(crate) fn from_srs_row(
        organization: Option<&str>,
        code: i32,
        definition: Option<&str>,
    ) -> Crs {
        match (organization, definition) {
            (Some(org), Some(definition)) if org.eq_ignore_ascii_case(PROJ_ORGANIZATION) => {
                Crs::Proj(definition.to_string())
            }
            (Some(org), _) if !org.eq_ignore_ascii_case("EPSG") => Crs::Undefined,
            _ => Crs::from(code),
        }
    }
}

/// Organization name under which projection strings are stored in a GeoPackage.
pub(crate) const PROJ_ORGANIZATION: &str = "PROJ";

fn proj_tokens(definition: &str) -> Vec<String> {
    let mut tokens: Vec<String> = definition
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .filter(|token| token != "+no_defs" && token != "+type=crs" && token != "+wktext")
        .collect();
    tokens.sort();
    tokens
}

fn is_wgs84_longlat(definition: &str) -> bool {
    let tokens = proj_tokens(definition);
    let has = |needle: &str| tokens.iter().any(|token| token == needle);
    (has("+proj=longlat") || has("+proj=latlong"))
        && (has("+datum=wgs84") || has("+ellps=wgs84"))
        && tokens
            .iter()
            .all(|token| token.starts_with("+proj=") || token.starts_with("+datum=") || token.starts_with("+ellps="))
}

impl FromStr for Crs {
    type Err = SfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Crs::Undefined);
        }
        if trimmed.starts_with("+proj=") || trimmed.starts_with("+init=") {
            return Ok(Crs::Proj(trimmed.to_string()));
        }
        if let Ok(code) = trimmed.parse::<i64>() {
            return Ok(Crs::from(code));
        }

        let upper = trimmed.to_ascii_uppercase();
        if upper == "OGC:CRS84" || upper.ends_with("OGC:1.3:CRS84") || upper.ends_with("OGC::CRS84") {
            return Ok(Crs::Epsg(WGS84));
        }
        // EPSG:4326, urn:ogc:def:crs:EPSG::4326, urn:ogc:def:crs:EPSG:6.6:4326
        if upper.starts_with("EPSG:") || upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            if let Some(code) = upper.rsplit(':').next().and_then(|c| c.parse::<u32>().ok()) {
                return Ok(Crs::Epsg(code));
            }
        }

        Err(SfError::InvalidCrs(s.to_string()))
    }
}

impl From<u32> for Crs {
    fn from(code: u32) -> Self {
        if code == 0 {
            Crs::Undefined
        } else {
            Crs::Epsg(code)
        }
    }
}

impl From<i32> for Crs {
    fn from(code: i32) -> Self {
        Crs::from(i64::from(code))
    }
}

impl From<i64> for Crs {
    fn from(code: i64) -> Self {
        match u32::try_from(code) {
            Ok(code) => Crs::from(code),
            Err(_) => Crs::Undefined,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj(definition) => f.write_str(definition),
            Crs::Undefined => f.write_str("undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Crs;

    #[test]
    fn parses_registry_codes() -> crate::Result<()> {
        assert_eq!("4326".parse::<Crs>()?, Crs::Epsg(4326));
        assert_eq!("EPSG:3857".parse::<Crs>()?, Crs::Epsg(3857));
        assert_eq!("epsg:27700".parse::<Crs>()?, Crs::Epsg(27700));
        assert_eq!(
            "urn:ogc:def:crs:EPSG::4326".parse::<Crs>()?,
            Crs::Epsg(4326)
        );
        assert_eq!(
            "urn:ogc:def:crs:OGC:1.3:CRS84".parse::<Crs>()?,
            Crs::Epsg(4326)
        );
        Ok(())
    }

    #[test]
    fn parses_projection_strings_and_empty() -> crate::Result<()> {
        assert_eq!(
            "+proj=utm +zone=33 +datum=WGS84".parse::<Crs>()?,
            Crs::Proj("+proj=utm +zone=33 +datum=WGS84".to_string())
        );
        assert_eq!("".parse::<Crs>()?, Crs::Undefined);
        assert_eq!("-1".parse::<Crs>()?, Crs::Undefined);
        assert!("not a crs".parse::<Crs>().is_err());
        Ok(())
    }

    #[test]
    fn equivalence_ignores_token_order() {
        let a = Crs::Proj("+proj=utm +zone=33 +datum=WGS84 +no_defs".to_string());
        let b = Crs::Proj("+datum=WGS84 +proj=utm +zone=33".to_string());
        assert!(a.equivalent(&b));

        let longlat = Crs::Proj("+proj=longlat +datum=WGS84 +no_defs".to_string());
        assert!(longlat.equivalent(&Crs::Epsg(4326)));
        assert!(!longlat.equivalent(&Crs::Epsg(3857)));
        assert!(longlat.is_geographic());
    }

    #[test]
    fn srs_rows() {
        assert_eq!(Crs::from_srs_row(Some("EPSG"), 3857, None), Crs::Epsg(3857));
        assert_eq!(Crs::from_srs_row(Some("NONE"), -1, Some("undefined")), Crs::Undefined);
        assert_eq!(
            Crs::from_srs_row(Some("PROJ"), 100000, Some("+proj=utm +zone=33")),
            Crs::Proj("+proj=utm +zone=33".to_string())
        );
        assert_eq!(Crs::from_srs_row(None, 4326, None), Crs::Epsg(4326));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Crs::Epsg(4326).to_string(), "EPSG:4326");
        assert_eq!(Crs::Undefined.to_string(), "undefined");
    }
}
