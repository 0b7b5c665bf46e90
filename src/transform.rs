//! Reprojection between coordinate reference systems.
//!
//! Longitude/latitude WGS84 and spherical Web Mercator convert in closed
//! form. Any other pair goes through PROJ when the `proj` feature is on.

use crate::collection::FeatureCollection;
use crate::crs::{Crs, WEB_MERCATOR, WGS84};
use crate::error::{Result, SfError};
use geo::{Coord, Geometry, MapCoords};

const EARTH_RADIUS: f64 = 6_378_137.0;
/// Latitude at which Web Mercator's square world ends.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// A coordinate operation from one CRS to another.
pub trait CoordTransform {
    fn convert(&self, coord: Coord<f64>) -> Result<Coord<f64>>;
}

struct LonLatToWebMercator;

impl CoordTransform for LonLatToWebMercator {
    fn convert(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let lat = coord
            .y
            .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
            .to_radians();
        Ok(Coord {
            x: EARTH_RADIUS * coord.x.to_radians(),
            y: EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln(),
        })
    }
}

struct WebMercatorToLonLat;

impl CoordTransform for WebMercatorToLonLat {
    fn convert(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let lat = 2.0 * (coord.y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2;
        Ok(Coord {
            x: (coord.x / EARTH_RADIUS).to_degrees(),
            y: lat.to_degrees(),
        })
    }
}

#[cfg(feature = "proj")]
struct ProjTransform(proj::Proj);

#[cfg(feature = "proj")]
impl CoordTransform for ProjTransform {
    fn convert(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = self.0.convert((coord.x, coord.y))?;
        Ok(Coord { x, y })
    }
}

fn is_wgs84(crs: &Crs) -> bool {
    crs.equivalent(&Crs::Epsg(WGS84))
}

/// Pick a transformer for `from -> to`. Equivalent CRS give `None`.
pub fn transformer(from: &Crs, to: &Crs) -> Result<Option<Box<dyn CoordTransform>>> {
    if !from.is_defined() || !to.is_defined() {
        return Err(SfError::UndefinedCrs);
    }
    if from.equivalent(to) {
        return Ok(None);
    }
    if is_wgs84(from) && to.epsg() == Some(WEB_MERCATOR) {
        log::debug!("built-in transform {from} -> {to}");
        return Ok(Some(Box::new(LonLatToWebMercator)));
    }
    if from.epsg() == Some(WEB_MERCATOR) && is_wgs84(to) {
        log::debug!("built-in transform {from} -> {to}");
        return Ok(Some(Box::new(WebMercatorToLonLat)));
    }
    proj_transformer(from, to)
}

#[cfg(feature = "proj")]
fn proj_transformer(from: &Crs, to: &Crs) -> Result<Option<Box<dyn CoordTransform>>> {
    let (Some(source), Some(target)) = (from.to_proj_string(), to.to_proj_string()) else {
        return Err(SfError::UndefinedCrs);
    };
    log::debug!("PROJ transform {source} -> {target}");
    let proj = proj::Proj::new_known_crs(&source, &target, None)?;
    Ok(Some(Box::new(ProjTransform(proj))))
}

#[cfg(not(feature = "proj"))]
fn proj_transformer(from: &Crs, to: &Crs) -> Result<Option<Box<dyn CoordTransform>>> {
    Err(SfError::UnsupportedTransform {
        from: from.to_string(),
        to: to.to_string(),
    })
}

fn apply(geometry: &Geometry<f64>, transform: &dyn CoordTransform) -> Result<Geometry<f64>> {
    geometry.try_map_coords(|coord| transform.convert(coord))
}

/// Reproject one geometry. Equivalent CRS return it unchanged.
pub fn transform_geometry(geometry: &Geometry<f64>, from: &Crs, to: &Crs) -> Result<Geometry<f64>> {
    match transformer(from, to)? {
        Some(transform) => apply(geometry, transform.as_ref()),
        None => Ok(geometry.clone()),
    }
}

impl FeatureCollection {
    /// Reproject every geometry to `to`.
    ///
    /// Transforming to an equivalent CRS returns the collection unchanged
    /// apart from the CRS label.
    pub fn transform(&self, to: &Crs) -> Result<FeatureCollection> {
        let Some(transform) = transformer(self.crs(), to)? else {
            return Ok(self.set_crs(to.clone()));
        };
        let mut geometry = self
            .geometry()
            .try_map(|geom| apply(geom, transform.as_ref()))?;
        geometry.set_crs(to.clone());
        self.with_geometry(geometry)
    }
}
