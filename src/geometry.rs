//! Geometry values and geometry columns.
//!
//! A geometry value is a [`geo::Geometry<f64>`]. An empty geometry collection
//! stands in for a missing geometry, so a geometry column never has holes.

use crate::conversions::{empty_geometry, to_geo_geometry};
use crate::crs::Crs;
use crate::error::{Result, SfError};
use geo::{BoundingRect, Geometry, Rect};
use std::collections::BTreeSet;
use wkb::reader::Wkb;

pub const DEFAULT_GEOMETRY_COLUMN: &str = "geometry";

/// The closed set of simple-feature geometry kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> GeometryKind {
        match geometry {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryKind::Polygon
            }
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    pub fn is_areal(self) -> bool {
        matches!(self, GeometryKind::Polygon | GeometryKind::MultiPolygon)
    }
}

/// Bring `Line`, `Rect` and `Triangle` into the simple-features kinds.
pub fn normalize(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Line(line) => Geometry::LineString(line.into()),
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        Geometry::Triangle(triangle) => Geometry::Polygon(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => Geometry::GeometryCollection(
            collection.into_iter().map(normalize).collect(),
        ),
        other => other,
    }
}

/// Whether the geometry has no coordinates at all.
pub fn is_empty(geometry: &Geometry<f64>) -> bool {
    geometry.bounding_rect().is_none()
}

pub fn geometry_from_wkt(text: &str) -> Result<Geometry<f64>> {
    use wkt::TryFromWkt;

    let geometry = Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|err| SfError::Wkt(err.to_string()))?;
    Ok(normalize(geometry))
}

pub fn geometry_to_wkt(geometry: &Geometry<f64>) -> Result<String> {
    let mut out = String::new();
    wkt::to_wkt::write_geometry(&mut out, geometry).map_err(|err| SfError::Wkt(err.to_string()))?;
    Ok(out)
}

/// Decode ISO/OGC WKB. Z and M ordinates are dropped.
pub fn geometry_from_wkb(bytes: &[u8]) -> Result<Geometry<f64>> {
    let wkb = Wkb::try_new(bytes)?;
    Ok(to_geo_geometry(&wkb))
}

pub fn geometry_to_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    wkb::writer::write_geometry(&mut buf, geometry, &Default::default())?;
    Ok(buf)
}

/// The ordered sequence of geometries of a feature collection, one per row.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryColumn {
    pub name: String,
    pub crs: Crs,
    geometries: Vec<Geometry<f64>>,
}

impl GeometryColumn {
    pub fn new(name: impl Into<String>, crs: Crs, geometries: Vec<Geometry<f64>>) -> Self {
        Self {
            name: name.into(),
            crs,
            geometries: geometries.into_iter().map(normalize).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Geometry<f64>> {
        self.geometries.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Geometry<f64>> {
        self.geometries.iter()
    }

    pub fn as_slice(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn into_geometries(self) -> Vec<Geometry<f64>> {
        self.geometries
    }

    pub fn push(&mut self, geometry: Geometry<f64>) {
        self.geometries.push(normalize(geometry));
    }

    /// Select geometries by row index. Indices may repeat.
    pub fn take(&self, indices: &[usize]) -> GeometryColumn {
        GeometryColumn {
            name: self.name.clone(),
            crs: self.crs.clone(),
            geometries: indices
                .iter()
                .map(|&idx| self.geometries[idx].clone())
                .collect(),
        }
    }

    /// Like [`GeometryColumn::take`], with `None` producing an empty geometry.
    pub(crate) fn take_optional(&self, indices: &[Option<usize>]) -> GeometryColumn {
        GeometryColumn {
            name: self.name.clone(),
            crs: self.crs.clone(),
            geometries: indices
                .iter()
                .map(|idx| match idx {
                    Some(idx) => self.geometries[*idx].clone(),
                    None => empty_geometry(),
                })
                .collect(),
        }
    }

    /// Replace every geometry, keeping name and CRS.
    pub fn map<F>(&self, f: F) -> GeometryColumn
    where
        F: FnMut(&Geometry<f64>) -> Geometry<f64>,
    {
        GeometryColumn::new(
            self.name.clone(),
            self.crs.clone(),
            self.geometries.iter().map(f).collect(),
        )
    }

    pub fn try_map<F>(&self, mut f: F) -> Result<GeometryColumn>
    where
        F: FnMut(&Geometry<f64>) -> Result<Geometry<f64>>,
    {
        let geometries = self
            .geometries
            .iter()
            .map(&mut f)
            .collect::<Result<Vec<_>>>()?;
        Ok(GeometryColumn::new(self.name.clone(), self.crs.clone(), geometries))
    }

    /// Distinct kinds present, ignoring empty geometries.
    pub fn kinds(&self) -> BTreeSet<GeometryKind> {
        self.geometries
            .iter()
            .filter(|geom| !is_empty(geom))
            .map(GeometryKind::of)
            .collect()
    }

    /// The single kind shared by all geometries, or `GeometryCollection` when mixed.
    pub fn dominant_kind(&self) -> GeometryKind {
        let kinds = self.kinds();
        match kinds.len() {
            1 => kinds
                .into_iter()
                .next()
                .unwrap_or(GeometryKind::GeometryCollection),
            _ => GeometryKind::GeometryCollection,
        }
    }

    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.geometries
            .iter()
            .filter_map(|geom| geom.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }

    /// Relabel the CRS without touching coordinates.
    pub fn set_crs(&mut self, crs: Crs) {
        self.crs = crs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, line_string, polygon};

    #[test]
    fn wkt_roundtrip_keeps_kind() -> crate::Result<()> {
        let geom = geometry_from_wkt("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))")?;
        assert_eq!(GeometryKind::of(&geom), GeometryKind::Polygon);
        let text = geometry_to_wkt(&geom)?;
        assert_eq!(geometry_from_wkt(&text)?, geom);
        Ok(())
    }

    #[test]
    fn invalid_wkt_is_an_error() {
        assert!(matches!(
            geometry_from_wkt("POINT (1"),
            Err(SfError::Wkt(_))
        ));
    }

    #[test]
    fn wkb_roundtrip() -> crate::Result<()> {
        let geom = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.5, y: 2.0)]);
        let bytes = geometry_to_wkb(&geom)?;
        assert_eq!(geometry_from_wkb(&bytes)?, geom);
        Ok(())
    }

    #[test]
    fn rect_is_normalized_to_polygon() {
        let rect = Rect::new(geo::coord! { x: 0.0, y: 0.0 }, geo::coord! { x: 1.0, y: 1.0 });
        let column = GeometryColumn::new("geom", Crs::Undefined, vec![Geometry::Rect(rect)]);
        assert_eq!(column.dominant_kind(), GeometryKind::Polygon);
    }

    #[test]
    fn mixed_kinds_and_bounding_box() {
        let column = GeometryColumn::new(
            "geom",
            Crs::Epsg(4326),
            vec![
                Geometry::Point(Point::new(-1.0, 5.0)),
                Geometry::Polygon(polygon![
                    (x: 0.0, y: 0.0),
                    (x: 2.0, y: 0.0),
                    (x: 2.0, y: 2.0),
                    (x: 0.0, y: 0.0)
                ]),
                empty_geometry(),
            ],
        );
        assert_eq!(column.kinds().len(), 2);
        assert_eq!(column.dominant_kind(), GeometryKind::GeometryCollection);

        let bbox = column.bounding_box().expect("non-empty column");
        assert_eq!(bbox.min(), geo::coord! { x: -1.0, y: 0.0 });
        assert_eq!(bbox.max(), geo::coord! { x: 2.0, y: 5.0 });
    }

    #[test]
    fn take_repeats_and_reorders() {
        let column = GeometryColumn::new(
            "geom",
            Crs::Undefined,
            vec![
                Geometry::Point(Point::new(0.0, 0.0)),
                Geometry::Point(Point::new(1.0, 1.0)),
            ],
        );
        let taken = column.take(&[1, 1, 0]);
        assert_eq!(taken.len(), 3);
        assert_eq!(taken.get(0), Some(&Geometry::Point(Point::new(1.0, 1.0))));
        assert_eq!(taken.get(2), Some(&Geometry::Point(Point::new(0.0, 0.0))));
    }
}
