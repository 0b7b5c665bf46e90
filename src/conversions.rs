use crate::error::SfError;
use crate::geometry::GeometryKind;
use crate::types::ColumnType;
use geo_traits::{
    CoordTrait, GeometryCollectionTrait, GeometryTrait, LineStringTrait, MultiLineStringTrait,
    MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait,
};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

#[inline]
pub(crate) fn geometry_kind_to_str(kind: GeometryKind) -> &'static str {
    match kind {
        GeometryKind::GeometryCollection => "GEOMETRYCOLLECTION",
        GeometryKind::Point => "POINT",
        GeometryKind::LineString => "LINESTRING",
        GeometryKind::Polygon => "POLYGON",
        GeometryKind::MultiPoint => "MULTIPOINT",
        GeometryKind::MultiLineString => "MULTILINESTRING",
        GeometryKind::MultiPolygon => "MULTIPOLYGON",
    }
}

#[inline]
pub(crate) fn geometry_kind_from_str(geometry_type_str: &str) -> Result<GeometryKind, SfError> {
    let s = geometry_type_str;
    if s.eq_ignore_ascii_case("GEOMETRY") || s.eq_ignore_ascii_case("GEOMETRYCOLLECTION") {
        Ok(GeometryKind::GeometryCollection)
    } else if s.eq_ignore_ascii_case("POINT") {
        Ok(GeometryKind::Point)
    } else if s.eq_ignore_ascii_case("LINESTRING") {
        Ok(GeometryKind::LineString)
    } else if s.eq_ignore_ascii_case("POLYGON") {
        Ok(GeometryKind::Polygon)
    } else if s.eq_ignore_ascii_case("MULTIPOINT") {
        Ok(GeometryKind::MultiPoint)
    } else if s.eq_ignore_ascii_case("MULTILINESTRING") {
        Ok(GeometryKind::MultiLineString)
    } else if s.eq_ignore_ascii_case("MULTIPOLYGON") {
        Ok(GeometryKind::MultiPolygon)
    } else {
        Err(SfError::UnsupportedGeometryType(
            geometry_type_str.to_string(),
        ))
    }
}

/// Whether a layer declaring `(z, m)` carries coordinates beyond XY.
#[inline]
pub(crate) fn has_extra_dimensions(z: i8, m: i8) -> Result<bool, SfError> {
    match (z, m) {
        (0, 0) => Ok(false),
        // z and m are 0 (prohibited), 1 (mandatory) or 2 (optional).
        (0..=2, 0..=2) => Ok(true),
        _ => Err(SfError::InvalidDimension { z, m }),
    }
}

#[inline]
pub(crate) fn column_type_to_str(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::Double => "DOUBLE",
        ColumnType::Varchar => "TEXT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Blob => "BLOB",
        ColumnType::Geometry => "GEOMETRY",
    }
}

#[inline]
pub(crate) fn column_type_from_str(column_type_str: &str) -> Option<ColumnType> {
    // Declared types may carry a length, e.g. TEXT(20).
    let s = column_type_str
        .split('(')
        .next()
        .unwrap_or(column_type_str)
        .trim();
    if s.eq_ignore_ascii_case("TINYINT")
        || s.eq_ignore_ascii_case("SMALLINT")
        || s.eq_ignore_ascii_case("MEDIUMINT")
        || s.eq_ignore_ascii_case("INT")
        || s.eq_ignore_ascii_case("INTEGER")
    {
        Some(ColumnType::Integer)
    } else if s.eq_ignore_ascii_case("DOUBLE")
        || s.eq_ignore_ascii_case("FLOAT")
        || s.eq_ignore_ascii_case("REAL")
    {
        Some(ColumnType::Double)
    } else if s.eq_ignore_ascii_case("TEXT")
        || s.eq_ignore_ascii_case("DATE")
        || s.eq_ignore_ascii_case("DATETIME")
    {
        Some(ColumnType::Varchar)
    } else if s.eq_ignore_ascii_case("BOOLEAN") {
        Some(ColumnType::Boolean)
    } else if s.eq_ignore_ascii_case("BLOB") {
        Some(ColumnType::Blob)
    } else if geometry_kind_from_str(s).is_ok() {
        Some(ColumnType::Geometry)
    } else {
        None
    }
}

/// Copy any `geo-traits` geometry into an owned XY `geo_types::Geometry`.
///
/// Z and M ordinates are dropped.
pub(crate) fn to_geo_geometry<G: GeometryTrait<T = f64>>(geom: &G) -> Geometry<f64> {
    use geo_traits::GeometryType as GeoType;

    match geom.as_type() {
        GeoType::Point(point) => point_to_geo(point)
            .map(Geometry::Point)
            .unwrap_or_else(empty_geometry),
        GeoType::LineString(line) => Geometry::LineString(line_string_to_geo(line)),
        GeoType::Polygon(poly) => Geometry::Polygon(polygon_to_geo(poly)),
        GeoType::MultiPoint(multi) => Geometry::MultiPoint(MultiPoint::new(
            multi.points().filter_map(|p| point_to_geo(&p)).collect(),
        )),
        GeoType::MultiLineString(multi) => Geometry::MultiLineString(MultiLineString::new(
            multi
                .line_strings()
                .map(|line| line_string_to_geo(&line))
                .collect(),
        )),
        GeoType::MultiPolygon(multi) => Geometry::MultiPolygon(MultiPolygon::new(
            multi.polygons().map(|poly| polygon_to_geo(&poly)).collect(),
        )),
        GeoType::GeometryCollection(collection) => {
            Geometry::GeometryCollection(GeometryCollection::new_from(
                collection
                    .geometries()
                    .map(|sub_geom| to_geo_geometry(&sub_geom))
                    .collect(),
            ))
        }
        GeoType::Rect(_) | GeoType::Triangle(_) | GeoType::Line(_) => {
            // No WKB geometry decodes to these.
            empty_geometry()
        }
    }
}

pub(crate) fn empty_geometry() -> Geometry<f64> {
    Geometry::GeometryCollection(GeometryCollection::new_from(Vec::new()))
}

fn coord_to_geo<C: CoordTrait<T = f64>>(coord: &C) -> Coord<f64> {
    let (x, y) = coord.x_y();
    Coord { x, y }
}

fn point_to_geo<P: PointTrait<T = f64>>(point: &P) -> Option<Point<f64>> {
    point.coord().map(|coord| Point::from(coord_to_geo(&coord)))
}

fn line_string_to_geo<L: LineStringTrait<T = f64>>(line: &L) -> LineString<f64> {
    LineString::new(line.coords().map(|coord| coord_to_geo(&coord)).collect())
}

fn polygon_to_geo<P: PolygonTrait<T = f64>>(poly: &P) -> Polygon<f64> {
    let exterior = poly
        .exterior()
        .map(|ring| line_string_to_geo(&ring))
        .unwrap_or_else(|| LineString::new(Vec::new()));
    let interiors = poly
        .interiors()
        .map(|ring| line_string_to_geo(&ring))
        .collect();
    Polygon::new(exterior, interiors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use wkt::Wkt;

    #[test]
    fn geometry_kind_names_roundtrip() -> crate::Result<()> {
        for kind in [
            GeometryKind::Point,
            GeometryKind::LineString,
            GeometryKind::Polygon,
            GeometryKind::MultiPoint,
            GeometryKind::MultiLineString,
            GeometryKind::MultiPolygon,
            GeometryKind::GeometryCollection,
        ] {
            assert_eq!(geometry_kind_from_str(geometry_kind_to_str(kind))?, kind);
        }
        assert!(geometry_kind_from_str("CURVEPOLYGON").is_err());
        Ok(())
    }

    #[test]
    fn column_type_accepts_sized_declarations() {
        assert_eq!(column_type_from_str("TEXT(20)"), Some(ColumnType::Varchar));
        assert_eq!(column_type_from_str("MULTIPOLYGON"), Some(ColumnType::Geometry));
        assert_eq!(column_type_from_str("NUMERIC"), None);
    }

    #[test]
    fn dimension_flags() {
        assert!(matches!(has_extra_dimensions(0, 0), Ok(false)));
        assert!(matches!(has_extra_dimensions(1, 0), Ok(true)));
        assert!(matches!(has_extra_dimensions(2, 2), Ok(true)));
        assert!(matches!(
            has_extra_dimensions(3, 0),
            Err(SfError::InvalidDimension { z: 3, m: 0 })
        ));
    }

    #[test]
    fn to_geo_drops_z() {
        let wkt = Wkt::<f64>::from_str("LINESTRING Z (0 0 5, 1 1 6)").expect("valid wkt");
        let geom = to_geo_geometry(&wkt);
        assert_eq!(
            geom,
            Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]))
        );
    }
}
