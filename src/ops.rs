//! Geometry predicates, measures and geometry-producing operations.
//!
//! Everything is planar. Geographic coordinates are treated as plain x/y.

use crate::collection::{FeatureCollection, ensure_same_crs};
use crate::conversions::empty_geometry;
use crate::error::{Result, SfError};
use crate::geometry::{GeometryKind, is_empty};
use crate::table::{JoinBy, JoinKind, JoinPlan, assemble_join};
use geo::algorithm::bool_ops::BooleanOps;
use geo::algorithm::line_measures::Length;
use geo::algorithm::line_measures::metric_spaces::Euclidean;
use geo::{
    Area, BoundingRect, Buffer, Centroid, ConvexHull, Geometry, GeometryCollection, Intersects,
    LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Relate, Simplify,
};

/// Binary spatial predicates, evaluated through the DE-9IM matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpatialPredicate {
    Intersects,
    Disjoint,
    Contains,
    Within,
    Touches,
    Crosses,
    Overlaps,
    Covers,
    CoveredBy,
    Equals,
    /// Within the given planar distance of each other.
    DWithin(f64),
}

impl SpatialPredicate {
    pub fn evaluate(self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        // An empty geometry relates to nothing.
        if is_empty(a) || is_empty(b) {
            return matches!(self, SpatialPredicate::Disjoint);
        }
        match self {
            SpatialPredicate::Intersects => a.intersects(b),
            SpatialPredicate::Disjoint => !a.intersects(b),
            SpatialPredicate::DWithin(d) => distance(a, b) <= d,
            SpatialPredicate::Contains => a.relate(b).is_contains(),
            SpatialPredicate::Within => a.relate(b).is_within(),
            SpatialPredicate::Touches => a.relate(b).is_touches(),
            SpatialPredicate::Crosses => a.relate(b).is_crosses(),
            SpatialPredicate::Overlaps => a.relate(b).is_overlaps(),
            SpatialPredicate::Covers => a.relate(b).is_covers(),
            SpatialPredicate::CoveredBy => a.relate(b).is_coveredby(),
            SpatialPredicate::Equals => a.relate(b).is_equal_topo(),
        }
    }

    /// Whether two geometries whose bounding boxes do not meet can still satisfy the predicate.
    fn needs_disjoint_pairs(self) -> bool {
        matches!(self, SpatialPredicate::Disjoint | SpatialPredicate::DWithin(_))
    }
}

/// Planar unsigned area. Points and lines have area 0.
pub fn area(geometry: &Geometry<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Planar length of linear parts. Polygon perimeters do not count.
pub fn length(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::LineString(ls) => Euclidean.length(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().map(|ls| Euclidean.length(ls)).sum(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(length).sum(),
        _ => 0.0,
    }
}

/// Minimum planar distance; 0 when the geometries intersect.
///
/// Distance to an empty geometry is infinite.
pub fn distance(a: &Geometry<f64>, b: &Geometry<f64>) -> f64 {
    if is_empty(a) || is_empty(b) {
        return f64::INFINITY;
    }
    if a.intersects(b) {
        return 0.0;
    }
    let (parts_a, parts_b) = (primitives(a), primitives(b));
    parts_a
        .iter()
        .flat_map(|pa| parts_b.iter().map(move |pb| primitive_distance(pa, pb)))
        .fold(f64::INFINITY, f64::min)
}

enum Primitive<'a> {
    Point(Point<f64>),
    LineString(&'a LineString<f64>),
    Polygon(&'a Polygon<f64>),
}

fn primitives(geometry: &Geometry<f64>) -> Vec<Primitive<'_>> {
    let mut out = Vec::new();
    collect_primitives(geometry, &mut out);
    out
}

fn collect_primitives<'a>(geometry: &'a Geometry<f64>, out: &mut Vec<Primitive<'a>>) {
    match geometry {
        Geometry::Point(p) => out.push(Primitive::Point(*p)),
        Geometry::MultiPoint(mp) => out.extend(mp.0.iter().map(|p| Primitive::Point(*p))),
        Geometry::LineString(ls) => out.push(Primitive::LineString(ls)),
        Geometry::MultiLineString(mls) => out.extend(mls.0.iter().map(Primitive::LineString)),
        Geometry::Polygon(poly) => out.push(Primitive::Polygon(poly)),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().map(Primitive::Polygon)),
        Geometry::GeometryCollection(gc) => {
            for geom in gc.iter() {
                collect_primitives(geom, out);
            }
        }
        // Normalised away on entry.
        Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {}
    }
}

#[allow(deprecated)]
fn primitive_distance(a: &Primitive<'_>, b: &Primitive<'_>) -> f64 {
    use geo::algorithm::euclidean_distance::EuclideanDistance;

    match (a, b) {
        (Primitive::Point(pa), Primitive::Point(pb)) => pa.euclidean_distance(pb),
        (Primitive::Point(p), Primitive::LineString(ls))
        | (Primitive::LineString(ls), Primitive::Point(p)) => p.euclidean_distance(*ls),
        (Primitive::Point(p), Primitive::Polygon(poly))
        | (Primitive::Polygon(poly), Primitive::Point(p)) => p.euclidean_distance(*poly),
        (Primitive::LineString(la), Primitive::LineString(lb)) => la.euclidean_distance(*lb),
        (Primitive::LineString(ls), Primitive::Polygon(poly))
        | (Primitive::Polygon(poly), Primitive::LineString(ls)) => ls.euclidean_distance(*poly),
        (Primitive::Polygon(pa), Primitive::Polygon(pb)) => pa.euclidean_distance(*pb),
    }
}

fn empty_polygon() -> Geometry<f64> {
    Geometry::Polygon(Polygon::new(LineString::new(Vec::new()), Vec::new()))
}

/// A single polygon stays a polygon; several become a multi polygon.
fn polygonal(mut polygons: MultiPolygon<f64>) -> Geometry<f64> {
    match polygons.0.len() {
        0 => empty_polygon(),
        1 => polygons
            .0
            .pop()
            .map_or_else(empty_polygon, Geometry::Polygon),
        _ => Geometry::MultiPolygon(polygons),
    }
}

/// Expand (or shrink, for negative distances) a geometry.
pub fn buffer(geometry: &Geometry<f64>, distance: f64) -> Geometry<f64> {
    if is_empty(geometry) {
        return empty_polygon();
    }
    polygonal(geometry.buffer(distance))
}

pub fn centroid(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry
        .centroid()
        .map_or_else(empty_geometry, Geometry::Point)
}

pub fn convex_hull(geometry: &Geometry<f64>) -> Geometry<f64> {
    if is_empty(geometry) {
        return empty_polygon();
    }
    Geometry::Polygon(geometry.convex_hull())
}

/// Ramer–Douglas–Peucker simplification of linear and areal parts.
pub fn simplify(geometry: &Geometry<f64>, epsilon: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(epsilon)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(epsilon)),
        Geometry::Polygon(poly) => Geometry::Polygon(poly.simplify(epsilon)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(epsilon)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection::new_from(
            gc.iter().map(|geom| simplify(geom, epsilon)).collect(),
        )),
        other => other.clone(),
    }
}

/// The bounding rectangle as a polygon.
pub fn envelope(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry
        .bounding_rect()
        .map_or_else(empty_polygon, |rect| Geometry::Polygon(rect.to_polygon()))
}

fn require_multi_polygon(geometry: &Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Ok(mp.clone()),
        other if is_empty(other) => Ok(MultiPolygon::new(Vec::new())),
        other => Err(SfError::UnsupportedGeometryType(format!(
            "{:?} (expected Polygon or MultiPolygon)",
            GeometryKind::of(other)
        ))),
    }
}

fn binary_polygon_op<F>(a: &Geometry<f64>, b: &Geometry<f64>, op: F) -> Result<Geometry<f64>>
where
    F: FnOnce(&MultiPolygon<f64>, &MultiPolygon<f64>) -> MultiPolygon<f64>,
{
    let ma = require_multi_polygon(a)?;
    let mb = require_multi_polygon(b)?;
    Ok(polygonal(op(&ma, &mb)))
}

pub fn intersection(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>> {
    binary_polygon_op(a, b, |a, b| a.intersection(b))
}

pub fn union(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>> {
    binary_polygon_op(a, b, |a, b| a.union(b))
}

pub fn difference(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>> {
    binary_polygon_op(a, b, |a, b| a.difference(b))
}

pub fn sym_difference(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>> {
    binary_polygon_op(a, b, |a, b| a.xor(b))
}

/// Merge many geometries into one.
///
/// Polygons are dissolved by union, points gathered into a multi point and
/// lines into a multi line string. Mixed kinds give a geometry collection of
/// those merged parts.
pub fn union_all(geometries: &[Geometry<f64>]) -> Geometry<f64> {
    let mut points: Vec<Point<f64>> = Vec::new();
    let mut lines: Vec<LineString<f64>> = Vec::new();
    let mut areas = MultiPolygon::new(Vec::new());
    let mut has_areas = false;

    let mut stack: Vec<&Geometry<f64>> = geometries.iter().rev().collect();
    while let Some(geometry) = stack.pop() {
        match geometry {
            Geometry::Point(p) => points.push(*p),
            Geometry::MultiPoint(mp) => points.extend(mp.0.iter().copied()),
            Geometry::LineString(ls) => lines.push(ls.clone()),
            Geometry::MultiLineString(mls) => lines.extend(mls.0.iter().cloned()),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
                has_areas = true;
                let next = require_multi_polygon(geometry).unwrap_or_else(|_| MultiPolygon::new(Vec::new()));
                areas = areas.union(&next);
            }
            Geometry::GeometryCollection(gc) => stack.extend(gc.0.iter().rev()),
            Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {}
        }
    }

    let mut parts = Vec::new();
    if has_areas {
        parts.push(polygonal(areas));
    }
    match lines.len() {
        0 => {}
        1 => parts.push(Geometry::LineString(lines.remove(0))),
        _ => parts.push(Geometry::MultiLineString(MultiLineString::new(lines))),
    }
    match points.len() {
        0 => {}
        1 => parts.push(Geometry::Point(points[0])),
        _ => parts.push(Geometry::MultiPoint(MultiPoint::new(points))),
    }

    match parts.len() {
        0 => empty_geometry(),
        1 => parts.remove(0),
        _ => Geometry::GeometryCollection(GeometryCollection::new_from(parts)),
    }
}

fn bboxes_meet(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    }
}

impl FeatureCollection {
    fn note_geographic(&self, operation: &str) {
        if self.crs().is_geographic() {
            log::debug!(
                "{operation}: coordinates in {} are treated as planar",
                self.crs()
            );
        }
    }

    pub fn area(&self) -> Vec<f64> {
        self.note_geographic("area");
        self.geometry().iter().map(area).collect()
    }

    pub fn length(&self) -> Vec<f64> {
        self.note_geographic("length");
        self.geometry().iter().map(length).collect()
    }

    /// Pairwise distances, one row per feature of `self`.
    pub fn distance_matrix(&self, other: &FeatureCollection) -> Result<Vec<Vec<f64>>> {
        ensure_same_crs(self.crs(), other.crs())?;
        Ok(self
            .geometry()
            .iter()
            .map(|a| other.geometry().iter().map(|b| distance(a, b)).collect())
            .collect())
    }

    pub fn buffer(&self, distance: f64) -> FeatureCollection {
        self.note_geographic("buffer");
        self.map_geometry(|geom| buffer(geom, distance))
    }

    pub fn centroid(&self) -> FeatureCollection {
        self.map_geometry(centroid)
    }

    pub fn convex_hull(&self) -> FeatureCollection {
        self.map_geometry(convex_hull)
    }

    pub fn simplify(&self, epsilon: f64) -> FeatureCollection {
        self.map_geometry(|geom| simplify(geom, epsilon))
    }

    pub fn envelope(&self) -> FeatureCollection {
        self.map_geometry(envelope)
    }

    /// Union of every geometry in the collection.
    pub fn union_all(&self) -> Geometry<f64> {
        union_all(self.geometry().as_slice())
    }

    /// For each feature of `self`, the indices of features in `other` it relates to.
    pub fn relate_pairs(
        &self,
        other: &FeatureCollection,
        predicate: SpatialPredicate,
    ) -> Result<Vec<Vec<usize>>> {
        ensure_same_crs(self.crs(), other.crs())?;
        self.note_geographic("spatial predicate");
        let check_all = predicate.needs_disjoint_pairs();
        Ok(self
            .geometry()
            .iter()
            .map(|a| {
                other
                    .geometry()
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| {
                        (check_all || bboxes_meet(a, b)) && predicate.evaluate(a, b)
                    })
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect())
    }

    /// Features of `self` that satisfy `predicate` with at least one feature of `other`.
    pub fn spatial_filter(
        &self,
        other: &FeatureCollection,
        predicate: SpatialPredicate,
    ) -> Result<FeatureCollection> {
        let pairs = self.relate_pairs(other, predicate)?;
        let kept: Vec<usize> = pairs
            .iter()
            .enumerate()
            .filter(|(_, matches)| !matches.is_empty())
            .map(|(i, _)| i)
            .collect();
        Ok(self.take(&kept))
    }

    /// Join attributes of `other` onto `self` by a spatial predicate.
    ///
    /// The geometry of `self` is kept. A left join keeps features of `self`
    /// without any match, with null attributes from `other`; rows only
    /// present in `other` (right and full joins) get an empty geometry.
    pub fn spatial_join(
        &self,
        other: &FeatureCollection,
        predicate: SpatialPredicate,
        kind: JoinKind,
    ) -> Result<FeatureCollection> {
        let pairs = self.relate_pairs(other, predicate)?;
        let keep_left = matches!(kind, JoinKind::Left | JoinKind::Full);
        let mut plan = JoinPlan::default();
        let mut other_matched = vec![false; other.nrow()];
        for (i, matches) in pairs.iter().enumerate() {
            if matches.is_empty() && keep_left {
                plan.push(Some(i), None);
            }
            for &j in matches {
                other_matched[j] = true;
                plan.push(Some(i), Some(j));
            }
        }
        if matches!(kind, JoinKind::Right | JoinKind::Full) {
            for (j, matched) in other_matched.into_iter().enumerate() {
                if !matched {
                    plan.push(None, Some(j));
                }
            }
        }

        let attributes = assemble_join(
            self.attributes(),
            other.attributes(),
            &JoinBy::same(&[]),
            &plan,
        )?;
        FeatureCollection::new(attributes, self.geometry().take_optional(&plan.left))
    }

    /// Pairwise intersections of all intersecting areal features, carrying
    /// the attributes of both sides.
    pub fn intersection(&self, other: &FeatureCollection) -> Result<FeatureCollection> {
        let pairs = self.relate_pairs(other, SpatialPredicate::Intersects)?;
        let mut plan = JoinPlan::default();
        let mut geometries = Vec::new();
        for (i, matches) in pairs.iter().enumerate() {
            let Some(a) = self.geometry().get(i) else {
                continue;
            };
            for &j in matches {
                let Some(b) = other.geometry().get(j) else {
                    continue;
                };
                let piece = intersection(a, b)?;
                if !is_empty(&piece) {
                    plan.push(Some(i), Some(j));
                    geometries.push(piece);
                }
            }
        }

        let attributes = assemble_join(
            self.attributes(),
            other.attributes(),
            &JoinBy::same(&[]),
            &plan,
        )?;
        let geometry = crate::geometry::GeometryColumn::new(
            self.geometry_column_name(),
            self.crs().clone(),
            geometries,
        );
        FeatureCollection::new(attributes, geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::geometry::{GeometryColumn, geometry_from_wkt};
    use crate::table::{Column, Table};
    use crate::value::Value;
    use crate::values;
    use approx::assert_relative_eq;

    fn wkt(text: &str) -> Geometry<f64> {
        geometry_from_wkt(text).expect("valid wkt")
    }

    fn squares() -> FeatureCollection {
        let table = Table::new(vec![Column::new("id", values![1_i64, 2_i64])]).expect("table");
        let geometry = GeometryColumn::new(
            "geometry",
            Crs::Epsg(3857),
            vec![
                wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))"),
                wkt("POLYGON((10 10,12 10,12 12,10 12,10 10))"),
            ],
        );
        FeatureCollection::new(table, geometry).expect("collection")
    }

    fn probes() -> FeatureCollection {
        let table = Table::new(vec![Column::new("name", values!["in", "edge", "far"])]).expect("table");
        let geometry = GeometryColumn::new(
            "geometry",
            Crs::Epsg(3857),
            vec![wkt("POINT(1 1)"), wkt("POINT(2 1)"), wkt("POINT(50 50)")],
        );
        FeatureCollection::new(table, geometry).expect("collection")
    }

    #[test]
    fn predicates() {
        let square = wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))");
        let inside = wkt("POINT(1 1)");
        let edge = wkt("POINT(2 1)");
        assert!(SpatialPredicate::Contains.evaluate(&square, &inside));
        assert!(SpatialPredicate::Within.evaluate(&inside, &square));
        assert!(!SpatialPredicate::Contains.evaluate(&square, &edge));
        assert!(SpatialPredicate::Covers.evaluate(&square, &edge));
        assert!(SpatialPredicate::Touches.evaluate(&edge, &square));
        assert!(SpatialPredicate::DWithin(3.0).evaluate(&square, &wkt("POINT(5 1)")));
        assert!(SpatialPredicate::Disjoint.evaluate(&square, &empty_geometry()));
        assert!(!SpatialPredicate::Intersects.evaluate(&square, &empty_geometry()));
    }

    #[test]
    fn measures() {
        assert_relative_eq!(area(&wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))")), 4.0);
        assert_relative_eq!(length(&wkt("LINESTRING(0 0,3 4)")), 5.0);
        assert_relative_eq!(length(&wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))")), 0.0);
        assert_relative_eq!(distance(&wkt("POINT(0 0)"), &wkt("POINT(3 4)")), 5.0);
        assert_relative_eq!(
            distance(&wkt("MULTIPOINT((0 0),(10 0))"), &wkt("LINESTRING(4 3,6 3)")),
            5.0
        );
        assert_relative_eq!(
            distance(&wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))"), &wkt("POINT(1 1)")),
            0.0
        );
    }

    #[test]
    fn buffer_point_is_about_a_circle() {
        let buffered = buffer(&wkt("POINT(0 0)"), 1.0);
        assert_eq!(GeometryKind::of(&buffered), GeometryKind::Polygon);
        assert!((area(&buffered) - std::f64::consts::PI).abs() < 0.1);
        assert!(is_empty(&buffer(&empty_geometry(), 1.0)));
    }

    #[test]
    fn set_operations() -> crate::Result<()> {
        let a = wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))");
        let b = wkt("POLYGON((1 0,3 0,3 2,1 2,1 0))");
        assert_relative_eq!(area(&union(&a, &b)?), 6.0, epsilon = 1e-9);
        assert_relative_eq!(area(&intersection(&a, &b)?), 2.0, epsilon = 1e-9);
        assert_relative_eq!(area(&difference(&a, &b)?), 2.0, epsilon = 1e-9);
        assert_relative_eq!(area(&sym_difference(&a, &b)?), 4.0, epsilon = 1e-9);
        assert!(matches!(
            intersection(&a, &wkt("POINT(1 1)")),
            Err(SfError::UnsupportedGeometryType(_))
        ));
        Ok(())
    }

    #[test]
    fn union_all_groups_by_dimension() {
        let merged = union_all(&[wkt("POINT(0 0)"), wkt("POINT(1 1)")]);
        assert_eq!(GeometryKind::of(&merged), GeometryKind::MultiPoint);

        let merged = union_all(&[
            wkt("POLYGON((0 0,1 0,1 1,0 1,0 0))"),
            wkt("POLYGON((1 0,2 0,2 1,1 1,1 0))"),
            wkt("POINT(5 5)"),
        ]);
        assert_eq!(GeometryKind::of(&merged), GeometryKind::GeometryCollection);
        assert!(is_empty(&union_all(&[])));
    }

    #[test]
    fn other_constructive_ops() {
        let line = wkt("LINESTRING(0 0,1 0.01,2 0)");
        assert_eq!(simplify(&line, 0.1), wkt("LINESTRING(0 0,2 0)"));
        assert_eq!(centroid(&wkt("POLYGON((0 0,2 0,2 2,0 2,0 0))")), wkt("POINT(1 1)"));
        assert!(is_empty(&centroid(&empty_geometry())));
        assert_relative_eq!(area(&envelope(&wkt("LINESTRING(0 0,2 3)"))), 6.0);
        assert_relative_eq!(area(&convex_hull(&wkt("MULTIPOINT((0 0),(2 0),(0 2))"))), 2.0);
    }

    #[test]
    fn spatial_filter_and_join() -> crate::Result<()> {
        let points = probes();
        let squares = squares();

        let inside = points.spatial_filter(&squares, SpatialPredicate::Intersects)?;
        assert_eq!(inside.nrow(), 2);

        let joined = points.spatial_join(&squares, SpatialPredicate::Intersects, JoinKind::Left)?;
        assert_eq!(joined.nrow(), 3);
        assert_eq!(joined.feature(0).and_then(|f| f.get("id")), Some(&Value::Integer(1)));
        assert_eq!(joined.feature(2).and_then(|f| f.get("id")), Some(&Value::Null));

        let inner = points.spatial_join(&squares, SpatialPredicate::Within, JoinKind::Inner)?;
        assert_eq!(inner.nrow(), 1);
        Ok(())
    }

    #[test]
    fn collection_intersection_carries_both_attributes() -> crate::Result<()> {
        let squares = squares();
        let table = Table::new(vec![Column::new("zone", values!["z"])])?;
        let geometry = GeometryColumn::new(
            "geometry",
            Crs::Epsg(3857),
            vec![wkt("POLYGON((1 1,11 1,11 11,1 11,1 1))")],
        );
        let zone = FeatureCollection::new(table, geometry)?;

        let pieces = squares.intersection(&zone)?;
        assert_eq!(pieces.nrow(), 2);
        assert_eq!(pieces.attributes().column_names(), vec!["id", "zone"]);
        assert_relative_eq!(pieces.area()[0], 1.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn binary_operations_need_same_crs() {
        let other = probes().set_crs(Crs::Epsg(4326));
        assert!(matches!(
            squares().spatial_filter(&other, SpatialPredicate::Intersects),
            Err(SfError::CrsMismatch { .. })
        ));
    }
}
