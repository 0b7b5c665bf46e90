//! Feature collections: an attribute [`Table`] plus one aligned [`GeometryColumn`].
//!
//! Verbs never drop the geometry column. Each verb computes the row indices
//! it keeps and applies them to both halves, so the geometry column always
//! has exactly one geometry per row.

use crate::conversions::empty_geometry;
use crate::crs::Crs;
use crate::error::{Result, SfError};
use crate::geometry::{DEFAULT_GEOMETRY_COLUMN, GeometryColumn, GeometryKind};
use crate::ops::union_all;
use crate::table::{
    Aggregate, Column, GroupedTable, JoinBy, JoinKind, Row, SortKey, Table, assemble_join,
    plan_join,
};
use crate::value::Value;
use geo::{Geometry, Point, Rect};
use std::collections::BTreeSet;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureCollection {
    attributes: Table,
    geometry: GeometryColumn,
}

/// `geometry`, or `geometry.1`, `geometry.2`, ... when the attributes
/// already use that name.
pub(crate) fn geometry_column_name_for(attributes: &Table) -> String {
    if !attributes.has_column(DEFAULT_GEOMETRY_COLUMN) {
        return DEFAULT_GEOMETRY_COLUMN.to_string();
    }
    (1..)
        .map(|n| format!("{DEFAULT_GEOMETRY_COLUMN}.{n}"))
        .find(|name| !attributes.has_column(name))
        .unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_string())
}

/// One record: its attributes and its geometry.
#[derive(Clone, Copy, Debug)]
pub struct Feature<'a> {
    pub attributes: Row<'a>,
    pub geometry: &'a Geometry<f64>,
}

impl<'a> Feature<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.attributes.get(name)
    }
}

impl FeatureCollection {
    pub fn new(attributes: Table, geometry: GeometryColumn) -> Result<Self> {
        let collection = Self {
            attributes,
            geometry,
        };
        collection.check()?;
        Ok(collection)
    }

    /// A collection with geometries only.
    pub fn from_geometries(geometry: GeometryColumn) -> Result<Self> {
        let attributes = Table::with_nrow(geometry.len(), Vec::new())?;
        Self::new(attributes, geometry)
    }

    fn check(&self) -> Result<()> {
        if self.geometry.len() != self.attributes.nrow() {
            return Err(SfError::GeometryLengthMismatch {
                rows: self.attributes.nrow(),
                geometries: self.geometry.len(),
            });
        }
        if self.attributes.has_column(&self.geometry.name) {
            return Err(SfError::DuplicateColumn {
                column: self.geometry.name.clone(),
            });
        }
        Ok(())
    }

    /// Pair two numeric columns into point geometries. The coordinate
    /// columns are removed from the attributes.
    pub fn from_coordinates(table: &Table, x: &str, y: &str, crs: Crs) -> Result<Self> {
        let points = points_from_columns(table, x, y)?;
        let attributes = table.drop_columns(&[x, y])?;
        let name = geometry_column_name_for(&attributes);
        Self::new(attributes, GeometryColumn::new(name, crs, points))
    }

    /// Like [`FeatureCollection::from_coordinates`], keeping the coordinate columns.
    pub fn from_coordinates_keep(table: &Table, x: &str, y: &str, crs: Crs) -> Result<Self> {
        let points = points_from_columns(table, x, y)?;
        let name = geometry_column_name_for(table);
        Self::new(table.clone(), GeometryColumn::new(name, crs, points))
    }

    /// Parse a WKT text column into the geometry column. Null cells become
    /// empty geometries.
    pub fn from_wkt_column(table: &Table, column: &str, crs: Crs) -> Result<Self> {
        let source = table
            .column(column)
            .ok_or_else(|| SfError::MissingColumn {
                column: column.to_string(),
            })?;
        let geometries = source
            .values
            .iter()
            .map(|value| match value {
                Value::Null => Ok(empty_geometry()),
                Value::Text(text) => crate::geometry::geometry_from_wkt(text),
                other => Err(SfError::ValueTypeMismatch {
                    expected: "text",
                    actual: other.type_name(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(
            table.drop_columns(&[column])?,
            GeometryColumn::new(column, crs, geometries),
        )
    }

    pub fn nrow(&self) -> usize {
        self.attributes.nrow()
    }

    pub fn is_empty(&self) -> bool {
        self.nrow() == 0
    }

    pub fn crs(&self) -> &Crs {
        &self.geometry.crs
    }

    pub fn attributes(&self) -> &Table {
        &self.attributes
    }

    pub fn geometry(&self) -> &GeometryColumn {
        &self.geometry
    }

    pub fn geometry_column_name(&self) -> &str {
        &self.geometry.name
    }

    pub fn geometry_kinds(&self) -> BTreeSet<GeometryKind> {
        self.geometry.kinds()
    }

    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_box()
    }

    pub fn into_parts(self) -> (Table, GeometryColumn) {
        (self.attributes, self.geometry)
    }

    pub fn feature(&self, index: usize) -> Option<Feature<'_>> {
        Some(Feature {
            attributes: self.attributes.row(index)?,
            geometry: self.geometry.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature<'_>> + '_ {
        self.attributes
            .rows()
            .zip(self.geometry.iter())
            .map(|(attributes, geometry)| Feature {
                attributes,
                geometry,
            })
    }

    /// Attributes followed by `X` and `Y` columns. Empty geometries give nulls.
    /// Attributes already named `X` or `Y` are a [`SfError::DuplicateColumn`].
    pub fn to_coordinates(&self) -> Result<Table> {
        if let Some(column) = ["X", "Y"].into_iter().find(|c| self.attributes.has_column(c)) {
            return Err(SfError::DuplicateColumn {
                column: column.to_string(),
            });
        }
        let mut xs = Vec::with_capacity(self.nrow());
        let mut ys = Vec::with_capacity(self.nrow());
        for geometry in self.geometry.iter() {
            match geometry {
                Geometry::Point(point) => {
                    xs.push(Value::Real(point.x()));
                    ys.push(Value::Real(point.y()));
                }
                other if crate::geometry::is_empty(other) => {
                    xs.push(Value::Null);
                    ys.push(Value::Null);
                }
                other => {
                    return Err(SfError::UnsupportedGeometryType(format!(
                        "{:?}",
                        GeometryKind::of(other)
                    )));
                }
            }
        }
        self.attributes
            .add_column(Column::new("X", xs))?
            .add_column(Column::new("Y", ys))
    }

    pub fn drop_geometry(&self) -> Table {
        self.attributes.clone()
    }

    /// Relabel the CRS without touching coordinates.
    pub fn set_crs(&self, crs: Crs) -> FeatureCollection {
        let mut out = self.clone();
        out.geometry.set_crs(crs);
        out
    }

    pub fn rename_geometry(&self, name: &str) -> Result<FeatureCollection> {
        let mut geometry = self.geometry.clone();
        geometry.name = name.to_string();
        Self::new(self.attributes.clone(), geometry)
    }

    pub(crate) fn with_geometry(&self, geometry: GeometryColumn) -> Result<FeatureCollection> {
        Self::new(self.attributes.clone(), geometry)
    }

    /// Apply the same row indices to attributes and geometry.
    pub fn take(&self, indices: &[usize]) -> FeatureCollection {
        FeatureCollection {
            attributes: self.attributes.take(indices),
            geometry: self.geometry.take(indices),
        }
    }

    pub fn select(&self, names: &[&str]) -> Result<FeatureCollection> {
        let names: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| *name != self.geometry.name)
            .collect();
        Self::new(self.attributes.select(&names)?, self.geometry.clone())
    }

    pub fn drop_columns(&self, names: &[&str]) -> Result<FeatureCollection> {
        Self::new(self.attributes.drop_columns(names)?, self.geometry.clone())
    }

    pub fn rename(&self, renames: &[(&str, &str)]) -> Result<FeatureCollection> {
        Self::new(self.attributes.rename(renames)?, self.geometry.clone())
    }

    /// Keep features for which the predicate holds.
    pub fn filter<F>(&self, mut predicate: F) -> FeatureCollection
    where
        F: FnMut(&Feature<'_>) -> bool,
    {
        let indices: Vec<usize> = self
            .iter()
            .filter(|feature| predicate(feature))
            .map(|feature| feature.attributes.index())
            .collect();
        self.take(&indices)
    }

    pub fn filter_geometry<F>(&self, mut predicate: F) -> FeatureCollection
    where
        F: FnMut(&Geometry<f64>) -> bool,
    {
        self.filter(|feature| predicate(feature.geometry))
    }

    pub fn slice(&self, range: Range<usize>) -> FeatureCollection {
        let end = range.end.min(self.nrow());
        let start = range.start.min(end);
        self.take(&(start..end).collect::<Vec<_>>())
    }

    pub fn head(&self, n: usize) -> FeatureCollection {
        self.slice(0..n)
    }

    pub fn arrange(&self, keys: &[SortKey]) -> Result<FeatureCollection> {
        Ok(self.take(&self.attributes.arrange_indices(keys)?))
    }

    /// Compute an attribute from each feature.
    pub fn mutate<F>(&self, name: &str, mut f: F) -> Result<FeatureCollection>
    where
        F: FnMut(&Feature<'_>) -> Value,
    {
        if name == self.geometry.name {
            return Err(SfError::DuplicateColumn {
                column: name.to_string(),
            });
        }
        let values = self.iter().map(|feature| f(&feature)).collect();
        Self::new(
            self.attributes.add_column(Column::new(name, values))?,
            self.geometry.clone(),
        )
    }

    /// Compute an attribute from each geometry alone, such as its area.
    pub fn mutate_geometry<F>(&self, name: &str, mut f: F) -> Result<FeatureCollection>
    where
        F: FnMut(&Geometry<f64>) -> Value,
    {
        self.mutate(name, |feature| f(feature.geometry))
    }

    /// Replace each geometry, keeping attributes and CRS.
    pub fn map_geometry<F>(&self, f: F) -> FeatureCollection
    where
        F: FnMut(&Geometry<f64>) -> Geometry<f64>,
    {
        FeatureCollection {
            attributes: self.attributes.clone(),
            geometry: self.geometry.map(f),
        }
    }

    pub fn try_map_geometry<F>(&self, f: F) -> Result<FeatureCollection>
    where
        F: FnMut(&Geometry<f64>) -> Result<Geometry<f64>>,
    {
        self.with_geometry(self.geometry.try_map(f)?)
    }

    pub fn distinct(&self, names: &[&str]) -> Result<FeatureCollection> {
        Ok(self.take(&self.attributes.distinct_indices(names)?))
    }

    fn join(&self, right: &Table, by: JoinBy, kind: JoinKind) -> Result<FeatureCollection> {
        if right.has_column(&self.geometry.name) {
            return Err(SfError::DuplicateColumn {
                column: self.geometry.name.clone(),
            });
        }
        let plan = plan_join(&self.attributes, right, &by, kind)?;
        let attributes = assemble_join(&self.attributes, right, &by, &plan)?;
        Self::new(attributes, self.geometry.take_optional(&plan.left))
    }

    /// Left join with a plain table; every feature is kept.
    pub fn left_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<FeatureCollection> {
        self.join(right, by.into(), JoinKind::Left)
    }

    pub fn inner_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<FeatureCollection> {
        self.join(right, by.into(), JoinKind::Inner)
    }

    pub fn semi_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<FeatureCollection> {
        let kept = self.attributes.semi_join_indices(right, &by.into())?;
        Ok(self.take(&kept))
    }

    pub fn anti_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<FeatureCollection> {
        let kept = self.attributes.anti_join_indices(right, &by.into())?;
        Ok(self.take(&kept))
    }

    pub fn group_by(&self, names: &[&str]) -> Result<GroupedCollection<'_>> {
        Ok(GroupedCollection {
            collection: self,
            grouped: self.attributes.group_by(names)?,
        })
    }

    /// Summarise all features into one, unioning every geometry.
    pub fn summarise(&self, aggregates: &[Aggregate]) -> Result<FeatureCollection> {
        self.group_by(&[])?.summarise(aggregates)
    }

    /// Stack two collections. Their CRS must be equivalent.
    pub fn bind_rows(&self, other: &FeatureCollection) -> Result<FeatureCollection> {
        ensure_same_crs(self.crs(), other.crs())?;
        let attributes = self.attributes.bind_rows(&other.attributes)?;
        let mut geometry = self.geometry.clone();
        for geom in other.geometry.iter() {
            geometry.push(geom.clone());
        }
        Self::new(attributes, geometry)
    }
}

/// A feature collection partitioned by attribute keys.
#[derive(Debug)]
pub struct GroupedCollection<'a> {
    collection: &'a FeatureCollection,
    grouped: GroupedTable<'a>,
}

impl GroupedCollection<'_> {
    pub fn ngroups(&self) -> usize {
        self.grouped.ngroups()
    }

    /// One feature per group; the geometry is the union of the group's geometries.
    pub fn summarise(&self, aggregates: &[Aggregate]) -> Result<FeatureCollection> {
        let attributes = self.grouped.summarise(aggregates)?;
        let geometries = self
            .grouped
            .groups()
            .iter()
            .map(|group| {
                let members: Vec<Geometry<f64>> = group
                    .rows
                    .iter()
                    .filter_map(|&row| self.collection.geometry.get(row).cloned())
                    .collect();
                union_all(&members)
            })
            .collect();
        let geometry = GeometryColumn::new(
            self.collection.geometry.name.clone(),
            self.collection.crs().clone(),
            geometries,
        );
        FeatureCollection::new(attributes, geometry)
    }
}

pub(crate) fn ensure_same_crs(left: &Crs, right: &Crs) -> Result<()> {
    if left.equivalent(right) {
        Ok(())
    } else {
        Err(SfError::CrsMismatch {
            left: left.to_string(),
            right: right.to_string(),
        })
    }
}

fn points_from_columns(table: &Table, x: &str, y: &str) -> Result<Vec<Geometry<f64>>> {
    let coordinate = |name: &str| -> Result<Vec<f64>> {
        let column = table.column(name).ok_or_else(|| SfError::MissingColumn {
            column: name.to_string(),
        })?;
        column
            .values
            .iter()
            .enumerate()
            .map(|(row, value)| match value {
                Value::Integer(v) => Ok(*v as f64),
                Value::Real(v) => Ok(*v),
                _ => Err(SfError::InvalidCoordinate {
                    row,
                    column: name.to_string(),
                }),
            })
            .collect()
    };
    let xs = coordinate(x)?;
    let ys = coordinate(y)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .map(|(x, y)| Geometry::Point(Point::new(x, y)))
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{ColumnSpec, ColumnType};
    use crate::values;
    use geo::polygon;

    pub(crate) fn cities() -> FeatureCollection {
        let table = Table::from_rows(
            vec![
                ColumnSpec::new("name", ColumnType::Varchar),
                ColumnSpec::new("country", ColumnType::Varchar),
                ColumnSpec::new("X", ColumnType::Double),
                ColumnSpec::new("Y", ColumnType::Double),
            ],
            vec![
                values!["Paris", "FR", 2.35, 48.86],
                values!["Lyon", "FR", 4.84, 45.76],
                values!["Berlin", "DE", 13.40, 52.52],
            ],
        )
        .expect("valid table");
        FeatureCollection::from_coordinates(&table, "X", "Y", Crs::Epsg(4326))
            .expect("valid coordinates")
    }

    #[test]
    fn coordinates_round_trip() -> crate::Result<()> {
        let fc = cities();
        assert_eq!(fc.nrow(), 3);
        assert_eq!(fc.attributes().column_names(), vec!["name", "country"]);
        let table = fc.to_coordinates()?;
        assert_eq!(table.column_names(), vec!["name", "country", "X", "Y"]);
        assert_eq!(table.value(2, "X"), Some(&Value::Real(13.40)));
        Ok(())
    }

    #[test]
    fn existing_xy_attributes_are_not_overwritten() -> crate::Result<()> {
        let table = Table::new(vec![
            Column::new("X", values![1.0, 2.0]),
            Column::new("Y", values![3.0, 4.0]),
        ])?;
        let kept = FeatureCollection::from_coordinates_keep(&table, "X", "Y", Crs::Undefined)?;
        assert!(matches!(
            kept.to_coordinates(),
            Err(SfError::DuplicateColumn { column }) if column == "X"
        ));
        Ok(())
    }

    #[test]
    fn geometry_attribute_gets_a_free_column_name() -> crate::Result<()> {
        let table = Table::new(vec![
            Column::new("geometry", values!["road", "river"]),
            Column::new("geometry.1", values![1, 2]),
            Column::new("lon", values![1.0, 2.0]),
            Column::new("lat", values![3.0, 4.0]),
        ])?;
        let fc = FeatureCollection::from_coordinates(&table, "lon", "lat", Crs::Epsg(4326))?;
        assert_eq!(fc.geometry_column_name(), "geometry.2");
        assert_eq!(fc.attributes().column_names(), vec!["geometry", "geometry.1"]);

        let kept = FeatureCollection::from_coordinates_keep(&table, "lon", "lat", Crs::Epsg(4326))?;
        assert_eq!(kept.geometry_column_name(), "geometry.2");
        assert_eq!(kept.attributes().ncol(), 4);
        Ok(())
    }

    #[test]
    fn null_coordinate_is_rejected() -> crate::Result<()> {
        let table = Table::new(vec![
            Column::new("x", values![1.0, Option::<f64>::None]),
            Column::new("y", values![1.0, 2.0]),
        ])?;
        let err = FeatureCollection::from_coordinates(&table, "x", "y", Crs::Undefined)
            .expect_err("null x");
        assert!(matches!(err, SfError::InvalidCoordinate { row: 1, .. }));
        Ok(())
    }

    #[test]
    fn length_mismatch_is_rejected() -> crate::Result<()> {
        let table = Table::new(vec![Column::new("a", values![1_i64, 2_i64])])?;
        let geometry = GeometryColumn::new("geometry", Crs::Undefined, vec![empty_geometry()]);
        assert!(matches!(
            FeatureCollection::new(table, geometry),
            Err(SfError::GeometryLengthMismatch { rows: 2, geometries: 1 })
        ));
        Ok(())
    }

    #[test]
    fn verbs_keep_geometry_aligned() -> crate::Result<()> {
        let fc = cities();
        let fr = fc.filter(|feature| feature.get("country") == Some(&Value::from("FR")));
        assert_eq!(fr.nrow(), 2);
        assert_eq!(fr.geometry().len(), 2);

        let sorted = fc.arrange(&[SortKey::desc("name")])?;
        assert_eq!(sorted.feature(0).and_then(|f| f.get("name")), Some(&Value::from("Paris")));
        assert_eq!(
            sorted.feature(0).map(|f| f.geometry.clone()),
            Some(Geometry::Point(Point::new(2.35, 48.86)))
        );

        let selected = fc.select(&["name"])?;
        assert_eq!(selected.attributes().column_names(), vec!["name"]);
        assert_eq!(selected.geometry().len(), 3);

        let east = fc.filter_geometry(|geom| matches!(geom, Geometry::Point(p) if p.x() > 10.0));
        assert_eq!(east.nrow(), 1);
        Ok(())
    }

    #[test]
    fn joins_with_plain_tables() -> crate::Result<()> {
        let fc = cities();
        let countries = Table::new(vec![
            Column::new("country", values!["FR", "FR", "IT"]),
            Column::new("label", values!["France", "République", "Italia"]),
        ])?;

        let left = fc.left_join(&countries, "country")?;
        assert_eq!(left.nrow(), 2 + 2 + 1);
        assert_eq!(left.geometry().len(), left.nrow());
        assert_eq!(left.feature(4).and_then(|f| f.get("label")), Some(&Value::Null));

        let inner = fc.inner_join(&countries, "country")?;
        assert_eq!(inner.nrow(), 4);

        let semi = fc.semi_join(&countries, "country")?;
        assert_eq!(semi.nrow(), 2);
        let anti = fc.anti_join(&countries, "country")?;
        assert_eq!(anti.nrow(), 1);
        Ok(())
    }

    #[test]
    fn grouped_summary_unions_geometry() -> crate::Result<()> {
        let table = Table::new(vec![Column::new("zone", values!["a", "a", "b"])])?;
        let geometry = GeometryColumn::new(
            "geometry",
            Crs::Undefined,
            vec![
                Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]),
                Geometry::Polygon(polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)]),
                Geometry::Polygon(polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0)]),
            ],
        );
        let fc = FeatureCollection::new(table, geometry)?;
        let merged = fc.group_by(&["zone"])?.summarise(&[Aggregate::count("n")])?;
        assert_eq!(merged.nrow(), 2);
        assert_eq!(merged.geometry().len(), 2);
        let area = crate::ops::area(merged.geometry().get(0).expect("first group"));
        approx::assert_relative_eq!(area, 2.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn bind_rows_requires_same_crs() -> crate::Result<()> {
        let fc = cities();
        let doubled = fc.bind_rows(&fc)?;
        assert_eq!(doubled.nrow(), 6);
        let other = fc.set_crs(Crs::Epsg(3857));
        assert!(matches!(
            fc.bind_rows(&other),
            Err(SfError::CrsMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn wkt_column_is_parsed() -> crate::Result<()> {
        let table = Table::new(vec![
            Column::new("id", values![1_i64, 2_i64]),
            Column::new("wkt", values!["POINT (1 2)", Option::<&str>::None]),
        ])?;
        let fc = FeatureCollection::from_wkt_column(&table, "wkt", Crs::Epsg(4326))?;
        assert_eq!(fc.geometry_column_name(), "wkt");
        assert_eq!(fc.attributes().column_names(), vec!["id"]);
        assert!(crate::geometry::is_empty(fc.geometry().get(1).expect("row 1")));
        Ok(())
    }
}
