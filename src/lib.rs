//! Simple-features collections with tidy data verbs.
//!
//! ## Overview
//!
//! - `FeatureCollection` is a table of attributes plus one geometry column.
//! - `GeometryColumn` holds one `geo::Geometry<f64>` per row and the `Crs`.
//! - `Table` is a plain data frame of typed `Column`s.
//! - `Value` is a single attribute cell.
//!
//! The verbs (`filter`, `select`, `arrange`, `mutate`, `summarise`, joins,
//! grouping, reshaping) live on `Table` and `FeatureCollection`. On a
//! collection they keep the geometry column aligned with the rows, so its
//! length always equals the row count.
//!
//! Files are read and written through [`io`]: GeoPackage, GeoJSON and
//! delimited text. A GeoPackage can also be used directly via [`Gpkg`].
//!
//! ## Short usage
//!
//! ```
//! use tidysf::{ColumnSpec, ColumnType, Crs, FeatureCollection, Table, Value, values};
//!
//! let table = Table::from_rows(
//!     vec![
//!         ColumnSpec::new("name", ColumnType::Varchar),
//!         ColumnSpec::new("lon", ColumnType::Double),
//!         ColumnSpec::new("lat", ColumnType::Double),
//!     ],
//!     vec![
//!         values!["Paris", 2.35, 48.86],
//!         values!["Berlin", 13.40, 52.52],
//!     ],
//! )?;
//! let cities = FeatureCollection::from_coordinates(&table, "lon", "lat", Crs::Epsg(4326))?;
//!
//! let east = cities.filter(|feature| {
//!     matches!(feature.geometry, geo::Geometry::Point(p) if p.x() > 10.0)
//! });
//! assert_eq!(east.nrow(), 1);
//! assert_eq!(east.geometry().len(), east.nrow());
//! assert_eq!(east.attributes().value(0, "name"), Some(&Value::from("Berlin")));
//! # Ok::<(), tidysf::SfError>(())
//! ```
//!
//! ## GeoPackage
//!
//! ```no_run
//! use tidysf::Gpkg;
//!
//! let gpkg = Gpkg::open_read_only("data/example.gpkg")?;
//! for layer_name in gpkg.list_layers()? {
//!     let layer = gpkg.open_layer(&layer_name)?;
//!     for batch in layer.features_batch(100)? {
//!         for feature in batch? {
//!             let _geometry = feature.geometry()?;
//!             let _name = feature.property("name");
//!         }
//!     }
//! }
//! # Ok::<(), tidysf::SfError>(())
//! ```
//!
//! `GpkgFeature::property` returns `Option<&Value>`. Convert with
//! `try_into()`; converting to `Option<T>` maps `NULL` to `None`:
//!
//! ```
//! use tidysf::Value;
//!
//! let maybe_i64: Option<i64> = Value::Null.try_into()?;
//! assert_eq!(maybe_i64, None);
//! # Ok::<(), tidysf::SfError>(())
//! ```
mod error;
mod gpkg;
mod sql_functions;

mod collection;
mod conversions;
mod crs;
mod geometry;
pub mod io;
mod ogc_sql;
pub mod ops;
mod table;
pub mod transform;
mod types;
mod value;

pub use collection::{Feature, FeatureCollection, GroupedCollection};
pub use crs::{Crs, WEB_MERCATOR, WGS84};
pub use error::{Result, SfError};
pub use geometry::{
    DEFAULT_GEOMETRY_COLUMN, GeometryColumn, GeometryKind, geometry_from_wkb, geometry_from_wkt,
    geometry_to_wkb, geometry_to_wkt, is_empty, normalize,
};
pub use gpkg::{Gpkg, GpkgFeature, GpkgFeatureBatchIterator, GpkgFeatureIterator, GpkgLayer};
pub use ops::SpatialPredicate;
pub use sql_functions::register_spatial_functions;
pub use table::{
    Aggregate, AggregateFn, Column, Group, GroupedTable, JoinBy, JoinKind, Row, SortKey, Table,
};
pub use types::{ColumnSpec, ColumnType};
pub use value::{Value, ValueKey};
