//! GeoPackage storage backed by rusqlite.
//!
//! Feature collections are stored as feature tables with an rtree index. The
//! spatial SQL functions the rtree triggers need are registered on every
//! connection opened here.

mod feature;
mod gpkg;
mod layer;

pub use feature::{GpkgFeature, GpkgFeatureIterator};
pub use gpkg::Gpkg;
pub use layer::{GpkgFeatureBatchIterator, GpkgLayer};

pub(crate) use feature::{
    geometry_to_gpkg_blob, gpkg_blob_bounds, gpkg_blob_to_geometry, is_gpkg_blob, parse_header,
};
