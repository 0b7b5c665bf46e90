use crate::collection::FeatureCollection;
use crate::conversions::{column_type_from_str, geometry_kind_from_str, has_extra_dimensions};
use crate::crs::Crs;
use crate::error::{Result, SfError};
use crate::geometry::{GeometryColumn, GeometryKind};
use crate::ogc_sql::{
    SQL_SELECT_GEOMETRY_COLUMN_META, SQL_UPDATE_GPKG_CONTENTS_EXTENT, quote_ident,
    sql_delete_all, sql_insert_feature, sql_select_features, sql_table_columns,
    sql_update_feature, with_savepoint,
};
use crate::table::{Column, Table};
use crate::types::{ColumnSpec, ColumnSpecs};
use crate::value::Value;
use geo::Geometry;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use std::collections::HashMap;
use std::sync::Arc;

use super::feature::{GpkgFeature, GpkgFeatureIterator, gpkg_blob_to_geometry};
use super::geometry_to_gpkg_blob;

mod batch_iterator;

pub use batch_iterator::GpkgFeatureBatchIterator;

/// A GeoPackage feature layer with geometry metadata and column specs.
#[derive(Debug)]
pub struct GpkgLayer<'a> {
    pub(super) conn: &'a Connection,
    pub(super) read_only: bool,
    pub layer_name: String,
    pub geometry_column: String,
    pub primary_key_column: String,
    pub geometry_kind: GeometryKind,
    pub srs_id: i32,
    pub crs: Crs,
    pub property_columns: Vec<ColumnSpec>,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
    pub(super) insert_sql: String,
    pub(super) update_sql: String,
}

// When issuing the SELECT query, always place these columns first so that
// we don't need to find the positions every time.
const GEOMETRY_INDEX: usize = 0;
const PRIMARY_INDEX: usize = 1;

/// What `gpkg_geometry_columns` says about a feature table.
pub(crate) struct GeometryColumnMeta {
    pub(crate) geometry_column: String,
    pub(crate) geometry_kind: GeometryKind,
    pub(crate) srs_id: i32,
    pub(crate) crs: Crs,
}

pub(crate) fn geometry_column_meta(conn: &Connection, layer_name: &str) -> Result<GeometryColumnMeta> {
    let row = conn
        .query_row(SQL_SELECT_GEOMETRY_COLUMN_META, [layer_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i8>(2)?,
                row.get::<_, i8>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<i32>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })
        .optional()?;
    let Some((geometry_column, type_name, z, m, srs_id, organization, code, definition)) = row
    else {
        return Err(SfError::MissingLayer {
            layer_name: layer_name.to_string(),
        });
    };

    if has_extra_dimensions(z, m)? {
        log::warn!("layer {layer_name} declares Z/M coordinates; only X and Y are read");
    }

    Ok(GeometryColumnMeta {
        geometry_column,
        geometry_kind: geometry_kind_from_str(&type_name)?,
        srs_id,
        crs: Crs::from_srs_row(
            organization.as_deref(),
            code.unwrap_or(srs_id),
            definition.as_deref(),
        ),
    })
}

/// Resolve the table columns and map SQLite declared types.
pub(crate) fn column_specs(conn: &Connection, layer_name: &str) -> Result<ColumnSpecs> {
    let mut stmt = conn.prepare(&sql_table_columns(layer_name))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i32>(2)? != 0,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut primary_key: Option<String> = None;
    let mut other_columns = Vec::with_capacity(rows.len());
    for (name, declared_type, is_primary_key) in rows {
        if is_primary_key {
            if primary_key.is_some() {
                return Err(SfError::CompositePrimaryKeyUnsupported {
                    layer_name: layer_name.to_string(),
                });
            }
            primary_key = Some(name);
            continue;
        }
        // cf. https://www.geopackage.org/spec140/index.html#_sqlite_container
        let column_type =
            column_type_from_str(&declared_type).ok_or_else(|| SfError::UnsupportedColumnType {
                column: name.clone(),
                declared_type: declared_type.clone(),
            })?;
        other_columns.push(ColumnSpec { name, column_type });
    }

    let primary_key = primary_key.ok_or_else(|| SfError::MissingPrimaryKeyColumn {
        layer_name: layer_name.to_string(),
    })?;

    Ok(ColumnSpecs {
        primary_key,
        other_columns,
    })
}

impl<'a> GpkgLayer<'a> {
    /// Read the layer's metadata from any connection holding a GeoPackage.
    pub(crate) fn load(conn: &'a Connection, read_only: bool, layer_name: &str) -> Result<Self> {
        let meta = geometry_column_meta(conn, layer_name)?;
        let specs = column_specs(conn, layer_name)?;
        let property_columns: Vec<ColumnSpec> = specs
            .other_columns
            .into_iter()
            .filter(|spec| spec.name != meta.geometry_column)
            .collect();

        let property_index_by_name = property_columns
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.name.clone(), idx))
            .collect();
        let writable_columns = || {
            std::iter::once(meta.geometry_column.as_str())
                .chain(property_columns.iter().map(|spec| spec.name.as_str()))
        };
        let insert_sql = sql_insert_feature(layer_name, writable_columns());
        let update_sql = sql_update_feature(layer_name, &specs.primary_key, writable_columns());

        Ok(GpkgLayer {
            conn,
            read_only,
            layer_name: layer_name.to_string(),
            primary_key_column: specs.primary_key,
            geometry_kind: meta.geometry_kind,
            srs_id: meta.srs_id,
            crs: meta.crs,
            geometry_column: meta.geometry_column,
            property_index_by_name: Arc::new(property_index_by_name),
            property_columns,
            insert_sql,
            update_sql,
        })
    }

    fn select_sql(&self, batched: bool) -> String {
        sql_select_features(
            &self.layer_name,
            &self.geometry_column,
            &self.primary_key_column,
            self.property_columns.iter().map(|spec| spec.name.as_str()),
            batched,
        )
    }

    /// Iterate over features in primary key order.
    ///
    /// This reads the whole layer into memory; see
    /// [`GpkgLayer::features_batch`] for chunked reads.
    ///
    /// ```
    /// use geo::{Geometry, Point};
    /// use tidysf::{Crs, GeometryKind, Gpkg, values};
    ///
    /// let gpkg = Gpkg::new_in_memory()?;
    /// let layer = gpkg.new_layer("points", "geom", GeometryKind::Point, &Crs::Epsg(4326), &[])?;
    /// layer.insert(&Geometry::Point(Point::new(1.0, 2.0)), values![])?;
    /// for feature in layer.features()? {
    ///     assert_eq!(feature.geometry()?, Geometry::Point(Point::new(1.0, 2.0)));
    /// }
    /// # Ok::<(), tidysf::SfError>(())
    /// ```
    pub fn features(&self) -> Result<GpkgFeatureIterator> {
        let sql = self.select_sql(false);
        log::debug!("{sql}");
        let mut stmt = self.conn.prepare(&sql)?;
        let features = stmt
            .query_map([], |row| {
                row_to_feature(
                    row,
                    &self.property_columns,
                    &self.geometry_column,
                    &self.primary_key_column,
                    &self.property_index_by_name,
                )
            })?
            .collect::<std::result::Result<Vec<GpkgFeature>, _>>()?;

        Ok(GpkgFeatureIterator {
            features: features.into_iter(),
        })
    }

    /// Iterate over features in chunks of at most `batch_size`.
    pub fn features_batch(&self, batch_size: u32) -> Result<GpkgFeatureBatchIterator<'a>> {
        let stmt = self.conn.prepare(&self.select_sql(true))?;
        Ok(GpkgFeatureBatchIterator {
            stmt,
            property_columns: self.property_columns.clone(),
            geometry_column: self.geometry_column.clone(),
            primary_key_column: self.primary_key_column.clone(),
            property_index_by_name: Arc::clone(&self.property_index_by_name),
            batch_size,
            offset: 0,
            end_or_invalid_state: batch_size == 0,
        })
    }

    /// Remove all rows from the layer.
    pub fn truncate(&self) -> Result<usize> {
        self.ensure_writable()?;
        Ok(self.conn.execute(&sql_delete_all(&self.layer_name), [])?)
    }

    /// Insert a feature with a geometry and property values in layer column
    /// order. Returns the new primary key.
    pub fn insert<P>(&self, geometry: &Geometry<f64>, properties: P) -> Result<i64>
    where
        P: IntoIterator<Item = Value>,
    {
        let params = self.params(geometry, properties)?;
        let mut stmt = self.conn.prepare_cached(&self.insert_sql)?;
        stmt.execute(params_from_iter(params))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Replace geometry and properties of the feature with primary key `id`.
    pub fn update<P>(&self, geometry: &Geometry<f64>, properties: P, id: i64) -> Result<()>
    where
        P: IntoIterator<Item = Value>,
    {
        let mut params = self.params(geometry, properties)?;
        params.push(Value::Integer(id));
        let mut stmt = self.conn.prepare_cached(&self.update_sql)?;
        stmt.execute(params_from_iter(params))?;
        Ok(())
    }

    fn params<P>(&self, geometry: &Geometry<f64>, properties: P) -> Result<Vec<Value>>
    where
        P: IntoIterator<Item = Value>,
    {
        self.ensure_writable()?;
        let geometry = geometry_to_gpkg_blob(geometry, self.srs_id)?.map_or(Value::Null, Value::Blob);
        let mut params = Vec::with_capacity(self.property_columns.len() + 2);
        params.push(geometry);
        params.extend(properties);
        if params.len() != self.property_columns.len() + 1 {
            return Err(SfError::InvalidPropertyCount {
                expected: self.property_columns.len(),
                got: params.len() - 1,
            });
        }
        Ok(params)
    }

    /// Read the whole layer into a feature collection.
    pub fn to_collection(&self) -> Result<FeatureCollection> {
        let mut geometries = Vec::new();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); self.property_columns.len()];
        for feature in self.features()? {
            let (blob, properties) = feature.into_parts();
            geometries.push(match blob {
                Some(bytes) => gpkg_blob_to_geometry(&bytes)?,
                None => crate::conversions::empty_geometry(),
            });
            for (column, value) in columns.iter_mut().zip(properties) {
                column.push(value);
            }
        }

        let nrow = geometries.len();
        let attributes = Table::with_nrow(
            nrow,
            self.property_columns
                .iter()
                .zip(columns)
                .map(|(spec, values)| Column::with_type(spec.name.clone(), spec.column_type, values))
                .collect(),
        )?;
        log::debug!("read {nrow} features from layer {}", self.layer_name);
        FeatureCollection::new(
            attributes,
            GeometryColumn::new(self.geometry_column.clone(), self.crs.clone(), geometries),
        )
    }

    /// Append every feature of `collection` in one transaction.
    ///
    /// Attributes are matched to layer columns by name; layer columns the
    /// collection lacks are written as `NULL`. The layer extent in
    /// `gpkg_contents` is refreshed afterwards.
    pub fn append_collection(&self, collection: &FeatureCollection) -> Result<usize> {
        self.ensure_writable()?;
        if self.crs.is_defined() && !self.crs.equivalent(collection.crs()) {
            return Err(SfError::CrsMismatch {
                left: self.crs.to_string(),
                right: collection.crs().to_string(),
            });
        }

        let attributes = collection.attributes();
        if let Some(extra) = attributes
            .column_names()
            .into_iter()
            .find(|name| !self.property_index_by_name.contains_key(*name))
        {
            return Err(SfError::MissingColumn {
                column: format!("{}.{extra}", self.layer_name),
            });
        }
        let sources: Vec<Option<&Column>> = self
            .property_columns
            .iter()
            .map(|spec| attributes.column(&spec.name))
            .collect();

        with_savepoint(self.conn, "tidysf_append", || -> Result<()> {
            let mut stmt = self.conn.prepare_cached(&self.insert_sql)?;
            for (row, geometry) in collection.geometry().iter().enumerate() {
                let blob = geometry_to_gpkg_blob(geometry, self.srs_id)?
                    .map_or(Value::Null, Value::Blob);
                let params = std::iter::once(blob).chain(sources.iter().map(|source| {
                    source.map_or(Value::Null, |column| column.values[row].clone())
                }));
                stmt.execute(params_from_iter(params))?;
            }
            self.refresh_extent()
        })?;
        log::info!(
            "wrote {} features to layer {}",
            collection.nrow(),
            self.layer_name
        );
        Ok(collection.nrow())
    }

    /// Recompute the layer extent stored in `gpkg_contents`.
    pub(crate) fn refresh_extent(&self) -> Result<()> {
        let c = quote_ident(&self.geometry_column);
        let sql = format!(
            "SELECT MIN(ST_MinX({c})), MIN(ST_MinY({c})), MAX(ST_MaxX({c})), MAX(ST_MaxY({c})) FROM {}",
            quote_ident(&self.layer_name)
        );
        let extent: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) =
            self.conn.query_row(&sql, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
        self.conn.execute(
            SQL_UPDATE_GPKG_CONTENTS_EXTENT,
            rusqlite::params![self.layer_name, extent.0, extent.1, extent.2, extent.3],
        )?;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(SfError::ReadOnly);
        }
        Ok(())
    }
}

pub(super) fn row_to_feature(
    row: &rusqlite::Row<'_>,
    property_columns: &[ColumnSpec],
    geometry_column: &str,
    primary_key_column: &str,
    property_index_by_name: &Arc<HashMap<String, usize>>,
) -> rusqlite::Result<GpkgFeature> {
    use rusqlite::types::ValueRef;

    let geometry = match row.get_ref(GEOMETRY_INDEX)? {
        ValueRef::Blob(bytes) => Some(bytes.to_vec()),
        ValueRef::Null => None,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                GEOMETRY_INDEX,
                geometry_column.to_string(),
                other.data_type(),
            ));
        }
    };
    let id = match row.get_ref(PRIMARY_INDEX)? {
        ValueRef::Integer(id) => id,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                PRIMARY_INDEX,
                primary_key_column.to_string(),
                other.data_type(),
            ));
        }
    };

    let mut properties = Vec::with_capacity(property_columns.len());
    for (offset, spec) in property_columns.iter().enumerate() {
        let value_ref = row.get_ref(offset + 2)?;
        properties.push(Value::from_sql_ref(value_ref, spec.column_type));
    }

    Ok(GpkgFeature {
        id,
        geometry,
        properties,
        property_index_by_name: Arc::clone(property_index_by_name),
    })
}
