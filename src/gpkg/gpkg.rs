use crate::collection::FeatureCollection;
use crate::conversions::{column_type_to_str, geometry_kind_to_str};
use crate::crs::{Crs, PROJ_ORGANIZATION};
use crate::error::{Result, SfError};
use crate::geometry::GeometryKind;
use crate::ogc_sql::{
    SQL_DELETE_LAYER_METADATA, SQL_FIND_PROJ_SRS, SQL_INSERT_GPKG_CONTENTS,
    SQL_INSERT_GPKG_GEOMETRY_COLUMNS, SQL_INSERT_SRS, SQL_LIST_LAYERS, SQL_NEXT_CUSTOM_SRS_ID,
    SQL_SRS_EXISTS, execute_rtree_sqls, gpkg_rtree_drop_sql, initialize_gpkg, quote_ident,
    sql_create_table, sql_drop_table, with_savepoint,
};
use crate::sql_functions::register_spatial_functions;
use crate::types::ColumnSpec;
use rusqlite::{OpenFlags, OptionalExtension};
use std::path::Path;

use super::layer::{GpkgLayer, geometry_column_meta};

/// GeoPackage connection wrapper for reading and writing feature layers.
#[derive(Debug)]
pub struct Gpkg {
    conn: rusqlite::Connection,
    read_only: bool,
}

impl Gpkg {
    /// Open a GeoPackage in read-only mode.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SfError::NotFound(path.to_path_buf()));
        }
        let conn = rusqlite::Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        register_spatial_functions(&conn)?;
        Ok(Self {
            conn,
            read_only: true,
        })
    }

    /// Open an existing GeoPackage in read-write mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SfError::NotFound(path.to_path_buf()));
        }

        let conn = rusqlite::Connection::open(path)?;
        register_spatial_functions(&conn)?;
        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Create a new GeoPackage file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(SfError::AlreadyExists(path.to_path_buf()));
        }

        let conn = rusqlite::Connection::open(path)?;
        initialize_gpkg(&conn)?;
        register_spatial_functions(&conn)?;
        log::info!("created GeoPackage {}", path.display());

        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Create a new GeoPackage in memory.
    pub fn new_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        initialize_gpkg(&conn)?;
        register_spatial_functions(&conn)?;

        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Register a spatial reference system in `gpkg_spatial_ref_sys`.
    ///
    /// Layers must reference an `srs_id` that exists there. EPSG 4326 and
    /// 3857 are present from the start, and [`Gpkg::new_layer`] registers
    /// any other CRS on demand, but only with an `undefined` definition. Use
    /// this to store the real WKT. No validation of the WKT is done.
    ///
    /// ```
    /// # use tidysf::Gpkg;
    /// let gpkg = Gpkg::new_in_memory()?;
    /// gpkg.register_srs(
    ///     "OSGB36 / British National Grid",
    ///     27700,
    ///     "EPSG",
    ///     27700,
    ///     r#"PROJCS["OSGB36 / British National Grid", ...]"#,
    ///     "British National Grid",
    /// )?;
    /// # Ok::<(), tidysf::SfError>(())
    /// ```
    pub fn register_srs(
        &self,
        srs_name: &str,
        srs_id: i32,
        organization: &str,
        organization_coordsys_id: i32,
        definition: &str,
        description: &str,
    ) -> Result<()> {
        self.ensure_writable()?;
        self.conn.execute(
            SQL_INSERT_SRS,
            rusqlite::params![
                srs_name,
                srs_id,
                organization,
                organization_coordsys_id,
                definition,
                description
            ],
        )?;
        Ok(())
    }

    /// The `srs_id` for `crs`, registering it first when missing.
    ///
    /// EPSG codes keep their number. Projection strings get a fresh id above
    /// 100000 under the `PROJ` organization, reused for identical strings.
    pub fn ensure_srs(&self, crs: &Crs) -> Result<i32> {
        match crs {
            Crs::Undefined => Ok(-1),
            Crs::Epsg(code) => {
                let srs_id = i32::try_from(*code).map_err(|_| SfError::InvalidCrs(crs.to_string()))?;
                if !self.srs_exists(srs_id)? {
                    log::debug!("registering {crs} with an undefined definition");
                    self.register_srs(
                        &crs.to_string(),
                        srs_id,
                        "EPSG",
                        srs_id,
                        "undefined",
                        &crs.to_string(),
                    )?;
                }
                Ok(srs_id)
            }
            Crs::Proj(definition) => {
                let existing = self
                    .conn
                    .query_row(
                        SQL_FIND_PROJ_SRS,
                        rusqlite::params![PROJ_ORGANIZATION, definition],
                        |row| row.get::<_, i32>(0),
                    )
                    .optional()?;
                if let Some(srs_id) = existing {
                    return Ok(srs_id);
                }
                let srs_id: i32 = self.conn.query_row(SQL_NEXT_CUSTOM_SRS_ID, [], |row| row.get(0))?;
                log::debug!("registering projection string as srs_id {srs_id}");
                self.register_srs(
                    definition,
                    srs_id,
                    PROJ_ORGANIZATION,
                    srs_id,
                    definition,
                    "projection string",
                )?;
                Ok(srs_id)
            }
        }
    }

    fn srs_exists(&self, srs_id: i32) -> Result<bool> {
        let exists: i64 = self
            .conn
            .query_row(SQL_SRS_EXISTS, rusqlite::params![srs_id], |row| row.get(0))?;
        Ok(exists != 0)
    }

    /// List the names of the feature layers.
    pub fn list_layers(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(SQL_LIST_LAYERS)?;
        let layers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(layers)
    }

    /// Load a layer definition and metadata by name.
    pub fn open_layer<'a>(&'a self, layer_name: &str) -> Result<GpkgLayer<'a>> {
        GpkgLayer::load(&self.conn, self.read_only, layer_name)
    }

    /// Create a new feature layer with an `fid` primary key.
    pub fn new_layer<'a>(
        &'a self,
        layer_name: &str,
        geometry_column: &str,
        geometry_kind: GeometryKind,
        crs: &Crs,
        other_column_specs: &[ColumnSpec],
    ) -> Result<GpkgLayer<'a>> {
        self.ensure_writable()?;

        if self.list_layers()?.iter().any(|name| name == layer_name) {
            return Err(SfError::LayerAlreadyExists {
                layer_name: layer_name.to_string(),
            });
        }
        let mut seen = vec!["fid".to_string(), geometry_column.to_ascii_lowercase()];
        for spec in other_column_specs {
            let lower = spec.name.to_ascii_lowercase();
            if seen.contains(&lower) {
                return Err(SfError::DuplicateColumn {
                    column: spec.name.clone(),
                });
            }
            seen.push(lower);
        }

        with_savepoint(&self.conn, "tidysf_new_layer", || {
            self.create_layer(layer_name, geometry_column, geometry_kind, crs, other_column_specs)
        })?;
        log::info!("created layer {layer_name} ({crs})");

        GpkgLayer::load(&self.conn, self.read_only, layer_name)
    }

    fn create_layer(
        &self,
        layer_name: &str,
        geometry_column: &str,
        geometry_kind: GeometryKind,
        crs: &Crs,
        other_column_specs: &[ColumnSpec],
    ) -> Result<()> {
        let srs_id = self.ensure_srs(crs)?;

        let mut column_defs = Vec::with_capacity(other_column_specs.len() + 2);
        column_defs.push("fid INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
        column_defs.push(format!(
            "{} {}",
            quote_ident(geometry_column),
            layer_type_name(geometry_kind)
        ));
        for spec in other_column_specs {
            column_defs.push(format!(
                "{} {}",
                quote_ident(&spec.name),
                column_type_to_str(spec.column_type)
            ));
        }

        let create_sql = sql_create_table(layer_name, &column_defs.join(", "));
        log::debug!("{create_sql}");
        self.conn.execute_batch(&create_sql)?;

        self.conn.execute(
            SQL_INSERT_GPKG_CONTENTS,
            rusqlite::params![layer_name, layer_name, srs_id],
        )?;
        self.conn.execute(
            SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
            rusqlite::params![
                layer_name,
                geometry_column,
                layer_type_name(geometry_kind),
                srs_id
            ],
        )?;

        execute_rtree_sqls(&self.conn, layer_name, geometry_column, "fid")?;
        Ok(())
    }

    /// Delete a layer, its rtree index and its metadata rows.
    pub fn delete_layer(&self, layer_name: &str) -> Result<()> {
        self.ensure_writable()?;

        let meta = geometry_column_meta(&self.conn, layer_name)?;
        with_savepoint(&self.conn, "tidysf_delete_layer", || -> Result<()> {
            self.conn
                .execute_batch(&gpkg_rtree_drop_sql(layer_name, &meta.geometry_column))?;
            self.conn.execute_batch(&sql_drop_table(layer_name))?;
            for sql in SQL_DELETE_LAYER_METADATA {
                self.conn.execute(sql, [layer_name])?;
            }
            Ok(())
        })?;
        log::info!("deleted layer {layer_name}");
        Ok(())
    }

    /// Create a layer shaped after `collection` and write every feature into it.
    ///
    /// The layer's geometry type is the collection's single kind, or
    /// `GEOMETRY` when kinds are mixed. Nothing is left behind when a step
    /// fails.
    pub fn write_collection<'a>(
        &'a self,
        layer_name: &str,
        collection: &FeatureCollection,
    ) -> Result<GpkgLayer<'a>> {
        with_savepoint(&self.conn, "tidysf_write_collection", || {
            let layer = self.new_layer(
                layer_name,
                collection.geometry_column_name(),
                collection.geometry().dominant_kind(),
                collection.crs(),
                &collection.attributes().schema(),
            )?;
            layer.append_collection(collection)?;
            Ok(layer)
        })
    }

    /// Delete `layer_name` and write `collection` in its place. The old
    /// layer survives when the write fails.
    pub fn replace_collection<'a>(
        &'a self,
        layer_name: &str,
        collection: &FeatureCollection,
    ) -> Result<GpkgLayer<'a>> {
        with_savepoint(&self.conn, "tidysf_replace_collection", || {
            self.delete_layer(layer_name)?;
            self.write_collection(layer_name, collection)
        })
    }

    /// Read a whole layer as a feature collection.
    pub fn read_collection(&self, layer_name: &str) -> Result<FeatureCollection> {
        self.open_layer(layer_name)?.to_collection()
    }

    /// The underlying SQLite connection.
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(SfError::ReadOnly);
        }
        Ok(())
    }
}

/// Mixed or collection layers are declared as the generic `GEOMETRY`.
fn layer_type_name(kind: GeometryKind) -> &'static str {
    match kind {
        GeometryKind::GeometryCollection => "GEOMETRY",
        other => geometry_kind_to_str(other),
    }
}
