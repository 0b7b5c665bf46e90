//! Reading and writing tables and feature collections.
//!
//! The driver is picked from the file extension:
//!
//! | extension                  | driver     |
//! |----------------------------|------------|
//! | `.gpkg`                    | GeoPackage |
//! | `.geojson`, `.json`        | GeoJSON    |
//! | `.csv`, `.tsv`, `.txt`     | delimited  |
//!
//! ```no_run
//! use tidysf::io::{ReadOptions, WriteOptions, read_sf, write_sf};
//!
//! let cities = read_sf("cities.csv", &ReadOptions::default().coordinates("lon", "lat").crs(4326))?;
//! write_sf(&cities, "cities.gpkg", &WriteOptions::default().overwrite(true))?;
//! # Ok::<(), tidysf::SfError>(())
//! ```

mod database;
mod delimited;
mod json;

use crate::collection::FeatureCollection;
use crate::crs::Crs;
use crate::error::{Result, SfError};
use crate::gpkg::Gpkg;
use crate::table::Table;
use crate::types::ColumnType;
use std::path::Path;

pub use database::{read_sf_query, read_sf_table};
pub use json::{from_geojson_str, to_geojson_string};

/// File formats understood by [`read_sf`] and [`write_sf`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    GeoPackage,
    GeoJson,
    Csv,
}

impl Driver {
    pub fn from_path(path: &Path) -> Result<Driver> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gpkg") => Ok(Driver::GeoPackage),
            Some("geojson" | "json") => Ok(Driver::GeoJson),
            Some("csv" | "tsv" | "txt") => Ok(Driver::Csv),
            _ => Err(SfError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Driver::GeoPackage => "GPKG",
            Driver::GeoJson => "GeoJSON",
            Driver::Csv => "CSV",
        }
    }
}

/// Options for delimited text.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    /// Per-column type overrides; other columns are inferred.
    pub column_types: Vec<(String, ColumnType)>,
    /// Cells read as null. The first entry is written for nulls.
    pub null_values: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            column_types: Vec::new(),
            null_values: vec![String::new(), "NA".to_string()],
        }
    }
}

impl CsvOptions {
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn has_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn column_type(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.push((name.into(), column_type));
        self
    }

    pub fn null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// `.tsv` files default to tabs unless a delimiter was chosen.
    fn delimiter_for(&self, path: &Path) -> u8 {
        let is_tsv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
        if is_tsv && self.delimiter == b',' {
            b'\t'
        } else {
            self.delimiter
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadOptions {
    /// GeoPackage layer; the first layer when unset.
    pub layer: Option<String>,
    /// CRS to assign, replacing whatever the file declares.
    pub crs: Option<Crs>,
    pub csv: CsvOptions,
    /// X and Y columns of a delimited file.
    pub coordinates: Option<(String, String)>,
    /// WKT column of a delimited file.
    pub wkt_column: Option<String>,
}

impl ReadOptions {
    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn crs(mut self, crs: impl Into<Crs>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn coordinates(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.coordinates = Some((x.into(), y.into()));
        self
    }

    pub fn wkt_column(mut self, column: impl Into<String>) -> Self {
        self.wkt_column = Some(column.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteOptions {
    /// GeoPackage layer; the file stem when unset.
    pub layer: Option<String>,
    /// Replace an existing file, or an existing layer of a GeoPackage.
    pub overwrite: bool,
    pub append: bool,
    pub csv: CsvOptions,
    /// Write delimited geometry as one WKT column instead of `X`/`Y`.
    pub geometry_as_wkt: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            layer: None,
            overwrite: false,
            append: false,
            csv: CsvOptions::default(),
            geometry_as_wkt: true,
        }
    }
}

impl WriteOptions {
    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn geometry_as_wkt(mut self, geometry_as_wkt: bool) -> Self {
        self.geometry_as_wkt = geometry_as_wkt;
        self
    }
}

/// Read a delimited text file into a table.
pub fn read_table<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Table> {
    let path = path.as_ref();
    ensure_exists(path)?;
    delimited::read_table(path, options)
}

/// Write a table as delimited text, replacing any existing file.
pub fn write_table<P: AsRef<Path>>(table: &Table, path: P, options: &CsvOptions) -> Result<()> {
    let path = path.as_ref();
    delimited::write_table(table, path, options)?;
    log::info!("wrote {} rows to {}", table.nrow(), path.display());
    Ok(())
}

/// Read a feature collection from a spatial or delimited file.
pub fn read_sf<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let driver = Driver::from_path(path)?;
    ensure_exists(path)?;
    log::debug!("reading {} with driver {}", path.display(), driver.name());

    let collection = match driver {
        Driver::GeoPackage => read_gpkg(path, options.layer.as_deref())?,
        Driver::GeoJson => json::read_geojson(path)?,
        Driver::Csv => {
            let table = delimited::read_table(path, &options.csv)?;
            let crs = options.crs.clone().unwrap_or_default();
            return match (&options.coordinates, &options.wkt_column) {
                (Some((x, y)), _) => FeatureCollection::from_coordinates(&table, x, y, crs),
                (None, Some(column)) => FeatureCollection::from_wkt_column(&table, column, crs),
                (None, None) => Err(SfError::MissingGeometryColumn {
                    layer_name: path.display().to_string(),
                }),
            };
        }
    };

    Ok(match &options.crs {
        Some(crs) => collection.set_crs(crs.clone()),
        None => collection,
    })
}

fn read_gpkg(path: &Path, layer: Option<&str>) -> Result<FeatureCollection> {
    let gpkg = Gpkg::open_read_only(path)?;
    let layer_name = match layer {
        Some(layer) => layer.to_string(),
        None => {
            let layers = gpkg.list_layers()?;
            let Some(first) = layers.first() else {
                return Err(SfError::MissingLayer {
                    layer_name: file_stem(path),
                });
            };
            if layers.len() > 1 {
                log::warn!(
                    "{} has {} layers; reading the first one, {first}",
                    path.display(),
                    layers.len()
                );
            }
            first.clone()
        }
    };
    gpkg.read_collection(&layer_name)
}

/// Write a feature collection, choosing the format from the extension.
///
/// An existing target needs `overwrite` or `append`. For a GeoPackage only
/// the layer counts: writing a new layer into an existing file is allowed.
pub fn write_sf<P: AsRef<Path>>(
    collection: &FeatureCollection,
    path: P,
    options: &WriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let driver = Driver::from_path(path)?;
    log::debug!("writing {} with driver {}", path.display(), driver.name());

    if driver == Driver::GeoPackage {
        return write_gpkg(collection, path, options);
    }

    let appended;
    let mut collection = collection;
    if path.exists() {
        if options.overwrite {
            log::debug!("overwriting {}", path.display());
        } else if options.append {
            let existing = read_sf(path, &append_read_options(collection, options, driver))?;
            appended = existing.bind_rows(collection)?;
            collection = &appended;
        } else {
            return Err(SfError::AlreadyExists(path.to_path_buf()));
        }
    }

    match driver {
        Driver::GeoJson => json::write_geojson(collection, path)?,
        _ => {
            let table = delimited::collection_to_table(collection, options.geometry_as_wkt)?;
            delimited::write_table(&table, path, &options.csv)?;
        }
    }
    log::info!("wrote {} features to {}", collection.nrow(), path.display());
    Ok(())
}

/// How to read back a file this crate wrote, so rows can be appended to it.
fn append_read_options(
    collection: &FeatureCollection,
    options: &WriteOptions,
    driver: Driver,
) -> ReadOptions {
    let read = ReadOptions::default().csv(options.csv.clone());
    match driver {
        Driver::Csv if options.geometry_as_wkt => read
            .wkt_column(collection.geometry_column_name())
            .crs(collection.crs().clone()),
        Driver::Csv => read.coordinates("X", "Y").crs(collection.crs().clone()),
        _ => read,
    }
}

fn write_gpkg(collection: &FeatureCollection, path: &Path, options: &WriteOptions) -> Result<()> {
    let layer_name = options.layer.clone().unwrap_or_else(|| file_stem(path));
    let gpkg = if path.exists() {
        Gpkg::open(path)?
    } else {
        Gpkg::new(path)?
    };

    let exists = gpkg.list_layers()?.iter().any(|name| *name == layer_name);
    if !exists {
        gpkg.write_collection(&layer_name, collection)?;
    } else if options.overwrite {
        gpkg.replace_collection(&layer_name, collection)?;
    } else if options.append {
        gpkg.open_layer(&layer_name)?.append_collection(collection)?;
    } else {
        return Err(SfError::LayerAlreadyExists { layer_name });
    }
    Ok(())
}

/// Layer names of a GeoPackage. Other formats hold one layer named after
/// the file.
pub fn list_layers<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    ensure_exists(path)?;
    match Driver::from_path(path)? {
        Driver::GeoPackage => Gpkg::open_read_only(path)?.list_layers(),
        _ => Ok(vec![file_stem(path)]),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string())
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(SfError::NotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::tests::cities;
    use crate::value::Value;

    #[test]
    fn drivers_from_extension() -> crate::Result<()> {
        assert_eq!(Driver::from_path(Path::new("a.GPKG"))?, Driver::GeoPackage);
        assert_eq!(Driver::from_path(Path::new("a.json"))?, Driver::GeoJson);
        assert_eq!(Driver::from_path(Path::new("dir/a.tsv"))?, Driver::Csv);
        assert!(matches!(
            Driver::from_path(Path::new("a.shp")),
            Err(SfError::UnsupportedFormat(_))
        ));
        assert!(Driver::from_path(Path::new("noext")).is_err());
        Ok(())
    }

    #[test]
    fn tsv_defaults_to_tab() {
        let options = CsvOptions::default();
        assert_eq!(options.delimiter_for(Path::new("a.tsv")), b'\t');
        assert_eq!(options.delimiter_for(Path::new("a.csv")), b',');
        assert_eq!(
            options.delimiter(b';').delimiter_for(Path::new("a.tsv")),
            b';'
        );
    }

    #[test]
    fn gpkg_round_trip_and_layer_rules() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cities.gpkg");

        write_sf(&cities(), &path, &WriteOptions::default())?;
        assert_eq!(list_layers(&path)?, vec!["cities".to_string()]);
        assert_eq!(read_sf(&path, &ReadOptions::default())?, cities());

        assert!(matches!(
            write_sf(&cities(), &path, &WriteOptions::default()),
            Err(SfError::LayerAlreadyExists { .. })
        ));

        write_sf(&cities(), &path, &WriteOptions::default().append(true))?;
        assert_eq!(read_sf(&path, &ReadOptions::default())?.nrow(), 6);

        write_sf(&cities(), &path, &WriteOptions::default().overwrite(true))?;
        assert_eq!(read_sf(&path, &ReadOptions::default())?.nrow(), 3);

        let clashing = cities().rename(&[("country", "fid")])?;
        assert!(write_sf(&clashing, &path, &WriteOptions::default().overwrite(true)).is_err());
        assert_eq!(read_sf(&path, &ReadOptions::default())?, cities());

        write_sf(&cities().head(1), &path, &WriteOptions::default().layer("capital"))?;
        assert_eq!(list_layers(&path)?.len(), 2);
        let capital = read_sf(&path, &ReadOptions::default().layer("capital"))?;
        assert_eq!(capital.attributes().value(0, "name"), Some(&Value::from("Paris")));
        Ok(())
    }

    #[test]
    fn geojson_existing_file_needs_overwrite() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cities.geojson");

        write_sf(&cities(), &path, &WriteOptions::default())?;
        assert!(matches!(
            write_sf(&cities(), &path, &WriteOptions::default()),
            Err(SfError::AlreadyExists(_))
        ));
        write_sf(&cities(), &path, &WriteOptions::default().append(true))?;
        assert_eq!(read_sf(&path, &ReadOptions::default())?.nrow(), 6);

        write_sf(&cities(), &path, &WriteOptions::default().overwrite(true))?;
        let back = read_sf(&path, &ReadOptions::default())?;
        assert_eq!(back, cities());
        Ok(())
    }

    #[test]
    fn csv_with_wkt_and_coordinates() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let wkt_path = dir.path().join("wkt.csv");
        write_sf(&cities(), &wkt_path, &WriteOptions::default())?;
        let back = read_sf(
            &wkt_path,
            &ReadOptions::default().wkt_column("geometry").crs(4326),
        )?;
        assert_eq!(back, cities());

        let xy_path = dir.path().join("xy.csv");
        write_sf(
            &cities(),
            &xy_path,
            &WriteOptions::default().geometry_as_wkt(false),
        )?;
        write_sf(
            &cities(),
            &xy_path,
            &WriteOptions::default().geometry_as_wkt(false).append(true),
        )?;
        let back = read_sf(
            &xy_path,
            &ReadOptions::default().coordinates("X", "Y").crs(4326),
        )?;
        assert_eq!(back.nrow(), 6);
        assert_eq!(back.geometry().get(3), cities().geometry().get(0));

        assert!(matches!(
            read_sf(&xy_path, &ReadOptions::default()),
            Err(SfError::MissingGeometryColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn csv_geometry_column_keeps_its_name() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("roads.csv");
        std::fs::write(&path, "geometry,x,y\nroad,1.5,2.5\n")?;

        let fc = read_sf(&path, &ReadOptions::default().coordinates("x", "y"))?;
        assert_eq!(fc.geometry_column_name(), "geometry.1");
        assert_eq!(fc.attributes().value(0, "geometry"), Some(&Value::from("road")));
        Ok(())
    }

    #[test]
    fn crs_option_overrides_file_metadata() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cities.geojson");
        write_sf(&cities(), &path, &WriteOptions::default())?;
        let back = read_sf(&path, &ReadOptions::default().crs(Crs::Undefined))?;
        assert_eq!(back.crs(), &Crs::Undefined);
        Ok(())
    }

    #[test]
    fn missing_inputs() {
        assert!(matches!(
            read_sf("does/not/exist.gpkg", &ReadOptions::default()),
            Err(SfError::NotFound(_))
        ));
        assert!(matches!(
            read_table("does/not/exist.csv", &CsvOptions::default()),
            Err(SfError::NotFound(_))
        ));
    }
}
