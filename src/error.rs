use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Crate error type for feature collections, tidy verbs and their I/O.
#[derive(Debug)]
pub enum SfError {
    /// Wraps errors returned by `rusqlite`.
    Sql(rusqlite::Error),
    /// Wraps errors returned by the `wkb` crate.
    Wkb(wkb::error::WkbError),
    /// WKT text could not be parsed or written.
    Wkt(String),
    /// Wraps errors returned by the `geojson` crate.
    GeoJson(geojson::Error),
    /// Wraps errors returned by `serde_json`.
    Json(serde_json::Error),
    /// Wraps errors returned by the `csv` crate.
    Csv(csv::Error),
    /// Wraps I/O errors.
    Io(std::io::Error),
    /// Wraps errors returned by PROJ as strings.
    #[cfg(feature = "proj")]
    Proj(String),
    /// A geometry is of a kind the requested operation cannot handle.
    UnsupportedGeometryType(String),
    /// A column type declared in SQLite metadata is not supported by this crate.
    UnsupportedColumnType {
        column: String,
        declared_type: String,
    },
    /// Invalid or mixed `z` / `m` dimension flags in GeoPackage metadata.
    InvalidDimension {
        z: i8,
        m: i8,
    },
    /// Property count did not match the layer schema.
    InvalidPropertyCount {
        expected: usize,
        got: usize,
    },
    /// Invalid GeoPackage geometry flags byte.
    InvalidGpkgGeometryFlags(u8),
    /// GeoPackage geometry blob is too short for the fixed header.
    InvalidGpkgGeometryLength {
        len: usize,
        minimum: usize,
    },
    /// GeoPackage geometry blob is too short for the declared envelope payload.
    InvalidGpkgGeometryEnvelope {
        len: usize,
        required: usize,
    },
    /// Dynamic `Value` type did not match the expected conversion target.
    ValueTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Numeric conversion failed because the value is out of range.
    ValueOutOfRange {
        target: &'static str,
    },
    /// A referenced column does not exist.
    MissingColumn {
        column: String,
    },
    /// Two columns share one name.
    DuplicateColumn {
        column: String,
    },
    /// A column's length disagrees with the table's row count.
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },
    /// The geometry column's length disagrees with the attribute row count.
    GeometryLengthMismatch {
        rows: usize,
        geometries: usize,
    },
    /// A coordinate attribute is null or not numeric.
    InvalidCoordinate {
        row: usize,
        column: String,
    },
    /// A reshaping step found the same key twice.
    DuplicateKey {
        key: String,
    },
    /// A CRS specifier could not be parsed.
    InvalidCrs(String),
    /// The operation needs a defined CRS.
    UndefinedCrs,
    /// Two collections combined by an operation have different CRS.
    CrsMismatch {
        left: String,
        right: String,
    },
    /// No transformer is available for the CRS pair.
    UnsupportedTransform {
        from: String,
        to: String,
    },
    /// The file format could not be inferred or is not supported.
    UnsupportedFormat(String),
    /// The output already exists and neither overwrite nor append was requested.
    AlreadyExists(PathBuf),
    /// The input does not exist.
    NotFound(PathBuf),
    /// A layer with the same name already exists.
    LayerAlreadyExists {
        layer_name: String,
    },
    /// A requested layer does not exist.
    MissingLayer {
        layer_name: String,
    },
    /// Referenced `srs_id` does not exist in `gpkg_spatial_ref_sys`.
    MissingSpatialRefSysId {
        srs_id: i32,
    },
    /// Layer schema has multiple primary key columns, which is unsupported.
    CompositePrimaryKeyUnsupported {
        layer_name: String,
    },
    /// Layer schema has no primary key column.
    MissingPrimaryKeyColumn {
        layer_name: String,
    },
    /// Layer or query has no geometry column.
    MissingGeometryColumn {
        layer_name: String,
    },
    ReadOnly,
}

impl fmt::Display for SfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "{err}"),
            Self::Wkb(err) => write!(f, "{err}"),
            Self::Wkt(err) => write!(f, "wkt error: {err}"),
            Self::GeoJson(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            #[cfg(feature = "proj")]
            Self::Proj(err) => write!(f, "proj error: {err}"),
            Self::UnsupportedGeometryType(ty) => write!(f, "unsupported geometry type: {ty}"),
            Self::UnsupportedColumnType {
                column,
                declared_type,
            } => write!(
                f,
                "unsupported column type for column '{column}': {declared_type}"
            ),
            Self::InvalidDimension { z, m } => {
                write!(f, "invalid or mixed geometry dimension (z={z}, m={m})")
            }
            Self::InvalidPropertyCount { expected, got } => {
                write!(f, "invalid property count: expected {expected}, got {got}")
            }
            Self::InvalidGpkgGeometryFlags(flags) => {
                write!(f, "invalid gpkg geometry flags: {flags:#04x}")
            }
            Self::InvalidGpkgGeometryLength { len, minimum } => {
                write!(
                    f,
                    "invalid gpkg geometry length: got {len} bytes, expected at least {minimum}"
                )
            }
            Self::InvalidGpkgGeometryEnvelope { len, required } => {
                write!(
                    f,
                    "invalid gpkg geometry envelope length: got {len} bytes, required {required}"
                )
            }
            Self::ValueTypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            Self::ValueOutOfRange { target } => {
                write!(f, "value out of range for {target}")
            }
            Self::MissingColumn { column } => write!(f, "missing column: {column}"),
            Self::DuplicateColumn { column } => write!(f, "duplicate column: {column}"),
            Self::ColumnLengthMismatch {
                column,
                expected,
                got,
            } => write!(
                f,
                "column '{column}' has {got} values, expected {expected}"
            ),
            Self::GeometryLengthMismatch { rows, geometries } => write!(
                f,
                "geometry column has {geometries} geometries but the collection has {rows} rows"
            ),
            Self::InvalidCoordinate { row, column } => {
                write!(f, "invalid coordinate in column '{column}' at row {row}")
            }
            Self::DuplicateKey { key } => write!(f, "duplicate key: {key}"),
            Self::InvalidCrs(crs) => write!(f, "invalid crs specifier: {crs}"),
            Self::UndefinedCrs => write!(f, "operation requires a defined crs"),
            Self::CrsMismatch { left, right } => {
                write!(f, "crs mismatch: {left} vs {right}")
            }
            Self::UnsupportedTransform { from, to } => {
                write!(f, "no transformation available from {from} to {to}")
            }
            Self::UnsupportedFormat(format) => write!(f, "unsupported format: {format}"),
            Self::AlreadyExists(path) => write!(f, "already exists: {}", path.display()),
            Self::NotFound(path) => write!(f, "not found: {}", path.display()),
            Self::LayerAlreadyExists { layer_name } => {
                write!(f, "layer already exists: {layer_name}")
            }
            Self::MissingLayer { layer_name } => write!(f, "no such layer: {layer_name}"),
            Self::MissingSpatialRefSysId { srs_id } => {
                write!(f, "srs_id {srs_id} not found in gpkg_spatial_ref_sys")
            }
            Self::CompositePrimaryKeyUnsupported { layer_name } => write!(
                f,
                "composite primary keys are not supported yet for layer: {layer_name}"
            ),
            Self::MissingPrimaryKeyColumn { layer_name } => {
                write!(f, "no primary key column found for layer: {layer_name}")
            }
            Self::MissingGeometryColumn { layer_name } => {
                write!(f, "no geometry column found for layer: {layer_name}")
            }
            Self::ReadOnly => write!(f, "operation not allowed on read-only connection"),
        }
    }
}

impl Error for SfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sql(err) => Some(err),
            Self::Wkb(err) => Some(err),
            Self::GeoJson(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SfError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err)
    }
}

impl From<wkb::error::WkbError> for SfError {
    fn from(err: wkb::error::WkbError) -> Self {
        Self::Wkb(err)
    }
}

impl From<geojson::Error> for SfError {
    fn from(err: geojson::Error) -> Self {
        Self::GeoJson(err)
    }
}

impl From<serde_json::Error> for SfError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<csv::Error> for SfError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<std::io::Error> for SfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(feature = "proj")]
impl From<proj::ProjCreateError> for SfError {
    fn from(err: proj::ProjCreateError) -> Self {
        Self::Proj(err.to_string())
    }
}

#[cfg(feature = "proj")]
impl From<proj::ProjError> for SfError {
    fn from(err: proj::ProjError) -> Self {
        Self::Proj(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SfError>;
