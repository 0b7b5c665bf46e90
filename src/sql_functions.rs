use crate::error::Result;
use crate::gpkg::gpkg_blob_bounds;
use geo::Rect;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Error};

/// Register the spatial SQL functions the GeoPackage rtree triggers call:
/// `ST_MinX`, `ST_MaxX`, `ST_MinY`, `ST_MaxY` and `ST_IsEmpty`.
///
/// Each takes one GeoPackage geometry blob. `NULL` in gives `NULL` out.
///
/// ```
/// use rusqlite::Connection;
/// use tidysf::register_spatial_functions;
///
/// let conn = Connection::open_in_memory()?;
/// register_spatial_functions(&conn)?;
/// let empty: Option<i64> = conn.query_row("SELECT ST_IsEmpty(NULL)", [], |row| row.get(0))?;
/// assert_eq!(empty, None);
/// # Ok::<(), tidysf::SfError>(())
/// ```
pub fn register_spatial_functions(conn: &Connection) -> Result<()> {
    register_bounds_component(conn, "ST_MinX", |b| b.min().x)?;
    register_bounds_component(conn, "ST_MaxX", |b| b.max().x)?;
    register_bounds_component(conn, "ST_MinY", |b| b.min().y)?;
    register_bounds_component(conn, "ST_MaxY", |b| b.max().y)?;

    conn.create_scalar_function(
        "ST_IsEmpty",
        1,
        FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let Some(bounds) = bounds_from_ctx(ctx)? else {
                return Ok(None);
            };
            Ok(Some(i64::from(bounds.is_none())))
        },
    )?;
    Ok(())
}

fn register_bounds_component<F>(conn: &Connection, name: &str, f: F) -> Result<()>
where
    F: Fn(Rect<f64>) -> f64 + Copy + Send + Sync + 'static,
{
    conn.create_scalar_function(name, 1, FunctionFlags::SQLITE_DETERMINISTIC, move |ctx| {
        Ok(bounds_from_ctx(ctx)?.flatten().map(f))
    })?;
    Ok(())
}

/// `None` for a SQL `NULL`, `Some(None)` for an empty geometry.
fn bounds_from_ctx(ctx: &Context<'_>) -> std::result::Result<Option<Option<Rect<f64>>>, Error> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(blob) => gpkg_blob_bounds(blob)
            .map(Some)
            .map_err(|err| Error::UserFunctionError(Box::new(err))),
        _ => Err(Error::InvalidFunctionParameterType(0, Type::Blob)),
    }
}
