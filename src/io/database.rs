use crate::collection::FeatureCollection;
use crate::conversions::{empty_geometry, geometry_kind_from_str};
use crate::crs::Crs;
use crate::error::{Result, SfError};
use crate::geometry::GeometryColumn;
use crate::gpkg::{GpkgLayer, gpkg_blob_to_geometry, is_gpkg_blob, parse_header};
use crate::ogc_sql::SQL_SELECT_SRS;
use crate::table::{Column, Table};
use crate::value::Value;
use rusqlite::{Connection, OptionalExtension};

/// Read a GeoPackage feature table through an open connection.
///
/// The CRS comes from `gpkg_geometry_columns` and `gpkg_spatial_ref_sys`.
pub fn read_sf_table(conn: &Connection, table: &str) -> Result<FeatureCollection> {
    GpkgLayer::load(conn, true, table)?.to_collection()
}

/// Run a query and read its result as a feature collection.
///
/// The geometry is the first column whose non-null cells are all GeoPackage
/// geometry blobs. When no row holds a blob (an empty result, or only `NULL`
/// geometries), it is the first column declared with a GeoPackage geometry
/// type. Unless `crs` is given, the CRS is looked up from the `srs_id` in the
/// blob headers, and is undefined when there are none.
///
/// ```
/// use geo::{Geometry, Point};
/// use tidysf::io::read_sf_query;
/// use tidysf::{Crs, GeometryKind, Gpkg, values};
///
/// let gpkg = Gpkg::new_in_memory()?;
/// let layer = gpkg.new_layer("pts", "geom", GeometryKind::Point, &Crs::Epsg(3857), &[])?;
/// layer.insert(&Geometry::Point(Point::new(1.0, 2.0)), values![])?;
///
/// let fc = read_sf_query(gpkg.connection(), "SELECT fid * 10 AS id, geom FROM pts", None)?;
/// assert_eq!(fc.crs(), &Crs::Epsg(3857));
/// assert_eq!(fc.geometry_column_name(), "geom");
/// # Ok::<(), tidysf::SfError>(())
/// ```
pub fn read_sf_query(conn: &Connection, sql: &str, crs: Option<Crs>) -> Result<FeatureCollection> {
    log::debug!("{sql}");
    let mut stmt = conn.prepare(sql)?;
    let mut names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let declared: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|column| column.decl_type().map(String::from))
        .collect();

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    let mut rows = stmt.query([])?;
    let mut nrow = 0;
    while let Some(row) = rows.next()? {
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(Value::from(row.get_ref(idx)?));
        }
        nrow += 1;
    }

    let geometry_idx = cells
        .iter()
        .position(|column| is_geometry_column(column))
        .or_else(|| {
            cells.iter().zip(&declared).position(|(column, decl_type)| {
                column.iter().all(Value::is_null)
                    && decl_type
                        .as_deref()
                        .is_some_and(|t| geometry_kind_from_str(t).is_ok())
            })
        })
        .ok_or_else(|| SfError::MissingGeometryColumn {
            layer_name: sql.to_string(),
        })?;

    let geometry_values = cells.remove(geometry_idx);
    let geometry_name = names.remove(geometry_idx);

    let crs = match crs {
        Some(crs) => crs,
        None => crs_from_blobs(conn, &geometry_values)?,
    };
    let geometries = geometry_values
        .iter()
        .map(|value| match value {
            Value::Blob(bytes) => gpkg_blob_to_geometry(bytes),
            _ => Ok(empty_geometry()),
        })
        .collect::<Result<Vec<_>>>()?;

    let attributes = Table::with_nrow(
        nrow,
        names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )?;
    FeatureCollection::new(attributes, GeometryColumn::new(geometry_name, crs, geometries))
}

fn is_geometry_column(values: &[Value]) -> bool {
    let mut found = false;
    for value in values {
        match value {
            Value::Null => {}
            Value::Blob(bytes) if is_gpkg_blob(bytes) => found = true,
            _ => return false,
        }
    }
    found
}

fn crs_from_blobs(conn: &Connection, values: &[Value]) -> Result<Crs> {
    let mut srs_id = None;
    for value in values {
        let Value::Blob(bytes) = value else {
            continue;
        };
        let id = parse_header(bytes)?.srs_id;
        match srs_id {
            None => srs_id = Some(id),
            Some(first) if first != id => {
                return Err(SfError::CrsMismatch {
                    left: format!("srs_id {first}"),
                    right: format!("srs_id {id}"),
                });
            }
            Some(_) => {}
        }
    }
    let Some(srs_id) = srs_id else {
        return Ok(Crs::Undefined);
    };

    let row = conn
        .query_row(SQL_SELECT_SRS, [srs_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<i32>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .optional()?;
    match row {
        Some((organization, code, definition)) => Ok(Crs::from_srs_row(
            organization.as_deref(),
            code.unwrap_or(srs_id),
            definition.as_deref(),
        )),
        None => Err(SfError::MissingSpatialRefSysId { srs_id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::tests::cities;
    use crate::geometry::GeometryKind;
    use crate::gpkg::Gpkg;
    use crate::values;

    #[test]
    fn table_source_resolves_crs() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.write_collection("cities", &cities().set_crs(Crs::Epsg(27700)))?;
        let fc = read_sf_table(gpkg.connection(), "cities")?;
        assert_eq!(fc.crs(), &Crs::Epsg(27700));
        assert_eq!(fc.nrow(), 3);
        Ok(())
    }

    #[test]
    fn query_finds_geometry_and_keeps_attributes() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.write_collection("cities", &cities())?;

        let fc = read_sf_query(
            gpkg.connection(),
            "SELECT name, upper(country) AS cc, geometry FROM cities WHERE country = 'FR'",
            None,
        )?;
        assert_eq!(fc.nrow(), 2);
        assert_eq!(fc.crs(), &Crs::Epsg(4326));
        assert_eq!(fc.attributes().column_names(), vec!["name", "cc"]);
        assert_eq!(fc.geometry().as_slice(), &cities().geometry().as_slice()[..2]);

        let overridden = read_sf_query(
            gpkg.connection(),
            "SELECT geometry FROM cities",
            Some(Crs::Undefined),
        )?;
        assert_eq!(overridden.crs(), &Crs::Undefined);
        Ok(())
    }

    #[test]
    fn query_without_blobs_uses_declared_type() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let layer = gpkg.new_layer("pts", "geom", GeometryKind::Point, &Crs::Epsg(3857), &[])?;

        let empty = read_sf_query(gpkg.connection(), "SELECT fid, geom FROM pts", None)?;
        assert_eq!(empty.nrow(), 0);
        assert_eq!(empty.geometry_column_name(), "geom");
        assert_eq!(empty.crs(), &Crs::Undefined);

        layer.insert(&empty_geometry(), values![])?;
        let nulls = read_sf_query(
            gpkg.connection(),
            "SELECT fid, geom FROM pts",
            Some(Crs::Epsg(3857)),
        )?;
        assert_eq!(nulls.nrow(), 1);
        assert_eq!(nulls.attributes().column_names(), vec!["fid"]);
        assert!(crate::geometry::is_empty(&nulls.geometry().as_slice()[0]));
        assert_eq!(nulls.crs(), &Crs::Epsg(3857));
        Ok(())
    }

    #[test]
    fn query_without_geometry_fails() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.write_collection("cities", &cities())?;
        assert!(matches!(
            read_sf_query(gpkg.connection(), "SELECT name FROM cities", None),
            Err(SfError::MissingGeometryColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn unknown_srs_id_is_reported() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let conn = gpkg.connection();
        conn.execute("CREATE TABLE raw (g BLOB)", [])?;
        let blob = crate::gpkg::geometry_to_gpkg_blob(
            &geo::Geometry::Point(geo::Point::new(1.0, 1.0)),
            12345,
        )?;
        conn.execute("INSERT INTO raw (g) VALUES (?1)", [blob])?;
        assert!(matches!(
            read_sf_query(conn, "SELECT g FROM raw", None),
            Err(SfError::MissingSpatialRefSysId { srs_id: 12345 })
        ));
        Ok(())
    }
}
