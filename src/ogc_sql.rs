// cf. https://www.geopackage.org/spec140/index.html#table_definition_sql

// gpkg_spatial_ref_sys: the SRS catalog referenced by gpkg_contents and
// gpkg_geometry_columns.
const SQL_GPKG_SPATIAL_REF_SYS: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
  srs_name TEXT NOT NULL,
  srs_id INTEGER PRIMARY KEY,
  organization TEXT NOT NULL,
  organization_coordsys_id INTEGER NOT NULL,
  definition  TEXT NOT NULL,
  description TEXT
);
";

// gpkg_contents: one row per user table, with its extent.
const SQL_GPKG_CONTENTS: &str = "
CREATE TABLE gpkg_contents (
  table_name TEXT NOT NULL PRIMARY KEY,
  data_type TEXT NOT NULL,
  identifier TEXT UNIQUE,
  description TEXT DEFAULT '',
  last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
  min_x DOUBLE,
  min_y DOUBLE,
  max_x DOUBLE,
  max_y DOUBLE,
  srs_id INTEGER,
  CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
";

// gpkg_geometry_columns: the geometry column and type of each feature table.
const SQL_GPKG_GEOMETRY_COLUMNS: &str = "
CREATE TABLE gpkg_geometry_columns (
  table_name TEXT NOT NULL,
  column_name TEXT NOT NULL,
  geometry_type_name TEXT NOT NULL,
  srs_id INTEGER NOT NULL,
  z TINYINT NOT NULL,
  m TINYINT NOT NULL,
  CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
  CONSTRAINT uk_gc_table_name UNIQUE (table_name),
  CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
  CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";

// gpkg_extensions: which extensions (here only the rtree index) apply to
// which table and column.
const SQL_GPKG_EXTENSIONS: &str = "
CREATE TABLE gpkg_extensions (
  table_name TEXT,
  column_name TEXT,
  extension_name TEXT NOT NULL,
  definition TEXT NOT NULL,
  scope TEXT NOT NULL,
  CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
);
";

// 'GPKG' and version 1.4.0
const SQL_APPLICATION_ID: &str = "PRAGMA application_id = 1196444487; PRAGMA user_version = 10400;";

pub(crate) const SQL_LIST_LAYERS: &str =
    "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY rowid";

pub(crate) const SQL_INSERT_GPKG_CONTENTS: &str = "
INSERT INTO gpkg_contents
  (table_name, data_type, identifier, description, srs_id)
VALUES
  (?1, 'features', ?2, '', ?3)
";

pub(crate) const SQL_UPDATE_GPKG_CONTENTS_EXTENT: &str = "
UPDATE gpkg_contents
SET min_x = ?2, min_y = ?3, max_x = ?4, max_y = ?5,
    last_change = strftime('%Y-%m-%dT%H:%M:%fZ','now')
WHERE table_name = ?1
";

pub(crate) const SQL_INSERT_GPKG_GEOMETRY_COLUMNS: &str = "
INSERT INTO gpkg_geometry_columns
  (table_name, column_name, geometry_type_name, srs_id, z, m)
VALUES
  (?1, ?2, ?3, ?4, 0, 0)
";

pub(crate) const SQL_SELECT_GEOMETRY_COLUMN_META: &str = "
SELECT g.column_name, g.geometry_type_name, g.z, g.m, g.srs_id,
       s.organization, s.organization_coordsys_id, s.definition
FROM gpkg_geometry_columns g
LEFT JOIN gpkg_spatial_ref_sys s ON s.srs_id = g.srs_id
WHERE g.table_name = ?1
";

pub(crate) const SQL_SELECT_SRS: &str = "
SELECT organization, organization_coordsys_id, definition FROM gpkg_spatial_ref_sys WHERE srs_id = ?1
";

pub(crate) const SQL_SRS_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM gpkg_spatial_ref_sys WHERE srs_id = ?1)";

pub(crate) const SQL_FIND_PROJ_SRS: &str =
    "SELECT srs_id FROM gpkg_spatial_ref_sys WHERE organization = ?1 AND definition = ?2";

pub(crate) const SQL_NEXT_CUSTOM_SRS_ID: &str =
    "SELECT MAX(COALESCE(MAX(srs_id), 0), 99999) + 1 FROM gpkg_spatial_ref_sys";

pub(crate) const SQL_INSERT_SRS: &str = "
INSERT INTO gpkg_spatial_ref_sys
  (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_INSERT_RTREE_EXTENSION: &str = "
INSERT INTO gpkg_extensions (table_name, column_name, extension_name, definition, scope)
VALUES (?1, ?2, 'gpkg_rtree_index', 'http://www.geopackage.org/spec120/#extension_rtree', 'write-only')
";

pub(crate) const SQL_DELETE_LAYER_METADATA: [&str; 3] = [
    "DELETE FROM gpkg_extensions WHERE table_name = ?1",
    "DELETE FROM gpkg_geometry_columns WHERE table_name = ?1",
    "DELETE FROM gpkg_contents WHERE table_name = ?1",
];

/// Double any embedded quote so the name can sit inside `"..."`.
pub(crate) fn quote_ident(name: &str) -> String {
    format!(r#""{}""#, name.replace('"', r#""""#))
}

pub(crate) fn sql_create_table(layer_name: &str, column_defs: &str) -> String {
    format!("CREATE TABLE {} ({})", quote_ident(layer_name), column_defs)
}

pub(crate) fn sql_drop_table(layer_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(layer_name))
}

pub(crate) fn sql_table_columns(layer_name: &str) -> String {
    format!(
        "SELECT name, type, pk FROM pragma_table_info('{}')",
        layer_name.replace('\'', "''")
    )
}

pub(crate) fn sql_select_features<'a, I>(
    layer_name: &'a str,
    geometry_column: &'a str,
    primary_key_column: &'a str,
    other_columns: I,
    batched: bool,
) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut columns = vec![quote_ident(geometry_column), quote_ident(primary_key_column)];
    columns.extend(other_columns.into_iter().map(quote_ident));

    let limit_clause = if batched { " LIMIT ?1 OFFSET ?2" } else { "" };

    format!(
        "SELECT {} FROM {} ORDER BY {}{limit_clause}",
        columns.join(", "),
        quote_ident(layer_name),
        quote_ident(primary_key_column),
    )
}

pub(crate) fn sql_delete_all(layer_name: &str) -> String {
    format!("DELETE FROM {}", quote_ident(layer_name))
}

pub(crate) fn sql_insert_feature<'a, I>(layer_name: &str, columns: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let columns: Vec<String> = columns.into_iter().map(quote_ident).collect();
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<String>>()
        .join(",");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(layer_name),
        columns.join(",")
    )
}

pub(crate) fn sql_update_feature<'a, I>(layer_name: &str, primary_key_column: &str, columns: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let assignments: Vec<String> = columns
        .into_iter()
        .enumerate()
        .map(|(idx, name)| format!("{}=?{}", quote_ident(name), idx + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {}=?{}",
        quote_ident(layer_name),
        assignments.join(","),
        quote_ident(primary_key_column),
        assignments.len() + 1
    )
}

pub(crate) fn initialize_gpkg(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SQL_APPLICATION_ID)?;
    conn.execute_batch(SQL_GPKG_SPATIAL_REF_SYS)?;
    register_default_srs_ids(conn)?;
    conn.execute_batch(SQL_GPKG_CONTENTS)?;
    conn.execute_batch(SQL_GPKG_GEOMETRY_COLUMNS)?;
    conn.execute_batch(SQL_GPKG_EXTENSIONS)?;
    Ok(())
}

const EPSG4326_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;
const EPSG3857_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#;

// The two undefined systems are mandatory. WKT for anything else comes from
// the caller or is registered as `undefined` on demand.
fn register_default_srs_ids(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    let rows: [(&str, i32, &str, i32, &str, &str); 4] = [
        ("WGS 84", 4326, "EPSG", 4326, EPSG4326_WKT, "WGS 84"),
        (
            "WGS 84 / Pseudo-Mercator",
            3857,
            "EPSG",
            3857,
            EPSG3857_WKT,
            "Web Mercator / Pseudo-Mercator",
        ),
        (
            "Undefined Cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
            "undefined Cartesian coordinate reference system",
        ),
        (
            "Undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
            "undefined geographic coordinate reference system",
        ),
    ];
    for (name, id, org, org_id, definition, description) in rows {
        conn.execute(
            SQL_INSERT_SRS,
            rusqlite::params![name, id, org, org_id, definition, description],
        )?;
    }
    Ok(())
}

fn rtree_name(table: &str, geom_column: &str) -> String {
    quote_ident(&format!("rtree_{table}_{geom_column}"))
}

// cf. https://www.geopackage.org/spec140/index.html#extension_rtree
fn gpkg_rtree_create_sql(table: &str, geom_column: &str) -> String {
    format!(
        "CREATE VIRTUAL TABLE {} USING rtree(id, minx, maxx, miny, maxy);",
        rtree_name(table, geom_column)
    )
}

const RTREE_TRIGGER_SUFFIXES: [&str; 6] =
    ["insert", "update2", "update4", "update5", "update6", "update7"];

pub(crate) fn gpkg_rtree_drop_sql(table: &str, geom_column: &str) -> String {
    let mut sql: Vec<String> = RTREE_TRIGGER_SUFFIXES
        .iter()
        .chain(std::iter::once(&"delete"))
        .map(|suffix| {
            format!(
                "DROP TRIGGER IF EXISTS {};",
                quote_ident(&format!("rtree_{table}_{geom_column}_{suffix}"))
            )
        })
        .collect();
    sql.push(format!(
        "DROP TABLE IF EXISTS {};",
        rtree_name(table, geom_column)
    ));
    sql.join("\n")
}

fn gpkg_rtree_load_sql(table: &str, geom_column: &str, id_column: &str) -> String {
    format!(
        "INSERT OR REPLACE INTO {r}
  SELECT {i}, ST_MinX({c}), ST_MaxX({c}), ST_MinY({c}), ST_MaxY({c})
  FROM {t} WHERE {c} NOT NULL AND NOT ST_IsEmpty({c});",
        r = rtree_name(table, geom_column),
        t = quote_ident(table),
        c = quote_ident(geom_column),
        i = quote_ident(id_column),
    )
}

fn gpkg_rtree_triggers_sql(table: &str, geom_column: &str, id_column: &str) -> String {
    let trigger = |suffix: &str| quote_ident(&format!("rtree_{table}_{geom_column}_{suffix}"));
    format!(
        "CREATE TRIGGER {insert} AFTER INSERT ON {t}
  WHEN (new.{c} NOT NULL AND NOT ST_IsEmpty(NEW.{c}))
BEGIN
  INSERT OR REPLACE INTO {r} VALUES (
    NEW.{i},
    ST_MinX(NEW.{c}), ST_MaxX(NEW.{c}),
    ST_MinY(NEW.{c}), ST_MaxY(NEW.{c})
  );
END;

CREATE TRIGGER {update2} AFTER UPDATE OF {c} ON {t}
  WHEN OLD.{i} = NEW.{i} AND
       (NEW.{c} ISNULL OR ST_IsEmpty(NEW.{c}))
BEGIN
  DELETE FROM {r} WHERE id = OLD.{i};
END;

CREATE TRIGGER {update4} AFTER UPDATE ON {t}
  WHEN OLD.{i} != NEW.{i} AND
       (NEW.{c} ISNULL OR ST_IsEmpty(NEW.{c}))
BEGIN
  DELETE FROM {r} WHERE id IN (OLD.{i}, NEW.{i});
END;

CREATE TRIGGER {update5} AFTER UPDATE ON {t}
  WHEN OLD.{i} != NEW.{i} AND
       (NEW.{c} NOTNULL AND NOT ST_IsEmpty(NEW.{c}))
BEGIN
  DELETE FROM {r} WHERE id = OLD.{i};
  INSERT OR REPLACE INTO {r} VALUES (
    NEW.{i},
    ST_MinX(NEW.{c}), ST_MaxX(NEW.{c}),
    ST_MinY(NEW.{c}), ST_MaxY(NEW.{c})
  );
END;

CREATE TRIGGER {update6} AFTER UPDATE OF {c} ON {t}
  WHEN OLD.{i} = NEW.{i} AND
       (NEW.{c} NOTNULL AND NOT ST_IsEmpty(NEW.{c})) AND
       (OLD.{c} NOTNULL AND NOT ST_IsEmpty(OLD.{c}))
BEGIN
  UPDATE {r} SET
    minx = ST_MinX(NEW.{c}),
    maxx = ST_MaxX(NEW.{c}),
    miny = ST_MinY(NEW.{c}),
    maxy = ST_MaxY(NEW.{c})
  WHERE id = NEW.{i};
END;

CREATE TRIGGER {update7} AFTER UPDATE OF {c} ON {t}
  WHEN OLD.{i} = NEW.{i} AND
       (NEW.{c} NOTNULL AND NOT ST_IsEmpty(NEW.{c})) AND
       (OLD.{c} ISNULL OR ST_IsEmpty(OLD.{c}))
BEGIN
  INSERT INTO {r} VALUES (
    NEW.{i},
    ST_MinX(NEW.{c}), ST_MaxX(NEW.{c}),
    ST_MinY(NEW.{c}), ST_MaxY(NEW.{c})
  );
END;

CREATE TRIGGER {delete} AFTER DELETE ON {t}
  WHEN old.{c} NOT NULL
BEGIN
  DELETE FROM {r} WHERE id = OLD.{i};
END;",
        insert = trigger("insert"),
        update2 = trigger("update2"),
        update4 = trigger("update4"),
        update5 = trigger("update5"),
        update6 = trigger("update6"),
        update7 = trigger("update7"),
        delete = trigger("delete"),
        r = rtree_name(table, geom_column),
        t = quote_ident(table),
        c = quote_ident(geom_column),
        i = quote_ident(id_column),
    )
}

/// Create, fill and wire up the rtree index of a feature table.
pub(crate) fn execute_rtree_sqls(
    conn: &rusqlite::Connection,
    table: &str,
    geom_column: &str,
    id_column: &str,
) -> rusqlite::Result<()> {
    conn.execute_batch(&gpkg_rtree_create_sql(table, geom_column))?;
    conn.execute_batch(&gpkg_rtree_load_sql(table, geom_column, id_column))?;
    conn.execute_batch(&gpkg_rtree_triggers_sql(table, geom_column, id_column))?;
    conn.execute(
        SQL_INSERT_RTREE_EXTENSION,
        rusqlite::params![table, geom_column],
    )?;
    Ok(())
}

/// Run `f` inside a named savepoint. The work is released on success and
/// rolled back on error. Savepoints nest, so `f` may open its own.
pub(crate) fn with_savepoint<T, E, F>(conn: &rusqlite::Connection, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}")) {
                log::warn!("failed to roll back savepoint {name}: {rollback}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("points"), r#""points""#);
        assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
    }

    #[test]
    fn select_with_and_without_batches() {
        let all = sql_select_features("pts", "geom", "fid", ["name"], false);
        assert_eq!(
            all,
            r#"SELECT "geom", "fid", "name" FROM "pts" ORDER BY "fid""#
        );
        let batched = sql_select_features("pts", "geom", "fid", [], true);
        assert!(batched.ends_with("LIMIT ?1 OFFSET ?2"));
    }

    #[test]
    fn update_places_id_last() {
        let sql = sql_update_feature("pts", "fid", ["geom", "name"]);
        assert_eq!(
            sql,
            r#"UPDATE "pts" SET "geom"=?1,"name"=?2 WHERE "fid"=?3"#
        );
    }

    #[test]
    fn rtree_drop_is_valid_sql() -> rusqlite::Result<()> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(&gpkg_rtree_create_sql("pts", "geom"))?;
        conn.execute_batch(&gpkg_rtree_drop_sql("pts", "geom"))?;
        let remaining: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'rtree_pts_geom'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(remaining, 0);
        Ok(())
    }

    #[test]
    fn savepoints_nest_and_roll_back() -> rusqlite::Result<()> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch("CREATE TABLE t (v INTEGER)")?;
        let failed: rusqlite::Result<()> = with_savepoint(&conn, "outer", || {
            conn.execute("INSERT INTO t VALUES (1)", [])?;
            with_savepoint(&conn, "inner", || conn.execute("INSERT INTO t VALUES (2)", []))?;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(failed.is_err());
        with_savepoint(&conn, "outer", || conn.execute("INSERT INTO t VALUES (3)", []))?;

        let total: i64 = conn.query_row("SELECT sum(v) FROM t", [], |row| row.get(0))?;
        assert_eq!(total, 3);
        assert!(conn.is_autocommit());
        Ok(())
    }
}
