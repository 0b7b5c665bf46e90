use super::CsvOptions;
use crate::collection::FeatureCollection;
use crate::error::Result;
use crate::geometry::{geometry_to_wkt, is_empty};
use crate::table::{Column, Table};
use crate::types::ColumnType;
use crate::value::Value;
use std::io::{Read, Write};
use std::path::Path;

pub(super) fn read_table(path: &Path, options: &CsvOptions) -> Result<Table> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter_for(path))
        .has_headers(options.has_headers)
        .from_path(path)?;
    read_records(reader, options)
}

fn read_records<R: Read>(mut reader: csv::Reader<R>, options: &CsvOptions) -> Result<Table> {
    let headers: Option<Vec<String>> = if options.has_headers {
        Some(reader.headers()?.iter().map(String::from).collect())
    } else {
        None
    };
    let records = reader
        .records()
        .collect::<std::result::Result<Vec<csv::StringRecord>, _>>()?;

    let width = headers
        .as_ref()
        .map_or_else(|| records.first().map_or(0, |r| r.len()), Vec::len);
    let names = headers.unwrap_or_else(|| (1..=width).map(|i| format!("X{i}")).collect());

    let mut columns = Vec::with_capacity(width);
    for (j, name) in names.into_iter().enumerate() {
        let cells: Vec<Option<&str>> = records
            .iter()
            .map(|record| {
                record
                    .get(j)
                    .filter(|cell| !options.null_values.iter().any(|null| null.as_str() == *cell))
            })
            .collect();

        let column_type = options
            .column_types
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, column_type)| *column_type)
            .unwrap_or_else(|| Value::infer_text_type(cells.iter().flatten().copied()));

        let values = cells
            .into_iter()
            .map(|cell| cell.map_or(Ok(Value::Null), |text| Value::parse_as(text, column_type)))
            .collect::<Result<Vec<_>>>()?;
        columns.push(Column::with_type(name, column_type, values));
    }

    log::debug!("read {} rows and {} columns", records.len(), columns.len());
    Table::with_nrow(records.len(), columns)
}

pub(super) fn write_table(table: &Table, path: &Path, options: &CsvOptions) -> Result<()> {
    let writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter_for(path))
        .from_path(path)?;
    write_records(table, writer, options)
}

fn write_records<W: Write>(table: &Table, mut writer: csv::Writer<W>, options: &CsvOptions) -> Result<()> {
    if options.has_headers {
        writer.write_record(table.column_names())?;
    }
    let null = options.null_values.first().map_or("", String::as_str);
    for row in table.rows() {
        writer.write_record(row.values().map(|(_, value)| format_cell(value, null)))?;
    }
    writer.flush()?;
    Ok(())
}

fn format_cell(value: &Value, null: &str) -> String {
    match value {
        Value::Null => null.to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Integer(v) => v.to_string(),
        // Debug keeps the fraction on whole numbers, so doubles read back as doubles.
        Value::Real(v) => format!("{v:?}"),
        Value::Text(v) => v.clone(),
        Value::Blob(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

/// Flatten a collection to a table: a WKT column named after the geometry
/// column, or `X`/`Y` for point collections.
pub(super) fn collection_to_table(collection: &FeatureCollection, geometry_as_wkt: bool) -> Result<Table> {
    if !geometry_as_wkt {
        return collection.to_coordinates();
    }
    let wkt = collection
        .geometry()
        .iter()
        .map(|geometry| {
            if is_empty(geometry) {
                Ok(Value::Null)
            } else {
                geometry_to_wkt(geometry).map(Value::Text)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    collection.attributes().add_column(Column::with_type(
        collection.geometry_column_name(),
        ColumnType::Varchar,
        wkt,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SfError;
    use crate::values;

    fn read_str(text: &str, options: &CsvOptions) -> Result<Table> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(options.has_headers)
            .from_reader(text.as_bytes());
        read_records(reader, options)
    }

    #[test]
    fn infers_column_types() -> Result<()> {
        let table = read_str(
            "name,count,share,flag\nA,1,0.5,true\nB,NA,1.5,false\nC,3,,TRUE\n",
            &CsvOptions::default(),
        )?;
        let types: Vec<ColumnType> = table.schema().into_iter().map(|s| s.column_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Varchar,
                ColumnType::Integer,
                ColumnType::Double,
                ColumnType::Boolean
            ]
        );
        assert_eq!(table.value(1, "count"), Some(&Value::Null));
        assert_eq!(table.value(2, "share"), Some(&Value::Null));
        assert_eq!(table.value(2, "flag"), Some(&Value::Boolean(true)));
        Ok(())
    }

    #[test]
    fn overrides_and_missing_headers() -> Result<()> {
        let options = CsvOptions::default()
            .has_headers(false)
            .delimiter(b';')
            .column_type("X1", ColumnType::Varchar);
        let table = read_str("007;1\n042;2\n", &options)?;
        assert_eq!(table.column_names(), vec!["X1", "X2"]);
        assert_eq!(table.value(0, "X1"), Some(&Value::from("007")));
        assert_eq!(table.value(1, "X2"), Some(&Value::Integer(2)));

        let bad = CsvOptions::default().column_type("n", ColumnType::Integer);
        assert!(matches!(
            read_str("n\n1\nx\n", &bad),
            Err(SfError::ValueTypeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn writes_nulls_and_whole_doubles() -> Result<()> {
        let table = Table::from_rows(
            vec![
                crate::types::ColumnSpec::new("a", ColumnType::Double),
                crate::types::ColumnSpec::new("b", ColumnType::Varchar),
            ],
            vec![values![1.0, "x,y"], values![Option::<f64>::None, "z"]],
        )?;
        let mut buf = Vec::new();
        write_records(&table, csv::Writer::from_writer(&mut buf), &CsvOptions::default())?;
        assert_eq!(String::from_utf8_lossy(&buf), "a,b\n1.0,\"x,y\"\n,z\n");

        let back = read_str(&String::from_utf8_lossy(&buf), &CsvOptions::default())?;
        assert_eq!(back, table);
        Ok(())
    }

    #[test]
    fn ragged_rows_are_errors() {
        assert!(matches!(
            read_str("a,b\n1\n", &CsvOptions::default()),
            Err(SfError::Csv(_))
        ));
    }
}
