use super::{Column, Table};
use crate::error::{Result, SfError};
use crate::value::{Value, ValueKey};
use std::collections::HashMap;

pub(super) fn pivot_longer(
    table: &Table,
    columns: &[&str],
    names_to: &str,
    values_to: &str,
) -> Result<Table> {
    let pivoted = columns
        .iter()
        .map(|name| table.column_index(name))
        .collect::<Result<Vec<_>>>()?;
    let ids: Vec<usize> = (0..table.ncol()).filter(|i| !pivoted.contains(i)).collect();

    let width = pivoted.len();
    let repeated: Vec<usize> = (0..table.nrow())
        .flat_map(|row| std::iter::repeat_n(row, width))
        .collect();

    let mut out: Vec<Column> = ids
        .iter()
        .map(|&i| table.columns[i].take(&repeated))
        .collect();

    let mut names = Vec::with_capacity(repeated.len());
    let mut values = Vec::with_capacity(repeated.len());
    for row in 0..table.nrow() {
        for &col in &pivoted {
            let column = &table.columns[col];
            names.push(Value::from(column.name()));
            values.push(column.values[row].clone());
        }
    }
    out.push(Column::new(names_to, names));
    out.push(Column::new(values_to, values));

    Table::with_nrow(repeated.len(), out)
}

pub(super) fn pivot_wider(table: &Table, names_from: &str, values_from: &str) -> Result<Table> {
    let names_idx = table.column_index(names_from)?;
    let values_idx = table.column_index(values_from)?;
    let ids: Vec<usize> = (0..table.ncol())
        .filter(|&i| i != names_idx && i != values_idx)
        .collect();

    // New column names in first-appearance order.
    let mut new_names: Vec<String> = Vec::new();
    let mut name_slots: HashMap<String, usize> = HashMap::new();
    // One output row per distinct id combination; null ids group together.
    let mut id_rows: Vec<usize> = Vec::new();
    let mut id_slots: HashMap<Vec<Option<ValueKey>>, usize> = HashMap::new();
    let mut cells: HashMap<(usize, usize), Value> = HashMap::new();

    for row in 0..table.nrow() {
        let name = match &table.columns[names_idx].values[row] {
            Value::Null => "NA".to_string(),
            other => other.to_string(),
        };
        let name_slot = *name_slots.entry(name.clone()).or_insert_with(|| {
            new_names.push(name.clone());
            new_names.len() - 1
        });
        let id_slot = *id_slots.entry(table.key_of(row, &ids)).or_insert_with(|| {
            id_rows.push(row);
            id_rows.len() - 1
        });

        if cells
            .insert((id_slot, name_slot), table.columns[values_idx].values[row].clone())
            .is_some()
        {
            return Err(SfError::DuplicateKey { key: name });
        }
    }

    let mut out: Vec<Column> = ids.iter().map(|&i| table.columns[i].take(&id_rows)).collect();
    for (name_slot, name) in new_names.into_iter().enumerate() {
        let values = (0..id_rows.len())
            .map(|id_slot| cells.remove(&(id_slot, name_slot)).unwrap_or(Value::Null))
            .collect();
        out.push(Column::new(name, values));
    }

    Table::with_nrow(id_rows.len(), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    fn wide() -> Table {
        Table::new(vec![
            Column::new("site", values!["a", "b"]),
            Column::new("y2020", values![1_i64, 3_i64]),
            Column::new("y2021", values![2_i64, Option::<i64>::None]),
        ])
        .expect("valid table")
    }

    #[test]
    fn longer_repeats_ids() -> crate::Result<()> {
        let long = wide().pivot_longer(&["y2020", "y2021"], "year", "count")?;
        assert_eq!(long.nrow(), 4);
        assert_eq!(long.column_names(), vec!["site", "year", "count"]);
        assert_eq!(long.value(1, "site"), Some(&Value::from("a")));
        assert_eq!(long.value(1, "year"), Some(&Value::from("y2021")));
        assert_eq!(long.value(3, "count"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn wider_undoes_longer() -> crate::Result<()> {
        let original = wide();
        let back = original
            .pivot_longer(&["y2020", "y2021"], "year", "count")?
            .pivot_wider("year", "count")?;
        assert_eq!(back.column_names(), original.column_names());
        assert_eq!(back.value(0, "y2021"), Some(&Value::Integer(2)));
        assert_eq!(back.value(1, "y2021"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn wider_fills_missing_cells() -> crate::Result<()> {
        let long = Table::new(vec![
            Column::new("site", values!["a", "a", "b"]),
            Column::new("year", values!["2020", "2021", "2020"]),
            Column::new("count", values![1_i64, 2_i64, 3_i64]),
        ])?;
        let wide = long.pivot_wider("year", "count")?;
        assert_eq!(wide.nrow(), 2);
        assert_eq!(wide.value(1, "2021"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn wider_rejects_duplicates() -> crate::Result<()> {
        let long = Table::new(vec![
            Column::new("site", values!["a", "a"]),
            Column::new("year", values!["2020", "2020"]),
            Column::new("count", values![1_i64, 2_i64]),
        ])?;
        assert!(matches!(
            long.pivot_wider("year", "count"),
            Err(SfError::DuplicateKey { .. })
        ));
        Ok(())
    }
}
