//! Column-major tabular data and the tidy verbs on it.
//!
//! Every verb computes the row indices it keeps and then calls
//! [`Table::take`], so a feature collection can apply the very same indices
//! to its geometry column.

mod group;
mod join;
mod reshape;

pub use group::{Aggregate, AggregateFn, Group, GroupedTable};
pub use join::{JoinBy, JoinKind};

pub(crate) use join::{JoinPlan, assemble as assemble_join, plan_join};

use crate::error::{Result, SfError};
use crate::types::{ColumnSpec, ColumnType};
use crate::value::{Value, ValueKey};
use std::collections::HashSet;
use std::ops::Range;

/// A named, typed column of values.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub spec: ColumnSpec,
    pub values: Vec<Value>,
}

impl Column {
    /// Build a column, inferring its type from the values.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let column_type = ColumnType::infer(&values);
        Self {
            spec: ColumnSpec::new(name, column_type),
            values,
        }
    }

    pub fn with_type(name: impl Into<String>, column_type: ColumnType, values: Vec<Value>) -> Self {
        Self {
            spec: ColumnSpec::new(name, column_type),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn take(&self, indices: &[usize]) -> Column {
        Column {
            spec: self.spec.clone(),
            values: indices.iter().map(|&idx| self.values[idx].clone()).collect(),
        }
    }

    fn take_optional(&self, indices: &[Option<usize>]) -> Column {
        Column {
            spec: self.spec.clone(),
            values: indices
                .iter()
                .map(|idx| idx.map_or(Value::Null, |idx| self.values[idx].clone()))
                .collect(),
        }
    }
}

/// Sort direction for [`Table::arrange`].
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A data frame: named columns of equal length.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    nrow: usize,
}

impl Table {
    /// Build a table. The row count is taken from the first column.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let nrow = columns.first().map_or(0, Column::len);
        Self::with_nrow(nrow, columns)
    }

    /// Build a table with an explicit row count, which allows zero columns.
    pub fn with_nrow(nrow: usize, columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(SfError::DuplicateColumn {
                    column: column.name().to_string(),
                });
            }
            if column.len() != nrow {
                return Err(SfError::ColumnLengthMismatch {
                    column: column.name().to_string(),
                    expected: nrow,
                    got: column.len(),
                });
            }
        }
        Ok(Self { columns, nrow })
    }

    /// Build a table from row-major values.
    pub fn from_rows(specs: Vec<ColumnSpec>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let nrow = rows.len();
        let mut columns: Vec<Column> = specs
            .into_iter()
            .map(|spec| Column {
                spec,
                values: Vec::with_capacity(nrow),
            })
            .collect();
        for row in rows {
            if row.len() != columns.len() {
                return Err(SfError::InvalidPropertyCount {
                    expected: columns.len(),
                    got: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }
        Self::with_nrow(nrow, columns)
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn schema(&self) -> Vec<ColumnSpec> {
        self.columns.iter().map(|c| c.spec.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub(crate) fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| SfError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.values.get(row))
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.nrow).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.nrow).map(move |index| Row { table: self, index })
    }

    /// Select rows by index. Indices may repeat or reorder.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            nrow: indices.len(),
        }
    }

    /// Keep and reorder columns.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let idx = self.column_index(name)?;
            columns.push(self.columns[idx].clone());
        }
        Table::with_nrow(self.nrow, columns)
    }

    pub fn drop_columns(&self, names: &[&str]) -> Result<Table> {
        for name in names {
            self.column_index(name)?;
        }
        let columns = self
            .columns
            .iter()
            .filter(|c| !names.contains(&c.name()))
            .cloned()
            .collect();
        Table::with_nrow(self.nrow, columns)
    }

    /// Rename columns given `(old, new)` pairs.
    pub fn rename(&self, renames: &[(&str, &str)]) -> Result<Table> {
        let mut columns = self.columns.clone();
        for (old, new) in renames {
            let idx = self.column_index(old)?;
            columns[idx].spec.name = new.to_string();
        }
        Table::with_nrow(self.nrow, columns)
    }

    pub(crate) fn filter_indices<F>(&self, mut predicate: F) -> Vec<usize>
    where
        F: FnMut(&Row<'_>) -> bool,
    {
        self.rows()
            .filter(|row| predicate(row))
            .map(|row| row.index)
            .collect()
    }

    /// Keep rows for which the predicate holds.
    pub fn filter<F>(&self, predicate: F) -> Table
    where
        F: FnMut(&Row<'_>) -> bool,
    {
        self.take(&self.filter_indices(predicate))
    }

    /// Keep rows in `range`, clamped to the table.
    pub fn slice(&self, range: Range<usize>) -> Table {
        let end = range.end.min(self.nrow);
        let start = range.start.min(end);
        self.take(&(start..end).collect::<Vec<_>>())
    }

    pub fn head(&self, n: usize) -> Table {
        self.slice(0..n)
    }

    pub(crate) fn arrange_indices(&self, keys: &[SortKey]) -> Result<Vec<usize>> {
        let key_columns = keys
            .iter()
            .map(|key| {
                self.column_index(&key.column)
                    .map(|idx| (&self.columns[idx], key.descending))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut indices: Vec<usize> = (0..self.nrow).collect();
        // Stable, so ties keep their input order.
        indices.sort_by(|&a, &b| {
            for (column, descending) in &key_columns {
                let (va, vb) = (&column.values[a], &column.values[b]);
                let ordering = match (va.is_null(), vb.is_null()) {
                    // Nulls stay last in both directions.
                    (true, false) => std::cmp::Ordering::Greater,
                    (false, true) => std::cmp::Ordering::Less,
                    _ if *descending => vb.compare(va),
                    _ => va.compare(vb),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(indices)
    }

    /// Stable multi-key sort.
    pub fn arrange(&self, keys: &[SortKey]) -> Result<Table> {
        Ok(self.take(&self.arrange_indices(keys)?))
    }

    /// Add a column, or replace one with the same name in place.
    pub fn add_column(&self, column: Column) -> Result<Table> {
        let mut columns = self.columns.clone();
        match columns.iter().position(|c| c.name() == column.name()) {
            Some(idx) => columns[idx] = column,
            None => columns.push(column),
        }
        Table::with_nrow(self.nrow, columns)
    }

    /// Compute a column from each row.
    pub fn mutate<F>(&self, name: &str, mut f: F) -> Result<Table>
    where
        F: FnMut(&Row<'_>) -> Value,
    {
        let values = self.rows().map(|row| f(&row)).collect();
        self.add_column(Column::new(name, values))
    }

    pub(crate) fn key_of(&self, row: usize, key_columns: &[usize]) -> Vec<Option<ValueKey>> {
        key_columns
            .iter()
            .map(|&idx| self.columns[idx].values[row].key())
            .collect()
    }

    pub(crate) fn distinct_indices(&self, names: &[&str]) -> Result<Vec<usize>> {
        let key_columns = if names.is_empty() {
            (0..self.columns.len()).collect()
        } else {
            names
                .iter()
                .map(|name| self.column_index(name))
                .collect::<Result<Vec<_>>>()?
        };
        let mut seen = HashSet::new();
        Ok((0..self.nrow)
            .filter(|&row| seen.insert(self.key_of(row, &key_columns)))
            .collect())
    }

    /// First row of each distinct combination of `names` (all columns when empty).
    pub fn distinct(&self, names: &[&str]) -> Result<Table> {
        Ok(self.take(&self.distinct_indices(names)?))
    }

    /// Stack rows of `other` below `self`, matching columns by name.
    pub fn bind_rows(&self, other: &Table) -> Result<Table> {
        let mut names: Vec<&str> = self.column_names();
        for name in other.column_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let nrow = self.nrow + other.nrow;
        let columns = names
            .into_iter()
            .map(|name| {
                let mut values = Vec::with_capacity(nrow);
                for table in [self, other] {
                    match table.column(name) {
                        Some(c) => values.extend(c.values.iter().cloned()),
                        None => values.extend(std::iter::repeat_n(Value::Null, table.nrow)),
                    }
                }
                Column::new(name, values)
            })
            .collect();
        Table::with_nrow(nrow, columns)
    }

    /// Group rows by the values of `names`, in first-appearance order.
    pub fn group_by(&self, names: &[&str]) -> Result<GroupedTable<'_>> {
        GroupedTable::new(self, names)
    }

    /// Number of rows per combination of `names`, in a column called `n`.
    pub fn count(&self, names: &[&str]) -> Result<Table> {
        self.group_by(names)?.summarise(&[Aggregate::count("n")])
    }

    /// Summarise the whole table as a single group.
    pub fn summarise(&self, aggregates: &[Aggregate]) -> Result<Table> {
        self.group_by(&[])?.summarise(aggregates)
    }

    pub fn left_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<Table> {
        join::join_tables(self, right, &by.into(), JoinKind::Left)
    }

    pub fn inner_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<Table> {
        join::join_tables(self, right, &by.into(), JoinKind::Inner)
    }

    pub fn right_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<Table> {
        join::join_tables(self, right, &by.into(), JoinKind::Right)
    }

    pub fn full_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<Table> {
        join::join_tables(self, right, &by.into(), JoinKind::Full)
    }

    pub(crate) fn semi_join_indices(&self, right: &Table, by: &JoinBy) -> Result<Vec<usize>> {
        join::filtering_join_indices(self, right, by, true)
    }

    pub(crate) fn anti_join_indices(&self, right: &Table, by: &JoinBy) -> Result<Vec<usize>> {
        join::filtering_join_indices(self, right, by, false)
    }

    /// Left rows with at least one match, each kept once.
    pub fn semi_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<Table> {
        Ok(self.take(&self.semi_join_indices(right, &by.into())?))
    }

    /// Left rows without any match.
    pub fn anti_join(&self, right: &Table, by: impl Into<JoinBy>) -> Result<Table> {
        Ok(self.take(&self.anti_join_indices(right, &by.into())?))
    }

    /// Gather `columns` into `names_to`/`values_to` pairs, one row per cell.
    pub fn pivot_longer(&self, columns: &[&str], names_to: &str, values_to: &str) -> Result<Table> {
        reshape::pivot_longer(self, columns, names_to, values_to)
    }

    /// Spread `values_from` into one column per distinct value of `names_from`.
    pub fn pivot_wider(&self, names_from: &str, values_from: &str) -> Result<Table> {
        reshape::pivot_wider(self, names_from, values_from)
    }
}

/// A borrowed view of one row.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// The value in column `name`, or `None` if no such column exists.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.table.value(self.index, name)
    }

    /// The value in column `name`, with a missing column read as `Null`.
    pub fn get_or_null(&self, name: &str) -> &'a Value {
        static NULL: Value = Value::Null;
        self.get(name).unwrap_or(&NULL)
    }

    pub fn values(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let index = self.index;
        self.table
            .columns
            .iter()
            .map(move |c| (c.name(), &c.values[index]))
    }
}
