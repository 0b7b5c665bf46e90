use super::{Column, Table};
use crate::error::Result;
use crate::value::{Value, ValueKey};
use std::collections::{HashMap, HashSet};

/// The reduction applied by an [`Aggregate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    First,
    Last,
    NDistinct,
}

/// One output column of `summarise`.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub name: String,
    pub column: Option<String>,
    pub function: AggregateFn,
}

macro_rules! aggregate_constructors {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $fn_name(name: impl Into<String>, column: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    column: Some(column.into()),
                    function: AggregateFn::$variant,
                }
            }
        )*
    };
}

impl Aggregate {
    /// Number of rows in the group.
    pub fn count(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            function: AggregateFn::Count,
        }
    }

    aggregate_constructors! {
        sum => Sum,
        mean => Mean,
        min => Min,
        max => Max,
        first => First,
        last => Last,
        n_distinct => NDistinct,
    }

    fn apply(&self, column: Option<&Column>, rows: &[usize]) -> Value {
        let values = move || {
            column
                .into_iter()
                .flat_map(move |c| rows.iter().map(move |&row| &c.values[row]))
        };
        let non_null = move || values().filter(|v| !v.is_null());

        match self.function {
            AggregateFn::Count => Value::Integer(rows.len() as i64),
            AggregateFn::Sum => sum(non_null()),
            AggregateFn::Mean => {
                let numbers: Vec<f64> = non_null().filter_map(Value::as_f64).collect();
                if numbers.is_empty() {
                    Value::Null
                } else {
                    Value::Real(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggregateFn::Min => non_null()
                .min_by(|a, b| a.compare(b))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateFn::Max => non_null()
                .max_by(|a, b| a.compare(b))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateFn::First => values().next().cloned().unwrap_or(Value::Null),
            AggregateFn::Last => values().last().cloned().unwrap_or(Value::Null),
            AggregateFn::NDistinct => {
                let distinct: HashSet<Option<ValueKey>> = values().map(Value::key).collect();
                Value::Integer(distinct.len() as i64)
            }
        }
    }
}

/// Integer sums stay integers until they overflow or meet a real.
fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    let mut int_sum: Option<i64> = Some(0);
    let mut real_sum = 0.0;
    let mut seen = false;
    for value in values {
        let Some(number) = value.as_f64() else {
            continue;
        };
        seen = true;
        real_sum += number;
        int_sum = match (int_sum, value) {
            (Some(acc), Value::Integer(v)) => acc.checked_add(*v),
            (Some(acc), Value::Boolean(v)) => acc.checked_add(i64::from(*v)),
            _ => None,
        };
    }
    match (seen, int_sum) {
        (false, _) => Value::Null,
        (true, Some(total)) => Value::Integer(total),
        (true, None) => Value::Real(real_sum),
    }
}

/// Rows sharing one key combination.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub rows: Vec<usize>,
}

impl Group {
    /// The row providing the key values.
    pub fn first_row(&self) -> usize {
        self.rows[0]
    }
}

/// A table partitioned by key columns.
///
/// Null keys form a group of their own.
#[derive(Debug)]
pub struct GroupedTable<'a> {
    table: &'a Table,
    keys: Vec<String>,
    groups: Vec<Group>,
}

impl<'a> GroupedTable<'a> {
    pub(super) fn new(table: &'a Table, names: &[&str]) -> Result<Self> {
        let key_columns = names
            .iter()
            .map(|name| table.column_index(name))
            .collect::<Result<Vec<_>>>()?;

        let mut groups: Vec<Group> = Vec::new();
        if key_columns.is_empty() {
            groups.push(Group {
                rows: (0..table.nrow()).collect(),
            });
        } else {
            let mut lookup: HashMap<Vec<Option<ValueKey>>, usize> = HashMap::new();
            for row in 0..table.nrow() {
                let key = table.key_of(row, &key_columns);
                let group = *lookup.entry(key).or_insert_with(|| {
                    groups.push(Group { rows: Vec::new() });
                    groups.len() - 1
                });
                groups[group].rows.push(row);
            }
        }

        Ok(Self {
            table,
            keys: names.iter().map(|s| s.to_string()).collect(),
            groups,
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn ngroups(&self) -> usize {
        self.groups.len()
    }

    /// The row index of each group's first member, in group order.
    pub(crate) fn first_rows(&self) -> Vec<usize> {
        self.groups.iter().map(Group::first_row).collect()
    }

    /// One row per group: the key columns followed by one column per aggregate.
    pub fn summarise(&self, aggregates: &[Aggregate]) -> Result<Table> {
        let key_names: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        let mut columns = if key_names.is_empty() {
            Vec::new()
        } else {
            self.table
                .select(&key_names)?
                .take(&self.first_rows())
                .into_columns()
        };

        for aggregate in aggregates {
            let source = match &aggregate.column {
                Some(name) => Some(&self.table.columns()[self.table.column_index(name)?]),
                None => None,
            };
            let values = self
                .groups
                .iter()
                .map(|group| aggregate.apply(source, &group.rows))
                .collect();
            columns.push(Column::new(aggregate.name.clone(), values));
        }

        Table::with_nrow(self.groups.len(), columns)
    }

    pub fn count(&self) -> Result<Table> {
        self.summarise(&[Aggregate::count("n")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::sample_table;

    #[test]
    fn groups_in_first_appearance_order() -> crate::Result<()> {
        let table = sample_table();
        let summary = table.group_by(&["region"])?.summarise(&[
            Aggregate::count("n"),
            Aggregate::sum("total", "pop"),
            Aggregate::mean("mean", "pop"),
            Aggregate::max("largest", "pop"),
            Aggregate::first("first", "name"),
        ])?;

        assert_eq!(
            summary.column_names(),
            vec!["region", "n", "total", "mean", "largest", "first"]
        );
        assert_eq!(summary.nrow(), 2);
        assert_eq!(summary.value(0, "region"), Some(&Value::from("north")));
        assert_eq!(summary.value(0, "total"), Some(&Value::Integer(30)));
        assert_eq!(summary.value(0, "mean"), Some(&Value::Real(15.0)));
        // south has one null pop, which numeric aggregates skip
        assert_eq!(summary.value(1, "n"), Some(&Value::Integer(2)));
        assert_eq!(summary.value(1, "total"), Some(&Value::Integer(30)));
        assert_eq!(summary.value(1, "largest"), Some(&Value::Integer(30)));
        assert_eq!(summary.value(1, "first"), Some(&Value::from("beta")));
        Ok(())
    }

    #[test]
    fn ungrouped_summary_is_one_row() -> crate::Result<()> {
        let table = sample_table();
        let summary = table.summarise(&[
            Aggregate::n_distinct("regions", "region"),
            Aggregate::min("smallest", "pop"),
            Aggregate::last("last", "name"),
        ])?;
        assert_eq!(summary.nrow(), 1);
        assert_eq!(summary.value(0, "regions"), Some(&Value::Integer(2)));
        assert_eq!(summary.value(0, "smallest"), Some(&Value::Integer(10)));
        assert_eq!(summary.value(0, "last"), Some(&Value::from("delta")));
        Ok(())
    }

    #[test]
    fn all_null_group_yields_null() -> crate::Result<()> {
        let table = sample_table().filter(|row| row.get_or_null("pop").is_null());
        let summary = table.summarise(&[Aggregate::sum("total", "pop"), Aggregate::mean("m", "pop")])?;
        assert_eq!(summary.value(0, "total"), Some(&Value::Null));
        assert_eq!(summary.value(0, "m"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn count_verb() -> crate::Result<()> {
        let counts = sample_table().count(&["region"])?;
        assert_eq!(counts.column_names(), vec!["region", "n"]);
        assert_eq!(counts.value(1, "n"), Some(&Value::Integer(2)));
        Ok(())
    }

    #[test]
    fn sum_promotes_to_real() {
        let values = [Value::Integer(1), Value::Real(0.5), Value::Null];
        assert_eq!(sum(values.iter()), Value::Real(1.5));
        let values = [Value::Integer(i64::MAX), Value::Integer(1)];
        assert!(matches!(sum(values.iter()), Value::Real(_)));
    }
}
