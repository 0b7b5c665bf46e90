use super::{Column, Table};
use crate::error::Result;
use crate::value::ValueKey;
use std::collections::HashMap;

/// Which rows a mutating join keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
    Right,
    Full,
}

/// Key columns of a join as `(left, right)` name pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinBy {
    pairs: Vec<(String, String)>,
}

impl JoinBy {
    /// Keys that have the same name on both sides.
    pub fn same(names: &[&str]) -> Self {
        Self {
            pairs: names
                .iter()
                .map(|name| (name.to_string(), name.to_string()))
                .collect(),
        }
    }

    /// Keys with different names, as `(left, right)`.
    pub fn pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
        }
    }

    pub fn left_names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(l, _)| l.as_str())
    }

    pub fn right_names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, r)| r.as_str())
    }
}

impl From<&str> for JoinBy {
    fn from(name: &str) -> Self {
        JoinBy::same(&[name])
    }
}

impl From<&[&str]> for JoinBy {
    fn from(names: &[&str]) -> Self {
        JoinBy::same(names)
    }
}

impl<const N: usize> From<[&str; N]> for JoinBy {
    fn from(names: [&str; N]) -> Self {
        JoinBy::same(&names)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for JoinBy {
    fn from(pairs: [(&str, &str); N]) -> Self {
        JoinBy::pairs(&pairs)
    }
}

/// Matched row indices of a join. `None` marks a side without a match.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct JoinPlan {
    pub(crate) left: Vec<Option<usize>>,
    pub(crate) right: Vec<Option<usize>>,
}

impl JoinPlan {
    pub(crate) fn push(&mut self, left: Option<usize>, right: Option<usize>) {
        self.left.push(left);
        self.right.push(right);
    }

    pub(crate) fn len(&self) -> usize {
        self.left.len()
    }
}

fn key_indices<'a>(table: &Table, names: impl Iterator<Item = &'a str>) -> Result<Vec<usize>> {
    names.map(|name| table.column_index(name)).collect()
}

/// A row's key, or `None` when any key cell is null.
fn row_key(table: &Table, row: usize, key_columns: &[usize]) -> Option<Vec<ValueKey>> {
    table.key_of(row, key_columns).into_iter().collect()
}

/// Pair up matching rows according to `kind`.
///
/// Output follows left-row order, then right-row order within a left row.
/// Unmatched right rows of right and full joins follow, in right order.
pub(crate) fn plan_join(left: &Table, right: &Table, by: &JoinBy, kind: JoinKind) -> Result<JoinPlan> {
    let left_keys = key_indices(left, by.left_names())?;
    let right_keys = key_indices(right, by.right_names())?;

    let mut lookup: HashMap<Vec<ValueKey>, Vec<usize>> = HashMap::new();
    for row in 0..right.nrow() {
        if let Some(key) = row_key(right, row, &right_keys) {
            lookup.entry(key).or_default().push(row);
        }
    }

    let mut plan = JoinPlan::default();
    let mut right_matched = vec![false; right.nrow()];
    for row in 0..left.nrow() {
        let matches = row_key(left, row, &left_keys).and_then(|key| lookup.get(&key));
        match matches {
            Some(rows) => {
                for &r in rows {
                    right_matched[r] = true;
                    plan.push(Some(row), Some(r));
                }
            }
            None if matches!(kind, JoinKind::Left | JoinKind::Full) => plan.push(Some(row), None),
            None => {}
        }
    }

    if matches!(kind, JoinKind::Right | JoinKind::Full) {
        for (r, matched) in right_matched.into_iter().enumerate() {
            if !matched {
                plan.push(None, Some(r));
            }
        }
    }

    Ok(plan)
}

/// Left rows with (`keep_matched`) or without a match, each at most once.
pub(super) fn filtering_join_indices(
    left: &Table,
    right: &Table,
    by: &JoinBy,
    keep_matched: bool,
) -> Result<Vec<usize>> {
    let left_keys = key_indices(left, by.left_names())?;
    let right_keys = key_indices(right, by.right_names())?;

    let right_set: std::collections::HashSet<Vec<ValueKey>> = (0..right.nrow())
        .filter_map(|row| row_key(right, row, &right_keys))
        .collect();

    Ok((0..left.nrow())
        .filter(|&row| {
            let matched = row_key(left, row, &left_keys).is_some_and(|key| right_set.contains(&key));
            matched == keep_matched
        })
        .collect())
}

/// Assemble the output table of a join plan.
///
/// Left key columns are kept, filled from the right side for right-only
/// rows. Non-key columns present on both sides get `.x` and `.y` suffixes.
pub(crate) fn assemble(left: &Table, right: &Table, by: &JoinBy, plan: &JoinPlan) -> Result<Table> {
    let left_keys: Vec<&str> = by.left_names().collect();
    let right_keys: Vec<&str> = by.right_names().collect();

    let right_value_names: Vec<&str> = right
        .column_names()
        .into_iter()
        .filter(|name| !right_keys.contains(name))
        .collect();
    let collides = |name: &str| right_value_names.contains(&name) && !left_keys.contains(&name);

    let mut columns = Vec::with_capacity(left.ncol() + right_value_names.len());
    for column in left.columns() {
        let mut out = column.take_optional(&plan.left);
        if let Some(pos) = left_keys.iter().position(|k| *k == column.name()) {
            let source = &right.columns()[right.column_index(right_keys[pos])?];
            for (i, pair) in plan.left.iter().zip(&plan.right).enumerate() {
                if let (None, Some(r)) = pair {
                    out.values[i] = source.values[*r].clone();
                }
            }
        } else if collides(column.name()) {
            out.spec.name = format!("{}.x", column.name());
        }
        columns.push(out);
    }

    for name in right_value_names {
        let source = &right.columns()[right.column_index(name)?];
        let mut out: Column = source.take_optional(&plan.right);
        if left.has_column(name) {
            out.spec.name = format!("{name}.y");
        }
        columns.push(out);
    }

    Table::with_nrow(plan.len(), columns)
}

pub(super) fn join_tables(left: &Table, right: &Table, by: &JoinBy, kind: JoinKind) -> Result<Table> {
    let plan = plan_join(left, right, by, kind)?;
    assemble(left, right, by, &plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SfError;
    use crate::table::tests::sample_table;
    use crate::value::Value;
    use crate::values;

    fn regions() -> Table {
        Table::new(vec![
            Column::new("region", values!["north", "south", "south", "east"]),
            Column::new("name", values!["N", "S1", "S2", "E"]),
        ])
        .expect("valid table")
    }

    #[test]
    fn left_join_keeps_every_left_row() -> crate::Result<()> {
        let left = sample_table();
        let joined = left.left_join(&regions(), "region")?;
        // north x1, south x2 twice
        assert_eq!(joined.nrow(), 1 + 2 + 1 + 2);
        assert_eq!(
            joined.column_names(),
            vec!["name.x", "region", "pop", "name.y"]
        );
        assert_eq!(joined.value(1, "name.y"), Some(&Value::from("S1")));
        assert_eq!(joined.value(2, "name.y"), Some(&Value::from("S2")));
        Ok(())
    }

    #[test]
    fn inner_join_drops_unmatched() -> crate::Result<()> {
        let mut left = sample_table();
        left = left.mutate("region", |row| {
            if row.index() == 0 {
                Value::Null
            } else {
                row.get_or_null("region").clone()
            }
        })?;
        let joined = left.inner_join(&regions(), "region")?;
        // null key never matches
        assert_eq!(joined.nrow(), 2 + 1 + 2);
        Ok(())
    }

    #[test]
    fn right_and_full_join_append_unmatched_right_rows() -> crate::Result<()> {
        let left = sample_table();
        let right = regions().select(&["region"])?;
        let joined = left.right_join(&right, "region")?;
        let last = joined.nrow() - 1;
        assert_eq!(joined.value(last, "region"), Some(&Value::from("east")));
        assert_eq!(joined.value(last, "name"), Some(&Value::Null));

        let full = left.full_join(&right, "region")?;
        assert_eq!(full.nrow(), joined.nrow());
        Ok(())
    }

    #[test]
    fn semi_join_never_duplicates() -> crate::Result<()> {
        let left = sample_table();
        let semi = left.semi_join(&regions(), "region")?;
        assert_eq!(semi.nrow(), left.nrow());
        assert_eq!(semi.column_names(), left.column_names());

        let anti = left.anti_join(&regions().filter(|r| r.index() == 0), "region")?;
        assert_eq!(anti.nrow(), 2);
        Ok(())
    }

    #[test]
    fn differently_named_keys() -> crate::Result<()> {
        let left = sample_table();
        let right = regions().rename(&[("region", "area")])?;
        let joined = left.left_join(&right, [("region", "area")])?;
        assert!(!joined.has_column("area"));
        assert_eq!(joined.nrow(), 6);
        Ok(())
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = sample_table().left_join(&regions(), "nope");
        assert!(matches!(err, Err(SfError::MissingColumn { .. })));
    }
}
