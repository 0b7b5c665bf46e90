use crate::Result;
use crate::gpkg::GpkgFeature;
use crate::types::ColumnSpec;
use std::collections::HashMap;
use std::sync::Arc;

use super::row_to_feature;

/// Iterator that yields batches of features from a layer.
///
/// Each call to `next()` returns up to `batch_size` features, so a large
/// layer never has to sit in memory at once. A batch size of zero yields
/// nothing.
pub struct GpkgFeatureBatchIterator<'a> {
    pub(super) stmt: rusqlite::Statement<'a>,
    pub(super) property_columns: Vec<ColumnSpec>,
    pub(super) geometry_column: String,
    pub(super) primary_key_column: String,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
    pub(super) batch_size: u32,
    pub(super) offset: u32,
    pub(super) end_or_invalid_state: bool,
}

impl GpkgFeatureBatchIterator<'_> {
    fn next_batch(&mut self) -> Result<Vec<GpkgFeature>> {
        let rows = self.stmt.query_map([self.batch_size, self.offset], |row| {
            row_to_feature(
                row,
                &self.property_columns,
                &self.geometry_column,
                &self.primary_key_column,
                &self.property_index_by_name,
            )
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<GpkgFeature>>>()?)
    }
}

impl Iterator for GpkgFeatureBatchIterator<'_> {
    type Item = Result<Vec<GpkgFeature>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_or_invalid_state {
            return None;
        }

        let features = match self.next_batch() {
            Ok(features) => features,
            Err(e) => {
                // A failed query leaves the offset meaningless.
                self.end_or_invalid_state = true;
                return Some(Err(e));
            }
        };

        // A short batch means the end of the table.
        let result_size = features.len();
        if result_size < self.batch_size as usize {
            self.end_or_invalid_state = true;
            if features.is_empty() {
                return None;
            }
        }
        self.offset += result_size as u32;

        Some(Ok(features))
    }
}
