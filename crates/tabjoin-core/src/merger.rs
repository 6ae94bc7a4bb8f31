//! Merge engine: left-join enrichment of one table with columns of another
//!
//! Every row of the *enrich* table is kept, in order. For each one the first
//! row of the *base* table with the same join-key value is looked up, and the
//! selected columns are copied from it, overwriting whatever the enrich row
//! held under those names. Rows without a match are passed through untouched.

use crate::table::{CellValue, JoinKey, Row, Table};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Join key column used when none is configured
pub const DEFAULT_JOIN_KEY: &str = "chassin";

/// Counts describing a merge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Enrich rows that found a base row
    pub matched: usize,
    /// Enrich rows passed through unchanged
    pub unmatched: usize,
}

/// Copy `columns` from `base` into a fresh copy of `enrich`, joining on `key`
pub fn merge<S: AsRef<str>>(base: &Table, enrich: &Table, key: &str, columns: &[S]) -> Table {
    merge_with_stats(base, enrich, key, columns).0
}

/// Same as [`merge`], also reporting how many rows matched
pub fn merge_with_stats<S: AsRef<str>>(
    base: &Table,
    enrich: &Table,
    key: &str,
    columns: &[S],
) -> (Table, MergeStats) {
    let index = KeyIndex::build(base, key);
    let mut stats = MergeStats::default();

    let rows: Vec<Row> = enrich
        .rows
        .iter()
        .map(|row| {
            let mut merged = row.clone();
            match row.get(key).and_then(|value| index.lookup(base, value)) {
                Some(source) => {
                    stats.matched += 1;
                    for column in columns {
                        let column = column.as_ref();
                        // A base row lacking the column still claims it, blank
                        let value = source.get(column).cloned().unwrap_or(CellValue::Empty);
                        merged.set(column, value);
                    }
                }
                None => stats.unmatched += 1,
            }
            merged
        })
        .collect();

    debug!(
        key,
        columns = columns.len(),
        base_rows = base.row_count(),
        rows = rows.len(),
        matched = stats.matched,
        unmatched = stats.unmatched,
        "merged tables"
    );

    (Table::from_rows(rows), stats)
}

/// First-occurrence index of base rows by key value
struct KeyIndex<'a> {
    positions: HashMap<JoinKey<'a>, usize>,
}

impl<'a> KeyIndex<'a> {
    fn build(base: &'a Table, key: &str) -> Self {
        let mut positions = HashMap::new();
        for (position, row) in base.rows.iter().enumerate() {
            // Rows without the key column can never be matched
            if let Some(repr) = row.get(key).and_then(CellValue::join_key) {
                positions.entry(repr).or_insert(position);
            }
        }
        Self { positions }
    }

    fn lookup(&self, base: &'a Table, value: &'a CellValue) -> Option<&'a Row> {
        let repr = value.join_key()?;
        self.positions
            .get(&repr)
            .and_then(|&position| base.rows.get(position))
    }
}
