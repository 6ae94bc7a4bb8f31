//! Column hiding and export of a combined table
//!
//! [`project`] drops hidden columns from every row without touching the
//! source table; [`export`] projects and then serializes the result.

use crate::error::Result;
use crate::format::Format;
use crate::table::Table;
use crate::writer::serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Return a copy of `table` without the `hidden` columns.
///
/// Row order and the relative order of the remaining columns are kept.
pub fn project<S: AsRef<str>>(table: &Table, hidden: &[S]) -> Table {
    if hidden.is_empty() {
        return table.clone();
    }
    let hidden: BTreeSet<&str> = hidden.iter().map(|column| column.as_ref()).collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut projected = row.clone();
            projected.retain(|column| !hidden.contains(column));
            projected
        })
        .collect();
    Table::from_rows(rows)
}

/// A finished export, ready to hand to whatever saves or downloads it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Format of `bytes`
    pub format: Format,
    /// Suggested file name
    pub file_name: String,
    /// Encoded file contents
    pub bytes: Vec<u8>,
}

impl Export {
    /// Write the export to disk.
    ///
    /// An existing directory receives the file under its suggested name;
    /// any other path is used as the target file itself.
    pub fn write_to<P: AsRef<Path>>(&self, target: P) -> Result<PathBuf> {
        let target = target.as_ref();
        let path = if target.is_dir() {
            target.join(&self.file_name)
        } else {
            target.to_path_buf()
        };
        fs::write(&path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "wrote export");
        Ok(path)
    }
}

/// Hide columns and serialize the table in `format`
pub fn export<S: AsRef<str>>(table: &Table, hidden: &[S], format: Format) -> Result<Export> {
    let projected = project(table, hidden);
    let bytes = serialize(&projected, format)?;
    debug!(%format, hidden = hidden.len(), rows = projected.row_count(), "exported table");

    Ok(Export {
        format,
        file_name: format.default_file_name(),
        bytes,
    })
}
