//! Session state for one base/enrich table pair
//!
//! A [`Session`] holds everything a front end needs between user actions:
//! the two loaded files, their parsed tables, the chosen and hidden columns,
//! and the combined result. Replacing either file throws away everything
//! derived from the old one.

use crate::error::{Error, Result};
use crate::export::{export, project, Export};
use crate::format::Format;
use crate::merger::{merge_with_stats, MergeStats, DEFAULT_JOIN_KEY};
use crate::parser::{Coercion, ParseTask};
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Which of the two inputs a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Slot {
    /// File one: supplies the columns to copy
    Base,
    /// File two: receives the columns; its rows make up the result
    Enrich,
}

impl Slot {
    /// Label used in messages
    pub fn label(self) -> &'static str {
        match self {
            Slot::Base => "file one",
            Slot::Enrich => "file two",
        }
    }
}

/// Where the session is in the load, process, combine, export flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SessionState {
    /// At most one file is loaded
    Idle,
    /// Both files are loaded but not parsed
    FilesSelected,
    /// Both files parsed, no column selected yet
    Parsed,
    /// At least one base column is selected
    ColumnsChosen,
    /// A combined table is available
    Merged,
    /// The current view of the combined table has been exported
    Exported,
}

/// A file handed to the session, kept so it can be re-processed
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name, used to pick the parser
    pub name: String,
    /// Raw contents
    pub bytes: Arc<[u8]>,
    /// When the file was loaded
    pub loaded_at: DateTime<Utc>,
}

impl SourceFile {
    fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            loaded_at: Utc::now(),
        }
    }

    /// Format the file will be parsed as
    pub fn format(&self) -> Format {
        Format::from_file_name(&self.name)
    }
}

/// Outcome of the last successful export
#[derive(Debug, Clone, Serialize)]
pub struct ExportRecord {
    /// Format written
    pub format: Format,
    /// Suggested file name of the export
    pub file_name: String,
    /// Size of the encoded file
    pub bytes: usize,
    /// When the export was produced
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Parsed {
    base: Table,
    enrich: Table,
}

/// One merge session
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    coercion: Coercion,
    base_file: Option<SourceFile>,
    enrich_file: Option<SourceFile>,
    parsed: Option<Parsed>,
    selected: Vec<String>,
    hidden: Vec<String>,
    combined: Option<(Table, MergeStats)>,
    last_export: Option<ExportRecord>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session joining on the default key
    pub fn new() -> Self {
        Self::with_key(DEFAULT_JOIN_KEY)
    }

    /// Create a session joining on `key`
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            coercion: Coercion::default(),
            base_file: None,
            enrich_file: None,
            parsed: None,
            selected: Vec::new(),
            hidden: Vec::new(),
            combined: None,
            last_export: None,
        }
    }

    /// Set how CSV fields are typed; takes effect on the next [`Session::process`]
    pub fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// The join key column
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current position in the workflow
    pub fn state(&self) -> SessionState {
        if self.last_export.is_some() {
            SessionState::Exported
        } else if self.combined.is_some() {
            SessionState::Merged
        } else if self.parsed.is_some() && !self.selected.is_empty() {
            SessionState::ColumnsChosen
        } else if self.parsed.is_some() {
            SessionState::Parsed
        } else if self.base_file.is_some() && self.enrich_file.is_some() {
            SessionState::FilesSelected
        } else {
            SessionState::Idle
        }
    }

    /// Load (or replace) a file, discarding all state derived from the old inputs
    pub fn load_file(&mut self, slot: Slot, name: impl Into<String>, bytes: Vec<u8>) {
        let file = SourceFile::new(name, bytes);
        info!(slot = slot.label(), name = %file.name, bytes = file.bytes.len(), "loaded file");
        *self.slot_mut(slot) = Some(file);
        self.invalidate();
    }

    /// Read a file from disk into a slot
    pub fn load_path<P: AsRef<Path>>(&mut self, slot: Slot, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_file(slot, name, bytes);
        Ok(())
    }

    /// Remove a file, discarding all derived state
    pub fn clear_file(&mut self, slot: Slot) {
        *self.slot_mut(slot) = None;
        self.invalidate();
    }

    /// The file loaded into a slot
    pub fn file(&self, slot: Slot) -> Option<&SourceFile> {
        match slot {
            Slot::Base => self.base_file.as_ref(),
            Slot::Enrich => self.enrich_file.as_ref(),
        }
    }

    /// Parse both files.
    ///
    /// Both parses run in the background concurrently. If either fails the
    /// error is returned and the previously parsed tables, selections and
    /// combined result are left as they were.
    pub fn process(&mut self) -> Result<()> {
        let base_file = self.require_file(Slot::Base)?;
        let enrich_file = self.require_file(Slot::Enrich)?;

        let base_task = ParseTask::spawn(base_file.name.clone(), base_file.bytes.clone(), self.coercion);
        let enrich_task =
            ParseTask::spawn(enrich_file.name.clone(), enrich_file.bytes.clone(), self.coercion);
        let base = base_task.wait();
        let enrich = enrich_task.wait();
        let parsed = Parsed {
            base: base?,
            enrich: enrich?,
        };

        info!(
            base_rows = parsed.base.row_count(),
            enrich_rows = parsed.enrich.row_count(),
            "processed files"
        );
        // Keep choices that still make sense for the fresh tables
        let known = parsed.base.columns();
        self.selected.retain(|c| known.contains(&c.as_str()));
        self.parsed = Some(parsed);
        self.hidden.clear();
        self.combined = None;
        self.last_export = None;
        Ok(())
    }

    /// Parsed file one, if processed
    pub fn base_table(&self) -> Option<&Table> {
        self.parsed.as_ref().map(|p| &p.base)
    }

    /// Parsed file two, if processed
    pub fn enrich_table(&self) -> Option<&Table> {
        self.parsed.as_ref().map(|p| &p.enrich)
    }

    /// Columns of file one offered for copying
    pub fn base_columns(&self) -> Vec<&str> {
        self.base_table().map(Table::columns).unwrap_or_default()
    }

    /// Columns of file two
    pub fn enrich_columns(&self) -> Vec<&str> {
        self.enrich_table().map(Table::columns).unwrap_or_default()
    }

    /// Columns chosen for copying, in the order they were chosen
    pub fn selected_columns(&self) -> &[String] {
        &self.selected
    }

    /// Add a column of file one to the selection
    pub fn select_column(&mut self, column: &str) -> Result<()> {
        if !self.base_columns().contains(&column) {
            return Err(Error::UnknownColumn(column.to_string()));
        }
        if !self.selected.iter().any(|c| c == column) {
            self.selected.push(column.to_string());
        }
        Ok(())
    }

    /// Remove a column from the selection
    pub fn deselect_column(&mut self, column: &str) {
        self.selected.retain(|c| c != column);
    }

    /// Replace the whole selection; nothing changes if any name is unknown
    pub fn set_selected_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        let known = self.base_columns();
        let mut selected: Vec<String> = Vec::new();
        for column in columns {
            let column = column.as_ref();
            if !known.contains(&column) {
                return Err(Error::UnknownColumn(column.to_string()));
            }
            if !selected.iter().any(|c| c == column) {
                selected.push(column.to_string());
            }
        }
        self.selected = selected;
        Ok(())
    }

    /// Merge the parsed tables using the current selection.
    ///
    /// Any earlier combined result is replaced.
    pub fn combine(&mut self) -> Result<&Table> {
        let parsed = self.parsed.as_ref().ok_or_else(|| self.missing_input())?;
        let (table, stats) = merge_with_stats(&parsed.base, &parsed.enrich, &self.key, &self.selected);

        debug!(matched = stats.matched, unmatched = stats.unmatched, "combined tables");
        self.last_export = None;
        let (table, _) = self.combined.insert((table, stats));
        Ok(table)
    }

    /// The combined table, if [`Session::combine`] has run
    pub fn combined(&self) -> Option<&Table> {
        self.combined.as_ref().map(|(table, _)| table)
    }

    /// Match counts of the last combine
    pub fn merge_stats(&self) -> Option<MergeStats> {
        self.combined.as_ref().map(|(_, stats)| *stats)
    }

    /// Columns of the combined table offered for hiding
    pub fn combined_columns(&self) -> Vec<&str> {
        self.combined().map(Table::columns).unwrap_or_default()
    }

    /// Columns currently hidden
    pub fn hidden_columns(&self) -> &[String] {
        &self.hidden
    }

    /// Hide a column of the combined table.
    ///
    /// Changing the hidden set discards the record of the last export.
    pub fn hide_column(&mut self, column: &str) -> Result<()> {
        if !self.combined_columns().contains(&column) {
            return Err(Error::UnknownColumn(column.to_string()));
        }
        if !self.hidden.iter().any(|c| c == column) {
            self.hidden.push(column.to_string());
            self.last_export = None;
        }
        Ok(())
    }

    /// Show a previously hidden column again
    pub fn show_column(&mut self, column: &str) {
        let before = self.hidden.len();
        self.hidden.retain(|c| c != column);
        if self.hidden.len() != before {
            self.last_export = None;
        }
    }

    /// The combined table as displayed, with hidden columns removed
    pub fn preview(&self) -> Option<Table> {
        self.combined().map(|table| project(table, &self.hidden))
    }

    /// Export the combined table without its hidden columns
    pub fn export(&mut self, format: Format) -> Result<Export> {
        let table = self.combined().ok_or_else(|| self.missing_input())?;
        let export = export(table, &self.hidden, format)?;

        self.last_export = Some(ExportRecord {
            format,
            file_name: export.file_name.clone(),
            bytes: export.bytes.len(),
            exported_at: Utc::now(),
        });
        Ok(export)
    }

    /// Details of the last export since the result was (re)combined
    pub fn last_export(&self) -> Option<&ExportRecord> {
        self.last_export.as_ref()
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<SourceFile> {
        match slot {
            Slot::Base => &mut self.base_file,
            Slot::Enrich => &mut self.enrich_file,
        }
    }

    fn require_file(&self, slot: Slot) -> Result<&SourceFile> {
        self.file(slot).ok_or(Error::MissingInput(slot.label()))
    }

    /// Error for an operation that needs inputs that are not there yet
    fn missing_input(&self) -> Error {
        let slot = if self.base_file.is_none() {
            Slot::Base
        } else {
            Slot::Enrich
        };
        Error::MissingInput(slot.label())
    }

    fn invalidate(&mut self) {
        self.parsed = None;
        self.selected.clear();
        self.hidden.clear();
        self.combined = None;
        self.last_export = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CellValue;

    const BASE: &str = "chassin,color,year\nA1,red,2019\nA2,blue,2021\n";
    const ENRICH: &str = "chassin,owner\nA2,X\nA3,Y\n";

    fn loaded() -> Session {
        let mut session = Session::new();
        session.load_file(Slot::Base, "one.csv", BASE.as_bytes().to_vec());
        session.load_file(Slot::Enrich, "two.csv", ENRICH.as_bytes().to_vec());
        session
    }

    #[test]
    fn test_state_progression() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);

        session.load_file(Slot::Base, "one.csv", BASE.as_bytes().to_vec());
        assert_eq!(session.state(), SessionState::Idle);
        session.load_file(Slot::Enrich, "two.csv", ENRICH.as_bytes().to_vec());
        assert_eq!(session.state(), SessionState::FilesSelected);

        session.process().unwrap();
        assert_eq!(session.state(), SessionState::Parsed);

        session.select_column("color").unwrap();
        assert_eq!(session.state(), SessionState::ColumnsChosen);

        session.combine().unwrap();
        assert_eq!(session.state(), SessionState::Merged);

        session.export(Format::Csv).unwrap();
        assert_eq!(session.state(), SessionState::Exported);
    }

    #[test]
    fn test_process_requires_both_files() {
        let mut session = Session::new();
        session.load_file(Slot::Enrich, "two.csv", ENRICH.as_bytes().to_vec());

        let err = session.process().unwrap_err();
        assert!(matches!(err, Error::MissingInput("file one")));
    }

    #[test]
    fn test_combine_before_process_is_missing_input() {
        let mut session = Session::new();
        assert!(matches!(session.combine(), Err(Error::MissingInput(_))));
        assert!(matches!(session.export(Format::Csv), Err(Error::MissingInput(_))));
    }

    #[test]
    fn test_select_unknown_column() {
        let mut session = loaded();
        session.process().unwrap();

        assert!(matches!(
            session.select_column("owner"),
            Err(Error::UnknownColumn(_))
        ));
        assert!(session.set_selected_columns(&["color", "nope"]).is_err());
        assert!(session.selected_columns().is_empty());
    }

    #[test]
    fn test_combine_and_preview() {
        let mut session = loaded();
        session.process().unwrap();
        session.set_selected_columns(&["color", "color"]).unwrap();
        assert_eq!(session.selected_columns(), ["color".to_string()]);

        let combined = session.combine().unwrap();
        assert_eq!(combined.rows[0].get("color"), Some(&CellValue::text("blue")));
        assert_eq!(session.combined_columns(), vec!["chassin", "owner", "color"]);
        assert_eq!(
            session.merge_stats(),
            Some(MergeStats { matched: 1, unmatched: 1 })
        );

        session.hide_column("owner").unwrap();
        let preview = session.preview().unwrap();
        assert_eq!(preview.columns(), vec!["chassin", "color"]);
        // Hiding never alters the stored result
        assert_eq!(session.combined_columns(), vec!["chassin", "owner", "color"]);

        session.show_column("owner");
        assert!(session.hidden_columns().is_empty());
    }

    #[test]
    fn test_export_uses_hidden_columns() {
        let mut session = loaded();
        session.process().unwrap();
        session.select_column("color").unwrap();
        session.combine().unwrap();
        session.hide_column("owner").unwrap();

        let export = session.export(Format::Csv).unwrap();
        assert_eq!(
            String::from_utf8(export.bytes).unwrap(),
            "chassin,color\r\nA2,blue\r\nA3,\r\n"
        );
        assert_eq!(session.last_export().unwrap().file_name, "combined_data.csv");
    }

    #[test]
    fn test_changing_hidden_columns_drops_last_export() {
        let mut session = loaded();
        session.process().unwrap();
        session.select_column("color").unwrap();
        session.combine().unwrap();
        session.export(Format::Csv).unwrap();

        // Hiding an already hidden column or showing a visible one changes nothing
        session.show_column("owner");
        assert_eq!(session.state(), SessionState::Exported);

        session.hide_column("owner").unwrap();
        assert_eq!(session.state(), SessionState::Merged);
        assert!(session.last_export().is_none());

        session.export(Format::Csv).unwrap();
        session.hide_column("owner").unwrap();
        assert_eq!(session.state(), SessionState::Exported);

        session.show_column("owner");
        assert_eq!(session.state(), SessionState::Merged);
    }

    #[test]
    fn test_export_record_is_timestamped() {
        let mut session = loaded();
        session.process().unwrap();
        session.combine().unwrap();
        let loaded_at = session.file(Slot::Base).unwrap().loaded_at;

        session.export(Format::Spreadsheet).unwrap();
        let record = session.last_export().unwrap();
        assert_eq!(record.format, Format::Spreadsheet);
        assert!(record.exported_at >= loaded_at);
    }

    #[test]
    fn test_reupload_invalidates_derived_state() {
        let mut session = loaded();
        session.process().unwrap();
        session.select_column("color").unwrap();
        session.combine().unwrap();
        session.hide_column("owner").unwrap();

        session.load_file(Slot::Enrich, "two.csv", ENRICH.as_bytes().to_vec());

        assert_eq!(session.state(), SessionState::FilesSelected);
        assert!(session.base_table().is_none());
        assert!(session.combined().is_none());
        assert!(session.selected_columns().is_empty());
        assert!(session.hidden_columns().is_empty());
    }

    #[test]
    fn test_clear_file_returns_to_idle() {
        let mut session = loaded();
        session.process().unwrap();
        session.clear_file(Slot::Base);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.file(Slot::Base).is_none());
        assert!(session.file(Slot::Enrich).is_some());
    }

    #[test]
    fn test_reprocess_keeps_selection_and_drops_result() {
        let mut session = loaded();
        session.process().unwrap();
        session.select_column("color").unwrap();
        session.combine().unwrap();

        session.process().unwrap();

        assert_eq!(session.state(), SessionState::ColumnsChosen);
        assert_eq!(session.selected_columns(), ["color".to_string()]);
        assert!(session.combined().is_none());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let mut session = Session::new();
        session.load_file(Slot::Base, "one.csv", BASE.as_bytes().to_vec());
        session.load_file(Slot::Enrich, "two.xlsx", b"not a workbook".to_vec());

        let err = session.process().unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(session.state(), SessionState::FilesSelected);
        assert!(session.file(Slot::Enrich).is_some());
    }

    #[test]
    fn test_custom_key() {
        let mut session = Session::with_key("vin").with_coercion(Coercion::Infer);
        session.load_file(Slot::Base, "one.csv", b"vin,km\n1,100\n".to_vec());
        session.load_file(Slot::Enrich, "two.csv", b"vin,owner\n1,X\n".to_vec());
        session.process().unwrap();
        session.select_column("km").unwrap();

        let combined = session.combine().unwrap();
        assert_eq!(combined.rows[0].get("km"), Some(&CellValue::Integer(100)));
        assert_eq!(session.key(), "vin");
    }
}
