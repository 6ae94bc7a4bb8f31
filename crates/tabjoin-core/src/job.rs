//! Job files: a saved description of one combine-and-export run
//!
//! A job is stored as JSON:
//!
//! ```json
//! {
//!   "base": "vehicles.xlsx",
//!   "enrich": "owners.csv",
//!   "key": "chassin",
//!   "columns": ["color"],
//!   "hidden": ["owner"],
//!   "format": "csv"
//! }
//! ```

use crate::error::{Error, Result};
use crate::export::Export;
use crate::format::Format;
use crate::merger::DEFAULT_JOIN_KEY;
use crate::parser::Coercion;
use crate::session::{Session, Slot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A saved combine-and-export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    /// File one, supplying columns
    pub base: PathBuf,
    /// File two, receiving columns
    pub enrich: PathBuf,
    /// Join key column
    #[serde(default = "default_key")]
    pub key: String,
    /// Columns of file one to copy
    #[serde(default)]
    pub columns: Vec<String>,
    /// Columns of the result to leave out of the export
    #[serde(default)]
    pub hidden: Vec<String>,
    /// Export format
    #[serde(default)]
    pub format: Format,
    /// Output file or directory; defaults to the format's file name in the
    /// working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// How CSV fields are typed
    #[serde(default)]
    pub coercion: Coercion,
}

fn default_key() -> String {
    DEFAULT_JOIN_KEY.to_string()
}

impl JobFile {
    /// Create a job with default key, format and no column choices
    pub fn new(base: impl Into<PathBuf>, enrich: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            enrich: enrich.into(),
            key: default_key(),
            columns: Vec::new(),
            hidden: Vec::new(),
            format: Format::default(),
            output: None,
            coercion: Coercion::default(),
        }
    }

    /// Load a job file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the job file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Where the export should be written
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.format.default_file_name()))
    }

    /// Load, process, combine and export, returning the finished session
    /// alongside the export
    pub fn run(&self) -> Result<(Session, Export)> {
        let mut session = Session::with_key(self.key.as_str()).with_coercion(self.coercion);
        session.load_path(Slot::Base, &self.base)?;
        session.load_path(Slot::Enrich, &self.enrich)?;
        session.process()?;
        session.set_selected_columns(&self.columns)?;
        session.combine()?;
        for column in &self.hidden {
            session.hide_column(column)?;
        }
        let export = session.export(self.format)?;

        info!(
            base = %self.base.display(),
            enrich = %self.enrich.display(),
            format = %self.format,
            "job finished"
        );
        Ok((session, export))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_defaults() {
        let job: JobFile =
            serde_json::from_str(r#"{"base": "a.xlsx", "enrich": "b.csv"}"#).unwrap();

        assert_eq!(job, JobFile::new("a.xlsx", "b.csv"));
        assert_eq!(job.key, "chassin");
        assert_eq!(job.output_path(), PathBuf::from("combined_data.csv"));
    }

    #[test]
    fn test_job_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        let mut job = JobFile::new("a.csv", "b.csv");
        job.columns = vec!["color".to_string()];
        job.format = Format::Spreadsheet;
        job.save(&path).unwrap();

        let loaded = JobFile::load(&path).unwrap();
        assert_eq!(loaded, job);
        assert_eq!(loaded.output_path(), PathBuf::from("combined_data.xlsx"));
    }

    #[test]
    fn test_job_run() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("one.csv");
        let enrich = dir.path().join("two.csv");
        fs::write(&base, "chassin,color\nA1,red\nA2,blue\n").unwrap();
        fs::write(&enrich, "chassin,owner\nA2,X\nA3,Y\n").unwrap();

        let mut job = JobFile::new(&base, &enrich);
        job.columns = vec!["color".to_string()];
        job.hidden = vec!["owner".to_string()];
        let (session, export) = job.run().unwrap();

        assert_eq!(
            String::from_utf8(export.bytes).unwrap(),
            "chassin,color\r\nA2,blue\r\nA3,\r\n"
        );
        assert!(session.last_export().is_some());
    }

    #[test]
    fn test_job_run_missing_file() {
        let job = JobFile::new("/nonexistent/one.csv", "/nonexistent/two.csv");
        assert!(matches!(job.run(), Err(Error::FileRead { .. })));
    }
}
