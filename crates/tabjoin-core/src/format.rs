//! Supported file formats and how they are picked from a file name

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Base name used for exported files
pub const EXPORT_STEM: &str = "combined_data";

/// Name of the single sheet written on spreadsheet export
pub const EXPORT_SHEET_NAME: &str = "Filtered Data";

/// A tabular file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Comma-separated text with a header row
    #[default]
    Csv,
    /// Spreadsheet workbook, written as .xlsx
    #[serde(rename = "xlsx", alias = "spreadsheet")]
    Spreadsheet,
}

impl Format {
    /// Pick a format from a file name: `.csv` means CSV, anything else is
    /// treated as a spreadsheet. File contents are never inspected.
    pub fn from_file_name(name: &str) -> Self {
        let is_csv = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            Format::Csv
        } else {
            Format::Spreadsheet
        }
    }

    /// File extension for exports, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Spreadsheet => "xlsx",
        }
    }

    /// Suggested file name for an export in this format
    pub fn default_file_name(self) -> String {
        format!("{}.{}", EXPORT_STEM, self.extension())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "xlsx" | "excel" | "spreadsheet" => Ok(Format::Spreadsheet),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}
