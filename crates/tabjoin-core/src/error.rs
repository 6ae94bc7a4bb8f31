//! Error types for tabjoin-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tabjoin-core
#[derive(Debug, Error)]
pub enum Error {
    /// One of the two input files has not been provided
    #[error("missing input: no file loaded for {0}")]
    MissingInput(&'static str),

    /// Delimited text could not be decoded
    #[error("failed to parse CSV '{name}': {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// Spreadsheet container could not be decoded
    #[error("failed to parse spreadsheet '{name}': {source}")]
    Spreadsheet {
        name: String,
        #[source]
        source: calamine::Error,
    },

    /// Spreadsheet decoded but contains no sheets
    #[error("spreadsheet '{0}' contains no sheets")]
    NoSheets(String),

    /// Source decoded to zero data rows
    #[error("'{0}' contains no data rows")]
    EmptyTable(String),

    /// Background parse worker died before producing a result
    #[error("parse task for '{0}' did not complete")]
    ParseTask(String),

    /// Column is not part of the schema it was chosen from
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Unrecognized export format name
    #[error("invalid format '{0}', expected csv or xlsx")]
    InvalidFormat(String),

    /// Failed to write delimited text
    #[error("failed to write CSV: {0}")]
    CsvWrite(#[source] csv::Error),

    /// Failed to build the spreadsheet document
    #[error("failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Table exceeds the spreadsheet grid limits
    #[error("table too large for a spreadsheet: {0}")]
    TooLarge(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means an input file could not be turned into a table.
    ///
    /// These are recoverable by the user: the original file is kept and a
    /// corrected one can be loaded in its place.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::Csv { .. }
                | Error::Spreadsheet { .. }
                | Error::NoSheets(_)
                | Error::EmptyTable(_)
                | Error::ParseTask(_)
        )
    }
}
