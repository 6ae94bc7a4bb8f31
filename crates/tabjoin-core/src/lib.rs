//! tabjoin-core: Core library for combining two CSV/spreadsheet tables
//!
//! This library provides functionality to:
//! - Parse CSV text or the first sheet of a workbook into a row-based table
//! - Copy selected columns from one table into another by a join key
//! - Hide columns and export the result back to CSV or xlsx
//! - Track one merge session, invalidating derived state on re-upload
//! - Load and save JSON job files describing a whole run

pub mod error;
pub mod export;
pub mod format;
pub mod job;
pub mod merger;
pub mod parser;
pub mod session;
pub mod table;
pub mod writer;

pub use error::{Error, Result};
pub use export::{export, project, Export};
pub use format::Format;
pub use job::JobFile;
pub use merger::{merge, merge_with_stats, MergeStats, DEFAULT_JOIN_KEY};
pub use parser::{parse, parse_file, Coercion, ParseTask};
pub use session::{Session, SessionState, Slot, SourceFile};
pub use table::{CellValue, JoinKey, Row, Table};
pub use writer::serialize;
