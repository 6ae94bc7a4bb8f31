//! Parsers turning CSV text or spreadsheet workbooks into a [`Table`]

use crate::error::{Error, Result};
use crate::format::Format;
use crate::table::{CellValue, Row, Table};
use calamine::{Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Column name given to a blank header cell
const EMPTY_HEADER: &str = "__EMPTY";

/// How CSV fields are turned into cell values.
///
/// Spreadsheet cells carry their own types and are not affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coercion {
    /// Every non-empty field is kept as a string, byte for byte
    #[default]
    Text,
    /// Fields are trimmed and detected as integer, float or boolean
    Infer,
}

impl Coercion {
    /// Convert one CSV field; empty fields are always `Empty`
    pub fn apply(self, field: &str) -> CellValue {
        match self {
            Coercion::Text => CellValue::text(field),
            Coercion::Infer => CellValue::parse(field),
        }
    }
}

/// Parse file contents, choosing the parser from the file name
pub fn parse(bytes: &[u8], file_name: &str, coercion: Coercion) -> Result<Table> {
    match Format::from_file_name(file_name) {
        Format::Csv => parse_csv_bytes(bytes, file_name, coercion),
        Format::Spreadsheet => parse_spreadsheet_bytes(bytes, file_name),
    }
}

/// Read and parse a file from disk
pub fn parse_file<P: AsRef<Path>>(path: P, coercion: Coercion) -> Result<Table> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&bytes, &file_name_of(path), coercion)
}

/// Parse CSV text whose first record is the header row
pub fn parse_csv_bytes(bytes: &[u8], name: &str, coercion: Coercion) -> Result<Table> {
    let bytes = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(bytes);

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        name: name.to_string(),
        source: e,
    })?;
    let columns = normalize_headers(headers.iter());

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            name: name.to_string(),
            source: e,
        })?;

        if record.len() > columns.len() {
            warn!(
                source = name,
                row = row_idx + 1,
                fields = record.len(),
                columns = columns.len(),
                "dropping fields beyond the header"
            );
        }

        // Short records leave their trailing columns absent
        let row: Row = columns
            .iter()
            .zip(record.iter())
            .map(|(column, field)| (column.clone(), coercion.apply(field)))
            .collect();
        rows.push(row);
    }

    finish(Table::from_rows(rows), name, Format::Csv)
}

/// Parse the first sheet of a workbook whose first row is the header row
pub fn parse_spreadsheet_bytes(bytes: &[u8], name: &str) -> Result<Table> {
    let spreadsheet_error = |source: calamine::Error| Error::Spreadsheet {
        name: name.to_string(),
        source,
    };

    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(spreadsheet_error)?;
    let sheet_count = workbook.sheet_names().len();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::NoSheets(name.to_string()))?
        .map_err(spreadsheet_error)?;
    if sheet_count > 1 {
        debug!(source = name, ignored = sheet_count - 1, "reading first sheet only");
    }

    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Err(Error::EmptyTable(name.to_string()));
    };
    let columns = normalize_headers(header.iter().map(header_text));

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let row: Row = columns
            .iter()
            .zip(cells)
            .filter_map(|(column, cell)| cell_value(cell).map(|value| (column.clone(), value)))
            .collect();

        // Fully blank rows are skipped
        if !row.is_empty() {
            rows.push(row);
        }
    }

    finish(Table::from_rows(rows), name, Format::Spreadsheet)
}

/// A parse running on its own thread.
///
/// The caller keeps control while a large file is decoded and collects the
/// outcome with [`ParseTask::wait`].
#[derive(Debug)]
pub struct ParseTask {
    name: String,
    handle: JoinHandle<Result<Table>>,
}

impl ParseTask {
    /// Start parsing `bytes` in the background
    pub fn spawn<B>(name: impl Into<String>, bytes: B, coercion: Coercion) -> Self
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let handle = thread::spawn(move || parse(bytes.as_ref(), &task_name, coercion));
        Self { name, handle }
    }

    /// Name of the file being parsed
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the parse has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the parse completes
    pub fn wait(self) -> Result<Table> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::ParseTask(self.name)),
        }
    }
}

fn finish(table: Table, name: &str, format: Format) -> Result<Table> {
    if table.is_empty() {
        return Err(Error::EmptyTable(name.to_string()));
    }
    debug!(
        source = name,
        %format,
        rows = table.row_count(),
        columns = table.columns().len(),
        "parsed table"
    );
    Ok(table)
}

/// Make header names usable as row keys: blank names become `__EMPTY`,
/// repeated names get a `_1`, `_2`, ... suffix
fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::new();
    for header in raw {
        let base = match header.as_ref() {
            "" => EMPTY_HEADER,
            other => other,
        };
        let mut name = base.to_string();
        let mut suffix = 0;
        while used.contains(&name) {
            suffix += 1;
            name = format!("{}_{}", base, suffix);
        }
        used.insert(name.clone());
        names.push(name);
    }
    names
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

/// Map a spreadsheet cell to a value; `None` leaves the column absent
fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Int(i) => Some(CellValue::Integer(*i)),
        Data::Float(f) => Some(CellValue::number(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::String(s) => Some(CellValue::text(s)),
        // Dates stay as the workbook's serial number
        Data::DateTime(dt) => Some(CellValue::number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::text(s)),
        Data::Error(_) | Data::Empty => None,
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
