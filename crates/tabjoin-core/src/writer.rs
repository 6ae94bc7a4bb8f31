//! Serializers turning a [`Table`] back into CSV or workbook bytes

use crate::error::{Error, Result};
use crate::format::{Format, EXPORT_SHEET_NAME};
use crate::table::{CellValue, Table};
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::debug;

/// Largest magnitude an xlsx number cell holds without rounding
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Serialize a table in the given format.
///
/// The header is [`Table::all_columns`], so columns missing from the first
/// row are still written. Absent cells are written blank.
pub fn serialize(table: &Table, format: Format) -> Result<Vec<u8>> {
    let bytes = match format {
        Format::Csv => write_csv_bytes(table)?,
        Format::Spreadsheet => write_spreadsheet_bytes(table)?,
    };
    debug!(%format, rows = table.row_count(), bytes = bytes.len(), "serialized table");
    Ok(bytes)
}

/// Write RFC 4180 CSV with CRLF line endings.
///
/// A table without any columns, for example after hiding all of them,
/// produces no output at all.
pub fn write_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let columns = table.all_columns();
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::<u8>::new());

    writer.write_record(&columns).map_err(Error::CsvWrite)?;
    for row in &table.rows {
        let fields = columns.iter().map(|column| {
            row.get(column)
                .map(CellValue::to_string_value)
                .unwrap_or_default()
        });
        writer.write_record(fields).map_err(Error::CsvWrite)?;
    }
    writer.flush()?;

    writer
        .into_inner()
        .map_err(|e| Error::CsvWrite(e.into_error().into()))
}

/// Write a single-sheet xlsx workbook with a header row
pub fn write_spreadsheet_bytes(table: &Table) -> Result<Vec<u8>> {
    let columns = table.all_columns();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET_NAME)?;

    for (col_idx, column) in columns.iter().enumerate() {
        sheet.write_string(0, grid_col(col_idx)?, *column)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let sheet_row = grid_row(row_idx + 1)?;
        for (col_idx, column) in columns.iter().enumerate() {
            if let Some(value) = row.get(column) {
                write_cell(sheet, sheet_row, grid_col(col_idx)?, value)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &CellValue) -> Result<()> {
    match value {
        CellValue::Integer(i) if i.unsigned_abs() <= MAX_EXACT_INTEGER => {
            sheet.write_number(row, col, *i as f64)?;
        }
        // Written as text to keep every digit
        CellValue::Integer(i) => {
            sheet.write_string(row, col, i.to_string())?;
        }
        CellValue::Float(f) if f.is_finite() => {
            sheet.write_number(row, col, *f)?;
        }
        CellValue::Float(f) => {
            sheet.write_string(row, col, f.to_string())?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        CellValue::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        CellValue::Empty => {}
    }
    Ok(())
}

fn grid_row(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| Error::TooLarge(format!("row {}", index)))
}

fn grid_col(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| Error::TooLarge(format!("column {}", index)))
}
