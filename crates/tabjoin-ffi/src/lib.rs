//! C FFI bindings for tabjoin-core
//!
//! This crate provides a C-compatible API so a native UI can drive a
//! [`Session`]: load two files, pick columns, combine, hide columns and
//! export. Functions returning `c_int` use the `TJ_*` status codes; on
//! failure `tj_session_last_error` describes what went wrong.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use tabjoin_core::{Error, Format, Session, Slot};

pub const TJ_OK: c_int = 0;
pub const TJ_ERR_NULL: c_int = -1;
pub const TJ_ERR_MISSING_INPUT: c_int = -2;
pub const TJ_ERR_PARSE: c_int = -3;
pub const TJ_ERR_UNKNOWN_COLUMN: c_int = -4;
pub const TJ_ERR_INVALID_ARGUMENT: c_int = -5;
pub const TJ_ERR_OTHER: c_int = -6;

pub const TJ_SLOT_BASE: c_int = 0;
pub const TJ_SLOT_ENRICH: c_int = 1;

pub const TJ_FORMAT_CSV: c_int = 0;
pub const TJ_FORMAT_XLSX: c_int = 1;

/// Opaque handle to a merge session
pub struct TjSession {
    inner: Session,
    last_error: Option<CString>,
}

impl TjSession {
    fn record(&mut self, result: tabjoin_core::Result<()>) -> c_int {
        match result {
            Ok(()) => {
                self.last_error = None;
                TJ_OK
            }
            Err(e) => {
                let code = status_of(&e);
                self.last_error = CString::new(e.to_string()).ok();
                code
            }
        }
    }

    fn invalid(&mut self, message: &str) -> c_int {
        self.last_error = CString::new(message).ok();
        TJ_ERR_INVALID_ARGUMENT
    }
}

fn status_of(error: &Error) -> c_int {
    match error {
        Error::MissingInput(_) => TJ_ERR_MISSING_INPUT,
        Error::UnknownColumn(_) => TJ_ERR_UNKNOWN_COLUMN,
        Error::InvalidFormat(_) => TJ_ERR_INVALID_ARGUMENT,
        e if e.is_parse_error() => TJ_ERR_PARSE,
        _ => TJ_ERR_OTHER,
    }
}

fn slot_of(slot: c_int) -> Option<Slot> {
    match slot {
        TJ_SLOT_BASE => Some(Slot::Base),
        TJ_SLOT_ENRICH => Some(Slot::Enrich),
        _ => None,
    }
}

fn format_of(format: c_int) -> Option<Format> {
    match format {
        TJ_FORMAT_CSV => Some(Format::Csv),
        TJ_FORMAT_XLSX => Some(Format::Spreadsheet),
        _ => None,
    }
}

fn to_c_string(s: &str) -> *mut c_char {
    CString::new(s).map(|s| s.into_raw()).unwrap_or(ptr::null_mut())
}

/// Create a session
///
/// # Safety
/// - `key` must be a valid C string, or null to join on the default key
/// - Returns null if `key` is not valid UTF-8
#[no_mangle]
pub unsafe extern "C" fn tj_session_new(key: *const c_char) -> *mut TjSession {
    let inner = if key.is_null() {
        Session::new()
    } else {
        match CStr::from_ptr(key).to_str() {
            Ok(k) => Session::with_key(k),
            Err(_) => return ptr::null_mut(),
        }
    };

    Box::into_raw(Box::new(TjSession {
        inner,
        last_error: None,
    }))
}

/// Free a session
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new` or null
#[no_mangle]
pub unsafe extern "C" fn tj_session_free(session: *mut TjSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Load a file from disk into a slot, discarding everything derived from
/// the previous inputs
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - `path` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn tj_session_load_path(
    session: *mut TjSession,
    slot: c_int,
    path: *const c_char,
) -> c_int {
    if session.is_null() || path.is_null() {
        return TJ_ERR_NULL;
    }
    let session = &mut *session;

    let Some(slot) = slot_of(slot) else {
        return session.invalid("slot must be TJ_SLOT_BASE or TJ_SLOT_ENRICH");
    };
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return session.invalid("path is not valid UTF-8");
    };

    let result = session.inner.load_path(slot, path);
    session.record(result)
}

/// Parse both loaded files
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
#[no_mangle]
pub unsafe extern "C" fn tj_session_process(session: *mut TjSession) -> c_int {
    if session.is_null() {
        return TJ_ERR_NULL;
    }
    let session = &mut *session;
    let result = session.inner.process();
    session.record(result)
}

/// Current workflow state: 0 idle, 1 files selected, 2 parsed,
/// 3 columns chosen, 4 merged, 5 exported
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
#[no_mangle]
pub unsafe extern "C" fn tj_session_state(session: *const TjSession) -> c_int {
    if session.is_null() {
        return TJ_ERR_NULL;
    }
    (*session).inner.state() as c_int
}

/// Get the number of base-file columns offered for copying
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
#[no_mangle]
pub unsafe extern "C" fn tj_session_base_column_count(session: *const TjSession) -> usize {
    if session.is_null() {
        return 0;
    }
    (*session).inner.base_columns().len()
}

/// Get a base-file column name by index
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `tj_free_string`
#[no_mangle]
pub unsafe extern "C" fn tj_session_base_column_name(
    session: *const TjSession,
    index: usize,
) -> *mut c_char {
    if session.is_null() {
        return ptr::null_mut();
    }
    (*session)
        .inner
        .base_columns()
        .get(index)
        .map(|name| to_c_string(name))
        .unwrap_or(ptr::null_mut())
}

/// Select or deselect a base-file column for copying
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - `column` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn tj_session_select_column(
    session: *mut TjSession,
    column: *const c_char,
    selected: bool,
) -> c_int {
    if session.is_null() || column.is_null() {
        return TJ_ERR_NULL;
    }
    let session = &mut *session;
    let Ok(column) = CStr::from_ptr(column).to_str() else {
        return session.invalid("column is not valid UTF-8");
    };

    let result = if selected {
        session.inner.select_column(column)
    } else {
        session.inner.deselect_column(column);
        Ok(())
    };
    session.record(result)
}

/// Merge the parsed files using the current selection
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
#[no_mangle]
pub unsafe extern "C" fn tj_session_combine(session: *mut TjSession) -> c_int {
    if session.is_null() {
        return TJ_ERR_NULL;
    }
    let session = &mut *session;
    let result = session.inner.combine().map(|_| ());
    session.record(result)
}

/// Get the number of rows in the combined table
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
#[no_mangle]
pub unsafe extern "C" fn tj_session_combined_row_count(session: *const TjSession) -> usize {
    if session.is_null() {
        return 0;
    }
    (*session)
        .inner
        .combined()
        .map(|table| table.row_count())
        .unwrap_or(0)
}

/// Get the number of combined-table columns offered for hiding
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
#[no_mangle]
pub unsafe extern "C" fn tj_session_combined_column_count(session: *const TjSession) -> usize {
    if session.is_null() {
        return 0;
    }
    (*session).inner.combined_columns().len()
}

/// Get a combined-table column name by index
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `tj_free_string`
#[no_mangle]
pub unsafe extern "C" fn tj_session_combined_column_name(
    session: *const TjSession,
    index: usize,
) -> *mut c_char {
    if session.is_null() {
        return ptr::null_mut();
    }
    (*session)
        .inner
        .combined_columns()
        .get(index)
        .map(|name| to_c_string(name))
        .unwrap_or(ptr::null_mut())
}

/// Get a combined-table cell as a string
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - `column` must be a valid C string
/// - Returns null if the row is out of bounds or the column is absent
/// - Caller must free the returned string with `tj_free_string`
#[no_mangle]
pub unsafe extern "C" fn tj_session_combined_cell(
    session: *const TjSession,
    row: usize,
    column: *const c_char,
) -> *mut c_char {
    if session.is_null() || column.is_null() {
        return ptr::null_mut();
    }
    let Ok(column) = CStr::from_ptr(column).to_str() else {
        return ptr::null_mut();
    };

    (*session)
        .inner
        .combined()
        .and_then(|table| table.rows.get(row))
        .and_then(|r| r.get(column))
        .map(|value| to_c_string(&value.to_string_value()))
        .unwrap_or(ptr::null_mut())
}

/// Hide or show a combined-table column
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - `column` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn tj_session_hide_column(
    session: *mut TjSession,
    column: *const c_char,
    hidden: bool,
) -> c_int {
    if session.is_null() || column.is_null() {
        return TJ_ERR_NULL;
    }
    let session = &mut *session;
    let Ok(column) = CStr::from_ptr(column).to_str() else {
        return session.invalid("column is not valid UTF-8");
    };

    let result = if hidden {
        session.inner.hide_column(column)
    } else {
        session.inner.show_column(column);
        Ok(())
    };
    session.record(result)
}

/// Export the combined table, without hidden columns, to a file or directory
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - `path` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn tj_session_export(
    session: *mut TjSession,
    format: c_int,
    path: *const c_char,
) -> c_int {
    if session.is_null() || path.is_null() {
        return TJ_ERR_NULL;
    }
    let session = &mut *session;

    let Some(format) = format_of(format) else {
        return session.invalid("format must be TJ_FORMAT_CSV or TJ_FORMAT_XLSX");
    };
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return session.invalid("path is not valid UTF-8");
    };

    let result = session
        .inner
        .export(format)
        .and_then(|export| export.write_to(path))
        .map(|_| ());
    session.record(result)
}

/// Message of the last failed call on this session
///
/// # Safety
/// - `session` must be a valid pointer returned by `tj_session_new`
/// - Returns null if the last call succeeded
/// - The string is owned by the session and valid until the next call on it
#[no_mangle]
pub unsafe extern "C" fn tj_session_last_error(session: *const TjSession) -> *const c_char {
    if session.is_null() {
        return ptr::null();
    }
    (*session)
        .last_error
        .as_ref()
        .map(|e| e.as_ptr())
        .unwrap_or(ptr::null())
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a tj_* function or null
#[no_mangle]
pub unsafe extern "C" fn tj_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_full_flow_through_ffi() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("one.csv");
        let enrich = dir.path().join("two.csv");
        let out = dir.path().join("out.csv");
        fs::write(&base, "chassin,color\nA1,red\nA2,blue\n").unwrap();
        fs::write(&enrich, "chassin,owner\nA2,X\nA3,Y\n").unwrap();

        unsafe {
            let session = tj_session_new(ptr::null());
            assert!(!session.is_null());

            let base_path = c(base.to_str().unwrap());
            let enrich_path = c(enrich.to_str().unwrap());
            assert_eq!(tj_session_load_path(session, TJ_SLOT_BASE, base_path.as_ptr()), TJ_OK);
            assert_eq!(tj_session_load_path(session, TJ_SLOT_ENRICH, enrich_path.as_ptr()), TJ_OK);
            assert_eq!(tj_session_process(session), TJ_OK);
            assert_eq!(tj_session_base_column_count(session), 2);

            let color = c("color");
            assert_eq!(tj_session_select_column(session, color.as_ptr(), true), TJ_OK);
            assert_eq!(tj_session_combine(session), TJ_OK);
            assert_eq!(tj_session_combined_row_count(session), 2);

            let cell = tj_session_combined_cell(session, 0, color.as_ptr());
            assert_eq!(CStr::from_ptr(cell).to_str().unwrap(), "blue");
            tj_free_string(cell);

            let owner = c("owner");
            assert_eq!(tj_session_hide_column(session, owner.as_ptr(), true), TJ_OK);
            let out_path = c(out.to_str().unwrap());
            assert_eq!(tj_session_export(session, TJ_FORMAT_CSV, out_path.as_ptr()), TJ_OK);
            assert_eq!(tj_session_state(session), 5);

            tj_session_free(session);
        }

        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "chassin,color\r\nA2,blue\r\nA3,\r\n"
        );
    }

    #[test]
    fn test_errors_are_reported() {
        unsafe {
            let session = tj_session_new(ptr::null());

            assert_eq!(tj_session_process(session), TJ_ERR_MISSING_INPUT);
            assert!(!tj_session_last_error(session).is_null());

            let name = c("x");
            assert_eq!(
                tj_session_select_column(session, name.as_ptr(), true),
                TJ_ERR_UNKNOWN_COLUMN
            );
            assert_eq!(tj_session_load_path(session, 7, name.as_ptr()), TJ_ERR_INVALID_ARGUMENT);
            assert_eq!(tj_session_combine(ptr::null_mut()), TJ_ERR_NULL);

            tj_session_free(session);
        }
    }
}
