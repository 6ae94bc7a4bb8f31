//! Row model shared by the parser, merger and export pipeline
//!
//! A [`Table`] is an ordered list of [`Row`]s and a row is an ordered
//! column-name to [`CellValue`] mapping. Rows may be sparse: a column that is
//! not present in a row is *absent*, which is different from a present
//! [`CellValue::Empty`] cell.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// A parsed table: rows in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Table {
    /// Row data
    pub rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from rows
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Column names as seen by selection and hiding: the keys of the first row.
    ///
    /// Columns that only appear in later rows are not listed here, but they
    /// still live in those rows and are still written on export.
    pub fn columns(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|row| row.keys().collect())
            .unwrap_or_default()
    }

    /// Every column in the table: first-row keys in order, then keys first
    /// seen in later rows in order of appearance
    pub fn all_columns(&self) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut columns = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if seen.insert(key) {
                    columns.push(key);
                }
            }
        }
        columns
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single row: column name to value, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    /// Create a new empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by column name; `None` means the column is absent
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Set a value, replacing it in place if the column exists, otherwise
    /// appending the column at the end of the row
    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Remove a column, returning its value if it was present
    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        let index = self.cells.iter().position(|(name, _)| name == column)?;
        Some(self.cells.remove(index).1)
    }

    /// Whether the column is present in this row
    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    /// Column names in row order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over (column, value) pairs in row order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Keep only the columns for which the predicate returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.cells.retain(|(name, _)| keep(name));
    }

    /// Number of present columns
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns at all
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A loosely-typed cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
    /// Present but empty cell
    Empty,
}

impl CellValue {
    /// Keep a string verbatim; only the empty string becomes `Empty`
    pub fn text(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::String(s.to_string())
        }
    }

    /// Parse a string into a CellValue, detecting the type
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        // Try parsing as integer first
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Float(f);
            }
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }

        CellValue::String(trimmed.to_string())
    }

    /// Build a number cell, folding integral floats into `Integer`
    pub fn number(f: f64) -> Self {
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            CellValue::Integer(f as i64)
        } else {
            CellValue::Float(f)
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Value equality used for join keys.
    ///
    /// Numbers compare by value regardless of integer/float representation,
    /// `NaN` never matches, strings compare case-sensitively and a number
    /// never equals its textual form. Two values are equal exactly when
    /// their [`JoinKey`]s are.
    pub fn same_value(&self, other: &CellValue) -> bool {
        match (self.join_key(), other.join_key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Hashable join-key form of the value; `None` for `NaN`
    pub fn join_key(&self) -> Option<JoinKey<'_>> {
        match self {
            CellValue::Integer(i) => Some(JoinKey::Int(*i)),
            CellValue::Float(f) if f.is_nan() => None,
            // Integral floats fold to `Int` so that 7 and 7.0 share a key
            CellValue::Float(f) => match CellValue::number(*f) {
                CellValue::Integer(i) => Some(JoinKey::Int(i)),
                _ => Some(JoinKey::Float(f.to_bits())),
            },
            CellValue::Bool(b) => Some(JoinKey::Bool(*b)),
            CellValue::String(s) => Some(JoinKey::Text(s)),
            CellValue::Empty => Some(JoinKey::Empty),
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

/// Hashable form of a join-key value, see [`CellValue::join_key`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKey<'a> {
    /// Integer, or a float with an integral value
    Int(i64),
    /// Bit pattern of a non-integral float
    Float(u64),
    /// Boolean
    Bool(bool),
    /// Case-sensitive text
    Text(&'a str),
    /// Present but empty cell
    Empty,
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(fl) => write!(f, "{}", fl),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Empty => write!(f, ""),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::String(s)
        }
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Build a [`Row`] from `column => value` pairs
///
/// ```
/// use tabjoin_core::{row, CellValue};
/// let r = row! { "chassin" => "A1", "count" => 3i64 };
/// assert_eq!(r.get("count"), Some(&CellValue::Integer(3)));
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::table::Row::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::table::Row::new();
        $( row.set($column, $crate::table::CellValue::from($value)); )+
        row
    }};
}
