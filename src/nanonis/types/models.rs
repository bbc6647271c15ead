//! Core data structures shared by the three dialects.
//!
//! This module defines:
//! - The typed header model ([`HeaderValue`], [`Table`], [`Header`])
//! - Decoded channel arrays ([`Signal`], [`ScanChannel`])
//! - Caller configuration ([`DecodeOptions`])
//! - Non-fatal findings ([`DecodeWarning`])

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use ndarray::{Array1, Array2, Array3};

use super::error::{NanonisError, Result};
use super::filetypes::{ElementEncoding, FileKind};

/// Timestamp layout used by every dialect, e.g. `21.10.2014 16:48:06`.
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// A header table: named columns of equal length, in file order.
///
/// Scan headers use tables for `:DATA_INFO:`, `:Z-CONTROLLER:` and
/// `:Multipass-Config:`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<(String, Vec<String>)>,
}

impl Table {
    /// Builds a table from a column-name row and the data rows below it.
    ///
    /// Columns are zipped across rows, so a ragged row shortens every column
    /// to the shortest row.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<String>]) -> Self {
        let depth = rows.iter().map(Vec::len).min().unwrap_or(0);
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let values = if i < depth {
                    rows.iter().map(|row| row[i].clone()).collect()
                } else {
                    Vec::new()
                };
                (name, values)
            })
            .collect();
        Self { columns }
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Column names in file order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Number of data rows.
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|(_, values)| values.len()).unwrap_or(0)
    }
}

/// A typed header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    List(Vec<String>),
    Table(Table),
    Int(i64),
    IntList(Vec<i64>),
    Float(f64),
    FloatList(Vec<f64>),
}

impl HeaderValue {
    fn shape(&self) -> &'static str {
        match self {
            HeaderValue::Text(_) => "text",
            HeaderValue::List(_) => "text list",
            HeaderValue::Table(_) => "table",
            HeaderValue::Int(_) => "integer",
            HeaderValue::IntList(_) => "integer list",
            HeaderValue::Float(_) => "float",
            HeaderValue::FloatList(_) => "float list",
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items.iter().map(ToString::to_string).collect::<Vec<_>>().join(";")
        }
        match self {
            HeaderValue::Text(text) => f.write_str(text),
            HeaderValue::List(items) => f.write_str(&join(items)),
            HeaderValue::Table(table) => {
                let names: Vec<&str> = table.column_names().collect();
                write!(f, "<table {} x {}>", names.join(";"), table.num_rows())
            }
            HeaderValue::Int(value) => write!(f, "{}", value),
            HeaderValue::IntList(items) => f.write_str(&join(items)),
            HeaderValue::Float(value) => write!(f, "{}", value),
            HeaderValue::FloatList(items) => f.write_str(&join(items)),
        }
    }
}

/// The parsed header of one file.
///
/// Scan keys are lower-cased; Grid and Spec keys keep their case.
#[derive(Debug, Clone)]
pub struct Header {
    kind: FileKind,
    entries: HashMap<String, HeaderValue>,
}

impl Header {
    pub(crate) fn new(kind: FileKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: HeaderValue) {
        self.entries.insert(key.into(), value);
    }

    /// The dialect this header was parsed from.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, key: &str) -> Result<&HeaderValue> {
        self.entries
            .get(key)
            .ok_or_else(|| NanonisError::missing_key(self.kind, key))
    }

    fn mismatch(&self, key: &str, value: &HeaderValue, expected: &'static str) -> NanonisError {
        NanonisError::malformed(
            self.kind,
            key,
            format!("{} ({})", value, value.shape()),
            expected,
        )
    }

    /// A text value.
    pub fn text(&self, key: &str) -> Result<&str> {
        match self.require(key)? {
            HeaderValue::Text(text) => Ok(text),
            other => Err(self.mismatch(key, other, "text")),
        }
    }

    /// A list value; a single text value reads as a one-element list.
    pub fn text_list(&self, key: &str) -> Result<Vec<&str>> {
        match self.require(key)? {
            HeaderValue::List(items) => Ok(items.iter().map(String::as_str).collect()),
            HeaderValue::Text(text) => Ok(vec![text.as_str()]),
            other => Err(self.mismatch(key, other, "text list")),
        }
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        match self.require(key)? {
            HeaderValue::Int(value) => Ok(*value),
            other => Err(self.mismatch(key, other, "integer")),
        }
    }

    pub fn int_list(&self, key: &str) -> Result<&[i64]> {
        match self.require(key)? {
            HeaderValue::IntList(items) => Ok(items),
            other => Err(self.mismatch(key, other, "integer list")),
        }
    }

    /// A non-negative integer used as a size or count.
    pub fn count(&self, key: &str) -> Result<usize> {
        let value = self.int(key)?;
        usize::try_from(value)
            .map_err(|_| NanonisError::malformed(self.kind, key, value.to_string(), "non-negative integer"))
    }

    /// A float value; integers widen.
    pub fn float(&self, key: &str) -> Result<f64> {
        match self.require(key)? {
            HeaderValue::Float(value) => Ok(*value),
            HeaderValue::Int(value) => Ok(*value as f64),
            other => Err(self.mismatch(key, other, "float")),
        }
    }

    pub fn float_list(&self, key: &str) -> Result<&[f64]> {
        match self.require(key)? {
            HeaderValue::FloatList(items) => Ok(items),
            other => Err(self.mismatch(key, other, "float list")),
        }
    }

    pub fn table(&self, key: &str) -> Result<&Table> {
        match self.require(key)? {
            HeaderValue::Table(table) => Ok(table),
            other => Err(self.mismatch(key, other, "table")),
        }
    }

    /// Parses a `dd.mm.yyyy HH:MM:SS` timestamp stored as text.
    pub fn datetime(&self, key: &str) -> Result<NaiveDateTime> {
        let text = self.text(key)?;
        NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
            .map_err(|_| NanonisError::malformed(self.kind, key, text, "dd.mm.yyyy HH:MM:SS timestamp"))
    }
}

/// Forward and backward images of one scan channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanChannel {
    pub forward: Array2<f64>,
    pub backward: Array2<f64>,
}

/// One decoded, named array.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// 1-D: the Grid sweep axis or a Spec column.
    Trace(Array1<f64>),
    /// 2-D: the Grid topography, shaped `(ny, nx)`.
    Image(Array2<f64>),
    /// 3-D: a Grid channel `(ny, nx, num_sweep_signal)` or the parameter
    /// block `(ny, nx, num_parameters)`.
    Volume(Array3<f64>),
    /// A Scan channel, both directions shaped `(ny, nx)`.
    Scan(ScanChannel),
}

impl Signal {
    pub fn as_trace(&self) -> Option<&Array1<f64>> {
        match self {
            Signal::Trace(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Array2<f64>> {
        match self {
            Signal::Image(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_volume(&self) -> Option<&Array3<f64>> {
        match self {
            Signal::Volume(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_scan(&self) -> Option<&ScanChannel> {
        match self {
            Signal::Scan(channel) => Some(channel),
            _ => None,
        }
    }
}

/// Signal name → decoded array.
pub type Signals = HashMap<String, Signal>;

/// A non-fatal finding recorded while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// A header line held bytes that are not UTF-8; they were replaced with U+FFFD.
    InvalidUtf8 { line: usize, byte_offset: u64 },
    /// Two signals share a name; only the later one is kept.
    DuplicateSignal { name: String },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeWarning::InvalidUtf8 { line, byte_offset } => write!(
                f,
                "header line {} (byte {}) is not valid UTF-8; invalid bytes were replaced",
                line, byte_offset
            ),
            DecodeWarning::DuplicateSignal { name } => write!(
                f,
                "signal {:?} appears more than once; the later one replaced the earlier",
                name
            ),
        }
    }
}

/// Caller configuration for one decode.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Element encoding of binary payloads. `None` defers to the header, then
    /// to big-endian 32-bit floats.
    pub encoding: Option<ElementEncoding>,
    /// Raw `key=value` replacements merged into a Grid header before typed
    /// extraction.
    pub header_overrides: HashMap<String, String>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: ElementEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Replaces (or injects) the raw value of a Grid header key.
    pub fn with_override(mut self, key: impl Into<String>, raw_value: impl Into<String>) -> Self {
        self.header_overrides.insert(key.into(), raw_value.into());
        self
    }
}

/// Output of a dialect pipeline before it is wrapped in a `DecodedFile`.
#[derive(Debug)]
pub struct Decoded {
    pub header: Header,
    pub signals: Signals,
    pub warnings: Vec<DecodeWarning>,
}
