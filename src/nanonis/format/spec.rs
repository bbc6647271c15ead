//! # Spec (`.dat`) Dialect
//!
//! Point spectroscopy files are plain text. The header is CRLF-separated
//! `key<TAB>value<TAB>` lines, then a blank line and `[DATA]`. The line after
//! `[DATA]` names the columns and every further line is one row of numbers.

use std::io::{BufRead, Seek, SeekFrom};

use log::{debug, info, trace};
use ndarray::Array1;

use super::locator::HeaderLocation;
use crate::nanonis::types::error::{NanonisError, Result};
use crate::nanonis::types::filetypes::FileKind;
use crate::nanonis::types::models::{DecodeOptions, Decoded, Header, HeaderValue, Signal, Signals};
use crate::nanonis::utils;

const KIND: FileKind = FileKind::Spec;

/// The blank line before `[DATA]`, the `[DATA]` line and the empty entry after it.
const TRAILING_ENTRIES: usize = 3;

/// Lines before the first data row: everything up to the end tag, the tag
/// itself and the column names.
pub fn header_line_count(tag_line: usize) -> usize {
    tag_line + 2
}

/// Parses a point spectroscopy header into text values.
pub fn parse_header(raw: &[u8]) -> Header {
    let (text, _) = utils::decode_lossy(raw);
    let mut header = Header::new(KIND);
    for entry in utils::header_entries(&text, "\r\n", TRAILING_ENTRIES) {
        if entry.is_empty() {
            continue;
        }
        let entry = entry.strip_suffix('\t').unwrap_or(entry);
        let (key, value) = entry.split_once('\t').unwrap_or((entry, ""));
        trace!("Spec header entry {:?} = {:?}", key, value);
        header.insert(key, HeaderValue::Text(value.to_string()));
    }
    header
}

/// A decoded column table.
#[derive(Debug, Clone)]
pub struct SpecTable {
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

/// Reads the column-name line and the numeric rows after it.
///
/// `first_line` is the 1-based file line number of the column-name line; it
/// is used only for error messages.
pub fn decode_table<R: BufRead>(reader: &mut R, first_line: usize) -> Result<SpecTable> {
    let mut lines = reader.split(b'\n');

    let names: Vec<String> = match lines.next() {
        Some(line) => {
            let (text, _) = utils::decode_lossy(utils::trim_line_end(&line?));
            if text.is_empty() {
                Vec::new()
            } else {
                text.split('\t').map(str::to_string).collect()
            }
        }
        None => Vec::new(),
    };
    let mut columns = vec![Vec::new(); names.len()];

    for (index, line) in lines.enumerate() {
        let line_number = first_line + index + 1;
        let (text, _) = utils::decode_lossy(&line?);
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() != names.len() {
            return Err(NanonisError::ColumnCountMismatch {
                line: line_number,
                expected: names.len(),
                found: tokens.len(),
            });
        }
        for (column, token) in columns.iter_mut().zip(&tokens) {
            let value = token.parse().map_err(|_| NanonisError::MalformedData {
                line: line_number,
                token: token.to_string(),
            })?;
            column.push(value);
        }
    }

    Ok(SpecTable { names, columns })
}

/// Runs the point spectroscopy pipeline on a located file.
pub fn decode<R: BufRead + Seek>(
    reader: &mut R,
    location: &HeaderLocation,
    _options: &DecodeOptions,
) -> Result<Decoded> {
    let header = parse_header(&location.raw_header);

    let header_lines = header_line_count(location.tag_line);
    debug!("Spec data starts after {} header lines", header_lines);
    reader.seek(SeekFrom::Start(location.byte_offset))?;
    let table = decode_table(reader, header_lines)?;

    let rows = table.columns.first().map_or(0, Vec::len);
    let mut signals = Signals::new();
    let mut warnings = Vec::new();
    for (name, column) in table.names.into_iter().zip(table.columns) {
        let signal = Signal::Trace(Array1::from_vec(column));
        super::insert_signal(&mut signals, &mut warnings, KIND, name, signal);
    }
    info!("Decoded spec with {} columns x {} rows", signals.len(), rows);
    Ok(Decoded {
        header,
        signals,
        warnings,
    })
}
