//! # Header Locator
//!
//! Finds the header/payload boundary of a file by scanning raw lines for the
//! kind's end tag. Lines are decoded leniently: bytes that are not UTF-8 are
//! replaced and recorded as a [`DecodeWarning`], never treated as fatal.

use std::io::{BufRead, Cursor, Read};

use log::{debug, trace, warn};

use crate::nanonis::types::error::{NanonisError, Result};
use crate::nanonis::types::filetypes::FileKind;
use crate::nanonis::types::models::DecodeWarning;
use crate::nanonis::utils;

/// Where a header ends and what it contains.
#[derive(Debug, Clone)]
pub struct HeaderLocation {
    pub kind: FileKind,
    /// Offset of the first payload byte, including the kind's payload skip.
    pub byte_offset: u64,
    /// Every byte strictly before `byte_offset`.
    pub raw_header: Vec<u8>,
    /// Zero-based index of the line holding the end tag.
    pub tag_line: usize,
    pub warnings: Vec<DecodeWarning>,
}

/// Scans `reader` from its current position for the end tag of `kind`.
///
/// The reader is left positioned at `byte_offset`.
pub fn locate<R: BufRead>(reader: &mut R, kind: FileKind) -> Result<HeaderLocation> {
    let tag = kind.end_tag();
    let mut raw_header = Vec::new();
    let mut warnings = Vec::new();
    let mut line = Vec::new();
    let mut line_index = 0usize;

    loop {
        let line_start = raw_header.len() as u64;
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            return Err(NanonisError::HeaderNotFound { kind, tag });
        }
        raw_header.extend_from_slice(&line);

        let (entry, had_errors) = utils::decode_lossy(utils::trim_line_end(&line));
        if had_errors {
            warn!(
                "Header line {} of {} file is not valid UTF-8, replacing invalid bytes",
                line_index + 1,
                kind
            );
            warnings.push(DecodeWarning::InvalidUtf8 {
                line: line_index + 1,
                byte_offset: line_start,
            });
        }

        if entry.contains(tag) {
            trace!("Found {} on line {}", tag, line_index + 1);
            break;
        }
        line_index += 1;
    }

    let skip = kind.payload_skip();
    if skip > 0 {
        reader.by_ref().take(skip).read_to_end(&mut raw_header)?;
    }
    let byte_offset = raw_header.len() as u64;
    debug!(
        "{} header ends at byte {} (line {}, {} warnings)",
        kind,
        byte_offset,
        line_index + 1,
        warnings.len()
    );

    Ok(HeaderLocation {
        kind,
        byte_offset,
        raw_header,
        tag_line: line_index,
        warnings,
    })
}

/// [`locate`] over an in-memory file.
pub fn locate_bytes(bytes: &[u8], kind: FileKind) -> Result<HeaderLocation> {
    locate(&mut Cursor::new(bytes), kind)
}
