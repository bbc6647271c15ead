//! File format parsing layer for Nanonis files.
//!
//! This module provides the layer between raw file I/O and
//! [`DecodedFile`](crate::nanonis::reader::DecodedFile).
//!
//! # Module Organization
//!
//! - [`locator`]: Finds the end tag and splits the header from the payload
//! - [`grid`]: `.3ds` header grammar, payload reshape, sweep axis and topography
//! - [`scan`]: `.sxm` header grammar and forward/backward image reshape
//! - [`spec`]: `.dat` header grammar and ASCII column table
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌─────────────────┐
//! │  Text Header    │ ← {grid,scan,spec}::parse_header()
//! ├─────────────────┤
//! │  End Tag        │ ← locator::locate()
//! ├─────────────────┤
//! │  Payload        │ ← {grid,scan,spec}::decode_payload()
//! │  (binary or     │
//! │   ASCII)        │
//! └─────────────────┘
//! ```

use std::io::{Read, Seek, SeekFrom};

use log::warn;

use crate::nanonis::types::error::Result;
use crate::nanonis::types::filetypes::FileKind;
use crate::nanonis::types::models::{DecodeWarning, Signal, Signals};

pub mod grid;
pub mod locator;
pub mod scan;
pub mod spec;

/// Reads every byte from `offset` to the end of the file.
pub(crate) fn read_payload<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    Ok(payload)
}

/// Inserts a signal, recording a warning when it replaces one of the same name.
pub(crate) fn insert_signal(
    signals: &mut Signals,
    warnings: &mut Vec<DecodeWarning>,
    kind: FileKind,
    name: String,
    signal: Signal,
) {
    if signals.contains_key(&name) {
        warn!("{} signal {:?} appears twice, keeping the later one", kind, name);
        warnings.push(DecodeWarning::DuplicateSignal { name: name.clone() });
    }
    signals.insert(name, signal);
}
