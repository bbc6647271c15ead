//! Format registry: suffixes, end tags and element encodings of the three
//! Nanonis dialects.

use std::fmt;
use std::io::{BufRead, Seek};
use std::path::Path;
use std::str::FromStr;

use super::error::{NanonisError, Result};
use super::models::{DecodeOptions, Decoded};
use crate::nanonis::format::{self, locator::HeaderLocation};

/// The dialect of a Nanonis file, decided by its suffix alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Binary grid spectroscopy (`.3ds`).
    Grid,
    /// Binary raster scan (`.sxm`).
    Scan,
    /// Text point spectroscopy (`.dat`).
    Spec,
}

impl FileKind {
    /// Every kind, in registry order.
    pub const ALL: [FileKind; 3] = [FileKind::Grid, FileKind::Scan, FileKind::Spec];

    /// Maps a suffix (`.3ds`, `.sxm`, `.dat`, leading dot optional) to its kind.
    pub fn from_suffix(suffix: &str) -> Result<Self> {
        let bare = suffix.strip_prefix('.').unwrap_or(suffix);
        FileKind::ALL
            .into_iter()
            .find(|kind| kind.suffix() == bare)
            .ok_or_else(|| NanonisError::UnsupportedFileKind(suffix.to_string()))
    }

    /// Maps a path to its kind through the path's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| NanonisError::UnsupportedFileKind(path.display().to_string()))
            .and_then(|ext| {
                FileKind::from_suffix(ext)
                    .map_err(|_| NanonisError::UnsupportedFileKind(path.display().to_string()))
            })
    }

    /// The file extension, without the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            FileKind::Grid => "3ds",
            FileKind::Scan => "sxm",
            FileKind::Spec => "dat",
        }
    }

    /// The text whose line marks the end of the header.
    pub fn end_tag(self) -> &'static str {
        match self {
            FileKind::Grid => ":HEADER_END:",
            FileKind::Scan => ":SCANIT_END:",
            FileKind::Spec => "[DATA]",
        }
    }

    /// Bytes between the end-tag line and the first payload element.
    ///
    /// Scan files put a two byte `\x1A\x04` marker there.
    pub fn payload_skip(self) -> u64 {
        match self {
            FileKind::Scan => 2,
            FileKind::Grid | FileKind::Spec => 0,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileKind::Grid => write!(f, "grid"),
            FileKind::Scan => write!(f, "scan"),
            FileKind::Spec => write!(f, "spec"),
        }
    }
}

/// Element encodings a binary payload may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementEncoding {
    #[default]
    BigEndianF32,
    LittleEndianF32,
    BigEndianF64,
    LittleEndianF64,
}

impl ElementEncoding {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementEncoding::BigEndianF32 | ElementEncoding::LittleEndianF32 => 4,
            ElementEncoding::BigEndianF64 | ElementEncoding::LittleEndianF64 => 8,
        }
    }

    /// The vendor label for this encoding.
    pub fn label(self) -> &'static str {
        match self {
            ElementEncoding::BigEndianF32 => "big endian float 32",
            ElementEncoding::LittleEndianF32 => "little endian float 32",
            ElementEncoding::BigEndianF64 => "big endian float 64",
            ElementEncoding::LittleEndianF64 => "little endian float 64",
        }
    }

    /// Reads the `:SCANIT_TYPE:` declaration of a scan header.
    pub fn from_scanit_type(value: &str) -> Option<Self> {
        let mut tokens = value.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some("FLOAT"), Some("MSBFIRST")) => Some(ElementEncoding::BigEndianF32),
            (Some("FLOAT"), Some("LSBFIRST")) => Some(ElementEncoding::LittleEndianF32),
            _ => None,
        }
    }
}

impl FromStr for ElementEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        [
            ElementEncoding::BigEndianF32,
            ElementEncoding::LittleEndianF32,
            ElementEncoding::BigEndianF64,
            ElementEncoding::LittleEndianF64,
        ]
        .into_iter()
        .find(|encoding| encoding.label().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("Unknown element encoding: {}", s))
    }
}

impl fmt::Display for ElementEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A trait that ties a dialect marker to its kind and its decoding pipeline.
pub trait FileFormat {
    /// The kind this marker stands for.
    const KIND: FileKind;

    /// Parses the header and decodes the payload of a located file.
    fn decode<R: BufRead + Seek>(
        reader: &mut R,
        location: &HeaderLocation,
        options: &DecodeOptions,
    ) -> Result<Decoded>;
}

/// Zero-cost marker struct for grid spectroscopy files.
#[derive(Debug)]
pub struct Grid;

impl FileFormat for Grid {
    const KIND: FileKind = FileKind::Grid;

    fn decode<R: BufRead + Seek>(
        reader: &mut R,
        location: &HeaderLocation,
        options: &DecodeOptions,
    ) -> Result<Decoded> {
        format::grid::decode(reader, location, options)
    }
}

/// Zero-cost marker struct for scan files.
#[derive(Debug)]
pub struct Scan;

impl FileFormat for Scan {
    const KIND: FileKind = FileKind::Scan;

    fn decode<R: BufRead + Seek>(
        reader: &mut R,
        location: &HeaderLocation,
        options: &DecodeOptions,
    ) -> Result<Decoded> {
        format::scan::decode(reader, location, options)
    }
}

/// Zero-cost marker struct for point spectroscopy files.
#[derive(Debug)]
pub struct Spec;

impl FileFormat for Spec {
    const KIND: FileKind = FileKind::Spec;

    fn decode<R: BufRead + Seek>(
        reader: &mut R,
        location: &HeaderLocation,
        options: &DecodeOptions,
    ) -> Result<Decoded> {
        format::spec::decode(reader, location, options)
    }
}
