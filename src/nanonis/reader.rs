use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::{Array1, Array2, Array3};

use super::format::locator;
use super::types::error::{NanonisError, Result};
use super::types::filetypes::{FileFormat, FileKind, Grid, Scan, Spec};
use super::types::models::*;
use super::utils;

/// A fully decoded Nanonis file.
///
/// Built once from a path (or an in-memory source) and immutable afterwards.
/// The file handle is released before the constructor returns, on success
/// and on every error.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    path: Option<PathBuf>,
    kind: FileKind,
    byte_offset: u64,
    raw_header: String,
    header: Header,
    signals: Signals,
    warnings: Vec<DecodeWarning>,
}

impl DecodedFile {
    /// Decodes the file at `path` with default options.
    ///
    /// The dialect is chosen from the suffix: `.3ds` (grid), `.sxm` (scan) or
    /// `.dat` (point spectroscopy).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &DecodeOptions::default())
    }

    /// Decodes the file at `path`.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The suffix is not a supported kind
    /// - The file cannot be read
    /// - The end tag is missing
    /// - A required header field is missing or malformed
    /// - The payload does not match the geometry the header declares
    pub fn open_with(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        let kind = FileKind::from_path(path)?;
        Self::open_kind(path, kind, options)
    }

    /// Decodes the file at `path` as dialect `F`, rejecting any other suffix.
    pub fn open_as<F: FileFormat>(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        let found = FileKind::from_path(path)?;
        if found != F::KIND {
            return Err(NanonisError::KindMismatch {
                path: path.display().to_string(),
                expected: F::KIND,
                found,
            });
        }
        Self::open_kind(path, found, options)
    }

    fn open_kind(path: &Path, kind: FileKind, options: &DecodeOptions) -> Result<Self> {
        info!("Opening Nanonis {} file: {}", kind, path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut decoded = Self::from_reader(&mut reader, kind, options)?;
        decoded.path = Some(path.to_path_buf());
        Ok(decoded)
    }

    /// Decodes a file held by any seekable reader.
    pub fn from_reader<R: BufRead + Seek>(
        reader: &mut R,
        kind: FileKind,
        options: &DecodeOptions,
    ) -> Result<Self> {
        match kind {
            FileKind::Grid => Self::decode::<Grid, R>(reader, options),
            FileKind::Scan => Self::decode::<Scan, R>(reader, options),
            FileKind::Spec => Self::decode::<Spec, R>(reader, options),
        }
    }

    fn decode<F: FileFormat, R: BufRead + Seek>(
        reader: &mut R,
        options: &DecodeOptions,
    ) -> Result<Self> {
        if F::KIND != FileKind::Grid && !options.header_overrides.is_empty() {
            warn!(
                "Ignoring {} header overrides: only grid headers can be patched",
                options.header_overrides.len()
            );
        }

        reader.seek(SeekFrom::Start(0))?;
        let location = locator::locate(reader, F::KIND)?;
        let Decoded {
            header,
            signals,
            warnings: decode_warnings,
        } = F::decode(reader, &location, options)?;
        let (raw_header, _) = utils::decode_lossy(&location.raw_header);
        let mut warnings = location.warnings;
        warnings.extend(decode_warnings);

        Ok(Self {
            path: None,
            kind: F::KIND,
            byte_offset: location.byte_offset,
            raw_header,
            header,
            signals,
            warnings,
        })
    }

    /// The path this file was opened from, if it came from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Size of the header in bytes; the payload starts here.
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// The header as it appears in the file, before parsing.
    pub fn raw_header(&self) -> &str {
        &self.raw_header
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Every decoded signal, keyed by name.
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    pub fn trace(&self, name: &str) -> Option<&Array1<f64>> {
        self.signal(name).and_then(Signal::as_trace)
    }

    pub fn image(&self, name: &str) -> Option<&Array2<f64>> {
        self.signal(name).and_then(Signal::as_image)
    }

    pub fn volume(&self, name: &str) -> Option<&Array3<f64>> {
        self.signal(name).and_then(Signal::as_volume)
    }

    pub fn scan_channel(&self, name: &str) -> Option<&ScanChannel> {
        self.signal(name).and_then(Signal::as_scan)
    }

    /// Non-fatal findings, such as header lines that were not valid UTF-8.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Consumes the file, returning its header and signals.
    pub fn into_parts(self) -> (Header, Signals) {
        (self.header, self.signals)
    }
}
