//! Custom error types for the nanonis-reader crate.

use thiserror::Error;

use super::filetypes::FileKind;

/// Appended to Grid header errors: those files can be patched by the caller.
pub(crate) const OVERRIDE_HINT: &str =
    " (supply a replacement with DecodeOptions::with_override to patch the header)";

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum NanonisError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The file suffix is not one of `.3ds`, `.sxm` or `.dat`.
    #[error("Unsupported file kind: {0} is not a .3ds, .sxm or .dat file")]
    UnsupportedFileKind(String),

    /// A specific dialect was requested but the suffix names another one.
    #[error("{path} is a {found} file, not a {expected} file")]
    KindMismatch {
        path: String,
        expected: FileKind,
        found: FileKind,
    },

    /// The end-of-header tag never appeared in the file.
    #[error("Could not find the {tag} end tag of the {kind} header")]
    HeaderNotFound { kind: FileKind, tag: &'static str },

    /// A header key required to decode the payload is absent.
    #[error("Missing {kind} header key `{key}`{hint}")]
    MissingHeaderKey {
        kind: FileKind,
        key: String,
        hint: &'static str,
    },

    /// A header value does not have the shape or type its key requires.
    #[error("Malformed {kind} header value for `{key}`: expected {expected}, found {value:?}{hint}")]
    MalformedHeaderValue {
        kind: FileKind,
        key: String,
        value: String,
        expected: &'static str,
        hint: &'static str,
    },

    /// The declared geometry disagrees with the number of payload elements.
    #[error("Payload size mismatch: expected {expected} elements, found {actual} (+{trailing_bytes} trailing bytes)")]
    PayloadSizeMismatch {
        expected: usize,
        actual: usize,
        trailing_bytes: usize,
    },

    /// A data row has a different number of columns than the column header.
    #[error("Column count mismatch on line {line}: expected {expected} columns, found {found}")]
    ColumnCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A data row holds a token that is not a number.
    #[error("Malformed data on line {line}: {token:?} is not a number")]
    MalformedData { line: usize, token: String },

    /// A derived field needs a parameter the parameter block does not carry.
    #[error("Cannot derive {field}: parameter index {index} is out of range for {available} parameters")]
    ParameterOutOfRange {
        field: &'static str,
        index: usize,
        available: usize,
    },
}

impl NanonisError {
    pub(crate) fn missing_key(kind: FileKind, key: impl Into<String>) -> Self {
        NanonisError::MissingHeaderKey {
            kind,
            key: key.into(),
            hint: hint_for(kind),
        }
    }

    pub(crate) fn malformed(
        kind: FileKind,
        key: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        NanonisError::MalformedHeaderValue {
            kind,
            key: key.into(),
            value: value.into(),
            expected,
            hint: hint_for(kind),
        }
    }
}

fn hint_for(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Grid => OVERRIDE_HINT,
        FileKind::Scan | FileKind::Spec => "",
    }
}

/// A convenience `Result` type alias using the crate's `NanonisError` type.
pub type Result<T> = std::result::Result<T, NanonisError>;
