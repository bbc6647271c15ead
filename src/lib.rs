//! # nanonis-reader
//!
//! A reader for Nanonis scanning-probe microscopy files:
//! grid spectroscopy (`.3ds`), scan images (`.sxm`) and point
//! spectroscopy (`.dat`).
//!
//! Each file is a text header followed by a payload whose layout the header
//! fully determines. [`DecodedFile`] locates the header end, parses the
//! dialect's header grammar and reshapes the payload into named arrays.
//!
//! ```no_run
//! use nanonis_reader::DecodedFile;
//!
//! let grid = DecodedFile::open("grid001.3ds")?;
//! let bias = grid.trace("sweep_signal").expect("grids carry a sweep axis");
//! let current = grid.volume("Input 3 (A)").expect("channel from the header");
//! println!("{} sweep points, cube {:?}", bias.len(), current.shape());
//! # Ok::<(), nanonis_reader::NanonisError>(())
//! ```
pub mod nanonis;

// Re-export the main types for convenience
pub use nanonis::{
    DecodedFile,
    NanonisError,
    Result,
    format::locator::{locate, locate_bytes, HeaderLocation},
    types::{
        filetypes::{ElementEncoding, FileFormat, FileKind, Grid, Scan, Spec},
        models::{
            DecodeOptions,
            DecodeWarning,
            Header,
            HeaderValue,
            ScanChannel,
            Signal,
            Signals,
            Table,
        },
    },
};
