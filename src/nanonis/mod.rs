//! Core Nanonis reader module

pub mod codec;
pub mod format;
pub mod reader;
pub mod types;
mod utils;

pub use reader::DecodedFile;
pub use types::error::{NanonisError, Result};
