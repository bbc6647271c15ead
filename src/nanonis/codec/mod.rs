//! Codec layer for payload element decoding.
//!
//! # Submodules
//!
//! - [`elements`][]: Flat float arrays in the four supported byte orders and widths

pub mod elements;
