//! Foundational data structures, error types, and the format registry.

pub mod error;
pub mod filetypes;
pub mod models;
