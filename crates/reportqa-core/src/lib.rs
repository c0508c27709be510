//! Core building blocks for answering questions over an analytics report.
//!
//! Domain types and capability traits shared by the other crates live here,
//! together with configuration, the report model and the chunker.

pub mod chunker;
pub mod config;
pub mod error;
pub mod report;
pub mod traits;
pub mod types;

pub use error::{Error, GenerationError, Result};
