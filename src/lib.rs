//
// lib.rs
// Lab-Deidentify-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - October 2026

// Public surface of the library: the transform, its storage and I/O helpers, and the CLI/web front ends.
pub mod anonymize;
pub mod batch;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod mapping;
pub mod models;
pub mod storage;
pub mod surrogate;
pub mod web;

pub use anonymize::{deidentify_records, DeidentifyOptions, Deidentifier};
pub use cli::{run as run_cli, Cli, Commands};
pub use error::DeidentifyError;
pub use mapping::{MappingTable, Mappings};
pub use models::LabRecord;
