//
// error.rs
// Lab-Deidentify-rs
//
// Error type shared by the reading, transformation, and writing stages of a run.
//
// Thales Matheus Mendonça Santos - October 2026

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeidentifyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path:?} is not valid {encoding} text")]
    Encoding {
        encoding: &'static str,
        path: PathBuf,
    },

    #[error("unknown text encoding label: {0}")]
    UnknownEncoding(String),

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

pub type Result<T> = std::result::Result<T, DeidentifyError>;
