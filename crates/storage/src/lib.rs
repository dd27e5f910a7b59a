//! Storage layer: the persisted classification report.
//!
//! Holds the report schema, the append-only writer and the readers used for
//! resuming a previous run.

use thiserror::Error;

pub mod report;

pub use report::{append_rows, read_file_column, read_rows, ReportRow, HEADERS};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}
