//! ef-results: run cache and step-record storage.

pub mod export;
pub mod hash;
pub mod store;
pub mod types;

pub use export::{batch_labels, batch_to_csv, records_to_csv, table_to_csv};
pub use hash::compute_run_id;
pub use store::{RunStore, timestamp_now};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Run {run_id} is inconsistent: {message}")]
    InvalidRun { run_id: String, message: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}
