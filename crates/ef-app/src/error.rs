//! Error types for the ef-app service layer.

use std::path::PathBuf;

/// Application error type wrapping the backend crates' errors for front ends.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Failed to read database file: {path}")]
    DatabaseFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid database {path}: {message}")]
    Database { path: PathBuf, message: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Sweep error: {0}")]
    Sweep(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Key not found in run: {0}")]
    KeyNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ef-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ef_project::ProjectError> for AppError {
    fn from(err: ef_project::ProjectError) -> Self {
        AppError::Scenario(err.to_string())
    }
}

impl From<ef_session::SessionError> for AppError {
    fn from(err: ef_session::SessionError) -> Self {
        AppError::Session(err.to_string())
    }
}

impl From<ef_sweep::SweepError> for AppError {
    fn from(err: ef_sweep::SweepError) -> Self {
        AppError::Sweep(err.to_string())
    }
}

impl From<ef_results::ResultsError> for AppError {
    fn from(err: ef_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}
