//! Engine boundary errors.

use ef_core::{EfError, RecordHandle};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine boundary calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Misuse of the engine boundary.
///
/// Numerical failures (non-convergence, no stable phase) are not reported
/// here: like native engines, implementations raise the global error flag
/// read through `EquilibriumEngine::last_error_code`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Handle not known to the engine (never created or already deleted).
    #[error("Unknown equilibrium record handle {handle}")]
    UnknownRecord { handle: RecordHandle },

    /// Engine-side record name already in use.
    #[error("Equilibrium record name already in use: {name}")]
    DuplicateRecord { name: String },

    /// Component index outside the loaded component list.
    #[error("Component index {index} out of range ({len} components)")]
    ComponentOob { index: usize, len: usize },

    /// Phase index outside the current phase list.
    #[error("Phase index {index} out of range ({len} phases)")]
    PhaseOob { index: usize, len: usize },

    /// Phase name not defined in the database.
    #[error("Unknown phase: {name}")]
    UnknownPhase { name: String },

    /// Constituent species not present in the loaded system.
    #[error("Unknown constituent: {name}")]
    UnknownConstituent { name: String },

    /// Result symbol the engine does not provide.
    #[error("Unknown result symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    /// Results requested before the record was ever solved.
    #[error("Equilibrium record {handle} has no solved state")]
    NotSolved { handle: RecordHandle },

    /// Database could not be read or does not contain the requested elements.
    #[error("Database error for {path}: {message}")]
    Database { path: PathBuf, message: String },

    /// Malformed batch request.
    #[error("Invalid batch request: {what}")]
    InvalidBatch { what: String },

    /// Invalid numeric argument.
    #[error(transparent)]
    Core(#[from] EfError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EngineError::UnknownPhase {
            name: "SIGMA".into(),
        };
        assert!(err.to_string().contains("SIGMA"));

        let err = EngineError::UnknownRecord {
            handle: RecordHandle::from_index(3),
        };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn core_error_converts() {
        let err: EngineError = ef_core::ensure_finite(f64::NAN, "temperature")
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::Core(_)));
    }
}
