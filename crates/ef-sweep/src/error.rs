//! Sweep errors.

use ef_session::SessionError;
use thiserror::Error;

/// Result type for sweep operations.
pub type SweepResult<T> = Result<T, SweepError>;

/// Errors that abort a sweep.
///
/// A failing equilibrium at one step does not abort anything: the step is
/// recorded as failed and the sweep moves on. These errors cover bad input and
/// failures outside the per-step solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    /// Invalid grid or options.
    #[error("Invalid sweep configuration: {0}")]
    InvalidConfiguration(String),

    /// Session error outside a per-step solve.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
