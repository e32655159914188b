//! Session errors.

use ef_core::EfError;
use ef_engine::EngineError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the equilibrium session and its constraint layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Component name not among the components loaded with the database.
    #[error("Unknown component: {name}")]
    UnknownComponent { name: String },

    /// A record with this name is already registered.
    #[error("Equilibrium record already exists: {name}")]
    DuplicateName { name: String },

    /// No record registered under this name (never created or deleted).
    #[error("Unknown equilibrium record: {name}")]
    UnknownRecord { name: String },

    /// The default record only goes away with `release_all`.
    #[error("Equilibrium record {name} cannot be deleted on its own")]
    ProtectedRecord { name: String },

    /// Phase name not present in the database or current result.
    #[error("Unknown phase: {name}")]
    UnknownPhase { name: String },

    /// Fraction constraint addressed to the balance component.
    #[error("Component {component} is the balance component and takes no fraction constraint")]
    BalanceComponentConstraint { component: String },

    /// More than one component marked as balance in a composition.
    #[error("Composition marks more than one balance component: {first} and {second}")]
    AmbiguousBalance { first: String, second: String },

    /// New fraction constraint beyond N-1 for N components.
    #[error("At most {max} independent fraction constraints are allowed")]
    TooManyFractions { max: usize },

    /// Fraction outside [0, 1] or not finite.
    #[error("Invalid fraction {value} for component {component}")]
    InvalidFraction { component: String, value: f64 },

    /// The engine raised its error flag; the flag has been cleared.
    #[error("Equilibrium calculation failed (engine error code {code})")]
    SolveFailure { code: i32 },

    /// A constraint set stopped part way; earlier items stay applied.
    #[error("Constraint application stopped after {applied} item(s): {source}")]
    ConstraintApply {
        applied: usize,
        #[source]
        source: Box<SessionError>,
    },

    #[error(transparent)]
    Engine(EngineError),

    #[error(transparent)]
    Core(#[from] EfError),
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownPhase { name } => SessionError::UnknownPhase { name },
            EngineError::Core(core) => SessionError::Core(core),
            other => SessionError::Engine(other),
        }
    }
}

impl SessionError {
    /// True when the error came from the engine's numerical failure flag.
    pub fn is_solve_failure(&self) -> bool {
        matches!(self, SessionError::SolveFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_phase_maps_to_session_variant() {
        let err: SessionError = EngineError::UnknownPhase {
            name: "SIGMA".into(),
        }
        .into();
        assert_eq!(
            err,
            SessionError::UnknownPhase {
                name: "SIGMA".into()
            }
        );
    }

    #[test]
    fn constraint_apply_keeps_source() {
        let err = SessionError::ConstraintApply {
            applied: 2,
            source: Box::new(SessionError::TooManyFractions { max: 2 }),
        };
        let text = err.to_string();
        assert!(text.contains("2 item"));
        assert!(text.contains("At most 2"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn solve_failure_flag() {
        assert!(SessionError::SolveFailure { code: 4001 }.is_solve_failure());
        assert!(!SessionError::TooManyFractions { max: 1 }.is_solve_failure());
    }
}
