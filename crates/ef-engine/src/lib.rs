//! ef-engine: the boundary to an external equilibrium (Gibbs-energy) engine.
//!
//! Provides:
//! - `EquilibriumEngine` trait: the narrow, handle-based interface every
//!   backend implements (load, conditions, phase status, solve, batch, queries)
//! - sublattice and constituent descriptions of solved phases
//! - status and condition vocabulary shared by the session and sweep crates
//! - component ordering and composition-set name helpers
//! - `SurrogateEngine`: a deterministic in-process engine for tests and demos
//!
//! # Architecture
//!
//! The rest of equiflow only talks to the trait. A native CALPHAD library is
//! wrapped by implementing `EquilibriumEngine` over its FFI; the surrogate
//! implements the same contract (including the global error flag) without any
//! thermodynamic modelling worth the name.
//!
//! # Example
//!
//! ```no_run
//! use ef_engine::{EquilibriumEngine, GridMinimizer, SurrogateEngine};
//!
//! let mut engine = SurrogateEngine::new();
//! let loaded = engine
//!     .load_database("alloy.yaml".as_ref(), &["FE", "C", "CR"])
//!     .unwrap();
//! engine.solve(loaded.record, GridMinimizer::On).unwrap();
//! assert_eq!(engine.last_error_code(), 0);
//! ```

pub mod components;
pub mod condition;
pub mod constituents;
pub mod engine;
pub mod error;
pub mod status;
pub mod surrogate;
pub mod symbols;

// Re-exports for ergonomics
pub use components::{PhaseName, engine_record_name, sorted_components};
pub use condition::{BatchAxis, BatchRequest, Condition};
pub use constituents::{ConstituentDescription, Sublattice, VACANCY};
pub use engine::{EquilibriumEngine, LoadedDatabase};
pub use error::{EngineError, EngineResult};
pub use status::{FractionKind, GridMinimizer, PhaseSelector, PhaseStatus};
pub use surrogate::{
    SplitSpec, SurrogateDatabase, SurrogateElement, SurrogateEngine, SurrogatePhase,
    SurrogateSublattice,
};
