//! ef-session: stateful equilibrium sessions over an `EquilibriumEngine`.
//!
//! A session owns the engine, the ordered component list and a table of named
//! equilibrium records. Constraint setters, solves and result queries act on
//! the active record through its explicit handle; the engine never holds a
//! hidden "current" record for us.
//!
//! Every engine call passes through one guard that observes and clears the
//! engine's global error flag.

pub mod boundary;
pub mod compact;
pub mod constraints;
pub mod error;
pub mod results;
pub mod session;
pub mod values;

pub use boundary::{LIQUID, MeltingRange};
pub use compact::CompactRequest;
pub use constraints::{CompositionSpec, ConstraintItem, ConstraintSet, FractionSpec};
pub use error::{SessionError, SessionResult};
pub use session::{BalancePolicy, DEFAULT_RECORD, PhaseStatusReport, Session, SessionConfig};
pub use values::NamedValues;
