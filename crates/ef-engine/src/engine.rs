//! The equilibrium engine boundary.

use crate::condition::{BatchRequest, Condition};
use crate::constituents::{ConstituentDescription, Sublattice};
use crate::error::EngineResult;
use crate::status::{GridMinimizer, PhaseSelector, PhaseStatus};
use ef_core::{ComponentIndex, PhaseIndex, RecordHandle};
use std::path::Path;

/// What `load_database` hands back: the default record and component order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDatabase {
    pub record: RecordHandle,
    /// Components in engine order (alphabetical, independent of request order).
    pub components: Vec<String>,
}

/// Trait for external equilibrium engines.
///
/// Every call names the record it acts on; there is no implicit "selected"
/// record on this side of the boundary. Engines are process-wide mutable
/// state, so mutation takes `&mut self` and callers serialize access.
///
/// Numerical failures raise the engine's error flag instead of returning
/// `Err`; the flag stays raised until `clear_error` is called and must be
/// observed after every call (the session does this in one place).
pub trait EquilibriumEngine {
    /// Engine name (for logging).
    fn name(&self) -> &str;

    /// Read a database restricted to `components` and create the default record.
    fn load_database(
        &mut self,
        path: &Path,
        components: &[&str],
    ) -> EngineResult<LoadedDatabase>;

    /// Set (or unset) one condition on a record.
    fn set_condition(&mut self, record: RecordHandle, condition: Condition) -> EngineResult<()>;

    /// Change the status of the selected phases.
    fn set_phase_status(
        &mut self,
        record: RecordHandle,
        selector: &PhaseSelector,
        status: PhaseStatus,
    ) -> EngineResult<()>;

    /// Compute the equilibrium for the record's current conditions.
    fn solve(&mut self, record: RecordHandle, grid: GridMinimizer) -> EngineResult<()>;

    /// Evaluate a batch of equilibria, one scalar per point.
    ///
    /// Points that fail come back as NaN; the request is otherwise passed
    /// through unchanged.
    fn solve_batch(&mut self, record: RecordHandle, request: &BatchRequest)
    -> EngineResult<Vec<f64>>;

    /// Scalar result such as `G`, `H`, or the solved `T`.
    fn scalar(&self, record: RecordHandle, symbol: &str) -> EngineResult<f64>;

    /// Component-associated result such as `MU` or `X`.
    fn component_value(
        &self,
        record: RecordHandle,
        symbol: &str,
        component: ComponentIndex,
    ) -> EngineResult<f64>;

    /// Number of phases (including composition sets) currently defined.
    fn phase_count(&self, record: RecordHandle) -> EngineResult<usize>;

    /// Phase-associated result such as `NP`.
    fn phase_value(
        &self,
        record: RecordHandle,
        symbol: &str,
        phase: PhaseIndex,
    ) -> EngineResult<f64>;

    /// Name of the phase at `phase` (composition sets carry `#n` suffixes).
    fn phase_name(&self, record: RecordHandle, phase: PhaseIndex) -> EngineResult<String>;

    /// Mole fractions of every component in one phase, in component order.
    fn phase_composition(&self, record: RecordHandle, phase: PhaseIndex)
    -> EngineResult<Vec<f64>>;

    /// Sublattices of one phase: site counts and constituent site fractions.
    fn phase_sublattices(
        &self,
        record: RecordHandle,
        phase: PhaseIndex,
    ) -> EngineResult<Vec<Sublattice>>;

    /// Mass, charge and element stoichiometry of one constituent species.
    fn constituent(&self, record: RecordHandle, name: &str)
    -> EngineResult<ConstituentDescription>;

    /// Measure the chemical potential of `component` relative to pure
    /// `phase` at the record's temperature and pressure. `None` restores the
    /// database reference state.
    fn set_reference_phase(
        &mut self,
        record: RecordHandle,
        component: ComponentIndex,
        phase: Option<&str>,
    ) -> EngineResult<()>;

    /// Status and driving force of one phase.
    fn phase_status(
        &self,
        record: RecordHandle,
        phase: PhaseIndex,
    ) -> EngineResult<(PhaseStatus, f64)>;

    /// Copy `source` into a new record called `engine_name`.
    fn clone_record(&mut self, source: RecordHandle, engine_name: &str)
    -> EngineResult<RecordHandle>;

    /// Release a record; its handle becomes invalid.
    fn delete_record(&mut self, record: RecordHandle) -> EngineResult<()>;

    /// Current value of the global error flag (0 means no error).
    fn last_error_code(&self) -> i32;

    /// Reset the global error flag.
    fn clear_error(&mut self);

    /// Suppress the engine's own console output.
    fn set_quiet(&mut self, _quiet: bool) {}
}
