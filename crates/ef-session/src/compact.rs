//! Single-shot equilibrium: set every condition, then solve.

use crate::constraints::{CompositionSpec, ConstraintSet};
use crate::error::SessionResult;
use crate::session::Session;
use ef_core::{Amount, Pressure, Temperature, constants::P_STANDARD_PA, mol, pa};
use ef_engine::{EquilibriumEngine, FractionKind, GridMinimizer};

/// Everything needed for one equilibrium point.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactRequest {
    pub temperature: Temperature,
    pub pressure: Pressure,
    pub total_amount: Amount,
    pub composition: CompositionSpec,
    pub kind: FractionKind,
    pub grid: GridMinimizer,
    /// Phases left entered; every other phase is suspended. `None` keeps the
    /// record's phase statuses.
    pub phases: Option<Vec<String>>,
    /// Reference phase of each listed component's chemical potential.
    pub reference_phases: Vec<(String, String)>,
}

impl CompactRequest {
    /// Request at standard pressure, one mole, mole fractions, grid minimizer on.
    pub fn new(temperature: Temperature, composition: CompositionSpec) -> Self {
        Self {
            temperature,
            pressure: pa(P_STANDARD_PA),
            total_amount: mol(1.0),
            composition,
            kind: FractionKind::MoleFraction,
            grid: GridMinimizer::On,
            phases: None,
            reference_phases: Vec::new(),
        }
    }

    /// Restrict the calculation to `phases`.
    pub fn with_phases<S: Into<String>>(mut self, phases: impl IntoIterator<Item = S>) -> Self {
        self.phases = Some(phases.into_iter().map(Into::into).collect());
        self
    }

    /// Measure `component`'s chemical potential relative to pure `phase`.
    pub fn with_reference_phase(
        mut self,
        component: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        self.reference_phases.push((component.into(), phase.into()));
        self
    }
}

impl<E: EquilibriumEngine> Session<E> {
    /// Apply `request` to the active record and solve it.
    pub fn compact_equilibrium(&mut self, request: &CompactRequest) -> SessionResult<()> {
        let conditions = ConstraintSet::new()
            .temperature(request.temperature)
            .pressure(request.pressure)
            .total_amount(request.total_amount);
        self.apply(&conditions)?;
        if let Some(phases) = &request.phases {
            self.enter_only(phases.as_slice())?;
        }
        for (component, phase) in &request.reference_phases {
            self.set_reference_phase(component, Some(phase))?;
        }
        self.set_element_fractions(&request.composition, request.kind)?;
        self.solve(request.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::error::SessionError;
    use ef_core::k;
    use ef_engine::{SurrogateDatabase, SurrogateEngine};

    fn session() -> Session<SurrogateEngine> {
        let engine =
            SurrogateEngine::new().with_database("db", SurrogateDatabase::demo_steel());
        Session::open(engine, "db", &["C", "FE"], SessionConfig::default()).unwrap()
    }

    #[test]
    fn compact_equilibrium_solves_in_one_call() {
        let mut s = session();
        let composition = CompositionSpec::from_raw([("FE", -1.0), ("C", 0.02)]);
        s.compact_equilibrium(&CompactRequest::new(k(1250.0), composition))
            .unwrap();
        assert_eq!(s.balance_component().unwrap(), Some("FE"));
        let amounts = s.stable_phase_amounts().unwrap();
        assert!((amounts.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn entered_subset_suspends_other_phases() {
        let mut s = session();
        let composition = CompositionSpec::from_raw([("FE", -1.0), ("C", 0.02)]);
        let request = CompactRequest::new(k(1050.0), composition).with_phases(["BCC_A2"]);
        s.compact_equilibrium(&request).unwrap();
        assert_eq!(s.stable_phases().unwrap(), vec!["BCC_A2"]);
    }

    #[test]
    fn element_reference_phase_shifts_chemical_potential() {
        let composition = CompositionSpec::from_raw([("FE", -1.0), ("C", 0.02)]);
        let mut plain = session();
        plain
            .compact_equilibrium(&CompactRequest::new(k(1050.0), composition.clone()))
            .unwrap();
        let mu = plain.chemical_potentials().unwrap();

        let mut referenced = session();
        let request =
            CompactRequest::new(k(1050.0), composition).with_reference_phase("FE", "BCC_A2");
        referenced.compact_equilibrium(&request).unwrap();
        let shifted = referenced.chemical_potentials().unwrap();

        assert_eq!(shifted.get("C"), mu.get("C"));
        let fe = shifted.get("FE").unwrap() - mu.get("FE").unwrap();
        assert!((fe - (20_000.0 + 1050.0 * 6.0)).abs() < 1e-9);
    }

    #[test]
    fn unknown_reference_phase_rejected() {
        let mut s = session();
        let composition = CompositionSpec::from_raw([("FE", -1.0), ("C", 0.02)]);
        let request =
            CompactRequest::new(k(1050.0), composition).with_reference_phase("FE", "SIGMA");
        assert!(matches!(
            s.compact_equilibrium(&request),
            Err(SessionError::UnknownPhase { .. })
        ));
    }
}
