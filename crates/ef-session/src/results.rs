//! Result queries on the active record.

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::values::NamedValues;
use ef_core::{ComponentIndex, PhaseIndex, Temperature, k};
use ef_engine::{
    ConstituentDescription, EquilibriumEngine, FractionKind, PhaseName, Sublattice, symbols,
};
use std::collections::BTreeMap;

impl<E: EquilibriumEngine> Session<E> {
    /// Any scalar result by symbol (`G`, `H`, `T`, `N`, ...).
    pub fn scalar(&mut self, symbol: &str) -> SessionResult<f64> {
        let handle = self.active_record()?;
        self.guarded(|engine| engine.scalar(handle, symbol))
    }

    /// Total Gibbs energy [J].
    pub fn gibbs_energy(&mut self) -> SessionResult<f64> {
        self.scalar(symbols::GIBBS_ENERGY)
    }

    /// Total enthalpy [J].
    pub fn enthalpy(&mut self) -> SessionResult<f64> {
        self.scalar(symbols::ENTHALPY)
    }

    /// Equilibrium temperature; differs from the condition when T was unset.
    pub fn temperature(&mut self) -> SessionResult<Temperature> {
        Ok(k(self.scalar(symbols::TEMPERATURE)?))
    }

    /// One component-associated value per component, in engine order.
    pub fn component_values(&mut self, symbol: &str) -> SessionResult<NamedValues> {
        let handle = self.active_record()?;
        let names = self.component_names().to_vec();
        let mut values = NamedValues::new();
        for (i, name) in names.into_iter().enumerate() {
            let v = self.guarded(|engine| engine.component_value(handle, symbol, ComponentIndex(i)))?;
            values.insert(name, v);
        }
        Ok(values)
    }

    /// Chemical potential of every component [J/mol].
    pub fn chemical_potentials(&mut self) -> SessionResult<NamedValues> {
        self.component_values(symbols::CHEMICAL_POTENTIAL)
    }

    /// Overall fraction of every component.
    pub fn component_fractions(&mut self, kind: FractionKind) -> SessionResult<NamedValues> {
        self.component_values(kind.symbol())
    }

    /// One phase-associated value per phase, composition sets included.
    pub fn phase_values(&mut self, symbol: &str) -> SessionResult<NamedValues> {
        let handle = self.active_record()?;
        let count = self.phase_count()?;
        let mut values = NamedValues::new();
        for i in 0..count {
            let index = PhaseIndex(i);
            let name = self.guarded(|engine| engine.phase_name(handle, index))?;
            let v = self.guarded(|engine| engine.phase_value(handle, symbol, index))?;
            values.insert(name, v);
        }
        Ok(values)
    }

    /// Amount [mol] of each phase with a nonzero amount.
    pub fn stable_phase_amounts(&mut self) -> SessionResult<NamedValues> {
        Ok(self
            .phase_values(symbols::PHASE_AMOUNT)?
            .iter()
            .filter(|(_, amount)| *amount > 0.0)
            .map(|(name, amount)| (name.to_string(), amount))
            .collect())
    }

    /// Names of the stable phases (nonzero amount), in engine order.
    pub fn stable_phases(&mut self) -> SessionResult<Vec<String>> {
        Ok(self
            .stable_phase_amounts()?
            .keys()
            .map(str::to_string)
            .collect())
    }

    /// Fraction of the system in each stable phase.
    pub fn phase_fractions(&mut self) -> SessionResult<NamedValues> {
        Ok(self
            .phase_values(symbols::PHASE_FRACTION)?
            .iter()
            .filter(|(_, fraction)| *fraction > 0.0)
            .map(|(name, fraction)| (name.to_string(), fraction))
            .collect())
    }

    fn phase_index(&mut self, phase: &str) -> SessionResult<PhaseIndex> {
        let wanted = PhaseName::new(phase.to_ascii_uppercase());
        self.phase_names()?
            .iter()
            .position(|n| PhaseName::new(n.as_str()) == wanted)
            .map(PhaseIndex)
            .ok_or_else(|| SessionError::UnknownPhase {
                name: phase.to_string(),
            })
    }

    /// Mole fractions of the components inside one phase.
    pub fn phase_composition(&mut self, phase: &str) -> SessionResult<NamedValues> {
        let handle = self.active_record()?;
        let index = self.phase_index(phase)?;
        let fractions = self.guarded(|engine| engine.phase_composition(handle, index))?;
        Ok(self
            .component_names()
            .iter()
            .cloned()
            .zip(fractions)
            .collect())
    }

    /// Composition of every stable phase, keyed by phase name.
    pub fn phase_element_composition(&mut self) -> SessionResult<BTreeMap<String, NamedValues>> {
        let mut compositions = BTreeMap::new();
        for phase in self.stable_phases()? {
            let composition = self.phase_composition(&phase)?;
            compositions.insert(phase, composition);
        }
        Ok(compositions)
    }

    /// Sublattices of one phase with constituent site fractions.
    pub fn phase_sublattices(&mut self, phase: &str) -> SessionResult<Vec<Sublattice>> {
        let handle = self.active_record()?;
        let index = self.phase_index(phase)?;
        self.guarded(|engine| engine.phase_sublattices(handle, index))
    }

    /// Site count of each sublattice of every stable phase.
    pub fn phase_sites(&mut self) -> SessionResult<BTreeMap<String, Vec<f64>>> {
        let mut sites = BTreeMap::new();
        for phase in self.stable_phases()? {
            let sublattices = self.phase_sublattices(&phase)?;
            sites.insert(phase, sublattices.iter().map(|s| s.sites).collect());
        }
        Ok(sites)
    }

    /// Constituent site fractions of every stable phase, one entry per sublattice.
    pub fn phase_constituent_composition(
        &mut self,
    ) -> SessionResult<BTreeMap<String, Vec<Sublattice>>> {
        let mut compositions = BTreeMap::new();
        for phase in self.stable_phases()? {
            let sublattices = self.phase_sublattices(&phase)?;
            compositions.insert(phase, sublattices);
        }
        Ok(compositions)
    }

    /// Description of every constituent found on a stable phase's sublattices.
    pub fn constituents_description(
        &mut self,
    ) -> SessionResult<BTreeMap<String, ConstituentDescription>> {
        let handle = self.active_record()?;
        let mut descriptions = BTreeMap::new();
        for sublattices in self.phase_constituent_composition()?.into_values() {
            for (name, _) in sublattices.into_iter().flat_map(|s| s.constituents) {
                if descriptions.contains_key(&name) {
                    continue;
                }
                let description = self.guarded(|engine| engine.constituent(handle, &name))?;
                descriptions.insert(name, description);
            }
        }
        Ok(descriptions)
    }
}

#[cfg(test)]
mod tests {
    use crate::session::{Session, SessionConfig};
    use crate::error::SessionError;
    use ef_core::{k, mol, pa};
    use ef_engine::{FractionKind, GridMinimizer, SurrogateDatabase, SurrogateEngine};

    const DB: &str = "demo-steel.yaml";

    fn solved_at(t: f64) -> Session<SurrogateEngine> {
        let engine = SurrogateEngine::new().with_database(DB, SurrogateDatabase::demo_steel());
        let mut s = Session::open(engine, DB, &["C", "CR", "FE"], SessionConfig::default()).unwrap();
        s.set_temperature(Some(k(t))).unwrap();
        s.set_pressure(pa(1e5)).unwrap();
        s.set_total_amount(mol(1.0)).unwrap();
        s.set_element_fraction("C", 0.04, FractionKind::MoleFraction)
            .unwrap();
        s.set_element_fraction("CR", 0.05, FractionKind::MoleFraction)
            .unwrap();
        s.solve(GridMinimizer::On).unwrap();
        s
    }

    #[test]
    fn stable_phases_follow_amounts() {
        let mut s = solved_at(1050.0);
        let stable = s.stable_phases().unwrap();
        assert_eq!(stable, vec!["FCC_A1", "BCC_A2", "M6C"]);
        let fractions = s.phase_fractions().unwrap();
        assert!((fractions.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn component_fractions_match_conditions() {
        let mut s = solved_at(1050.0);
        let x = s.component_fractions(FractionKind::MoleFraction).unwrap();
        assert_eq!(x.get("C"), Some(0.04));
        assert!((x.get("FE").unwrap() - 0.91).abs() < 1e-12);
        let mu = s.chemical_potentials().unwrap();
        assert_eq!(mu.len(), 3);
        assert!(mu.values().all(f64::is_finite));
    }

    #[test]
    fn split_phase_compositions_bracket_overall() {
        let mut s = solved_at(1300.0);
        let phases = s.phase_element_composition().unwrap();
        let lean = phases["FCC_A1#1"].get("C").unwrap();
        let rich = phases["FCC_A1_AUTO#2"].get("C").unwrap();
        assert!(lean < 0.04 && 0.04 < rich);
    }

    #[test]
    fn phase_composition_of_unknown_phase() {
        let mut s = solved_at(1050.0);
        assert!(matches!(
            s.phase_composition("SIGMA"),
            Err(SessionError::UnknownPhase { .. })
        ));
        // Case-insensitive lookup.
        assert_eq!(s.phase_composition("bcc_a2").unwrap().len(), 3);
    }

    #[test]
    fn stable_phase_sites_and_constituents() {
        let mut s = solved_at(1050.0);
        let sites = s.phase_sites().unwrap();
        assert_eq!(sites.keys().collect::<Vec<_>>(), vec!["BCC_A2", "FCC_A1", "M6C"]);
        assert_eq!(sites["BCC_A2"], vec![1.0, 3.0]);
        assert_eq!(sites["M6C"], vec![2.0, 2.0, 1.0]);

        let constituents = s.phase_constituent_composition().unwrap();
        let interstitial = &constituents["FCC_A1"][1];
        assert_eq!(interstitial.site_fraction("C"), Some(0.04));
        for sublattices in constituents.values() {
            for sublattice in sublattices {
                let total: f64 = sublattice.constituents.iter().map(|(_, y)| y).sum();
                assert!((total - 1.0).abs() < 1e-12);
            }
        }

        let described = s.constituents_description().unwrap();
        assert_eq!(described.keys().collect::<Vec<_>>(), vec!["C", "CR", "FE", "VA"]);
        assert_eq!(described["C"].elements, vec![("C".to_string(), 1.0)]);
        assert_eq!(described["VA"].mass, 0.0);
    }

    #[test]
    fn split_phase_sublattices_follow_each_set() {
        let mut s = solved_at(1300.0);
        let lean = s.phase_sublattices("FCC_A1#1").unwrap();
        let rich = s.phase_sublattices("FCC_A1_AUTO#2").unwrap();
        assert!(lean[1].site_fraction("C") < rich[1].site_fraction("C"));
    }

    #[test]
    fn gibbs_energy_is_finite_and_temperature_reads_back() {
        let mut s = solved_at(1173.0);
        assert!(s.gibbs_energy().unwrap().is_finite());
        assert!((ef_core::kelvin(s.temperature().unwrap()) - 1173.0).abs() < 1e-9);
    }
}
