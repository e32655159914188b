//! End-to-end session scenarios against the surrogate engine.

use ef_core::{Tolerances, k, mol, nearly_equal, pa};
use ef_engine::{FractionKind, GridMinimizer, PhaseSelector, PhaseStatus, SurrogateDatabase, SurrogateEngine};
use ef_session::{ConstraintSet, Session, SessionConfig, SessionError};
use proptest::prelude::*;

const DB: &str = "demo-steel.yaml";

fn open(components: &[&str]) -> Session<SurrogateEngine> {
    let engine = SurrogateEngine::new().with_database(DB, SurrogateDatabase::demo_steel());
    Session::open(engine, DB, components, SessionConfig::default()).unwrap()
}

#[test]
fn three_component_equilibrium_conserves_amount() {
    let mut s = open(&["FE", "C", "CR"]);
    s.enter_only(&["FCC_A1", "BCC_A2"]).unwrap();
    let conditions = ConstraintSet::new()
        .temperature(k(1173.0))
        .pressure(pa(1e5))
        .total_amount(mol(1.0))
        .fraction("C", 0.01, FractionKind::MoleFraction)
        .fraction("CR", 0.05, FractionKind::MoleFraction);
    s.apply(&conditions).unwrap();
    s.solve(GridMinimizer::On).unwrap();

    let amounts = s.stable_phase_amounts().unwrap();
    assert!(!amounts.is_empty());
    assert!(nearly_equal(amounts.total(), 1.0, Tolerances::MASS_BALANCE));
    for phase in amounts.keys() {
        assert!(phase == "FCC_A1" || phase == "BCC_A2", "{phase}");
    }
    s.release_all().unwrap();
}

#[test]
fn suspended_phases_stay_suspended_after_solve() {
    let mut s = open(&["C", "FE"]);
    s.set_phase_status(&PhaseSelector::All, PhaseStatus::Suspended)
        .unwrap();
    s.set_phase_status(&PhaseSelector::from_names(["LIQUID", "FCC_A1"]), PhaseStatus::Entered)
        .unwrap();
    s.set_temperature(Some(k(1550.0))).unwrap();
    s.solve(GridMinimizer::Off).unwrap();

    for report in s.phase_statuses().unwrap() {
        let expect_entered = report.name == "LIQUID" || report.name == "FCC_A1";
        assert_eq!(!report.status.is_suspended(), expect_entered, "{}", report.name);
    }
}

#[test]
fn records_are_independent() {
    let mut s = open(&["C", "FE"]);
    s.set_temperature(Some(k(1000.0))).unwrap();
    s.create_record("hot").unwrap();
    s.select_record("hot").unwrap();
    s.set_temperature(Some(k(1550.0))).unwrap();
    s.solve(GridMinimizer::Off).unwrap();
    let hot = s.stable_phases().unwrap();

    s.select_record(ef_session::DEFAULT_RECORD).unwrap();
    s.solve(GridMinimizer::Off).unwrap();
    let cold = s.stable_phases().unwrap();

    assert!(hot.contains(&"LIQUID".to_string()));
    assert!(!cold.contains(&"LIQUID".to_string()));
    s.release_all().unwrap();
}

#[test]
fn failure_does_not_poison_next_solve() {
    let mut s = open(&["C", "FE"]);
    s.engine_mut().inject_failure(995.0, 1005.0);
    s.set_temperature(Some(k(1000.0))).unwrap();
    assert!(matches!(
        s.solve(GridMinimizer::On),
        Err(SessionError::SolveFailure { .. })
    ));
    s.set_temperature(Some(k(1010.0))).unwrap();
    s.solve(GridMinimizer::On).unwrap();
    assert!(!s.stable_phases().unwrap().is_empty());
}

proptest! {
    #[test]
    fn selecting_twice_gives_identical_results(t in 700.0f64..1700.0) {
        let mut s = open(&["C", "CR", "FE"]);
        s.create_record("probe").unwrap();
        s.select_record("probe").unwrap();
        s.set_temperature(Some(k(t))).unwrap();
        s.set_element_fraction("C", 0.02, FractionKind::MoleFraction).unwrap();

        s.select_record("probe").unwrap();
        s.solve(GridMinimizer::Off).unwrap();
        let first = s.gibbs_energy().unwrap();
        s.select_record("probe").unwrap();
        s.solve(GridMinimizer::Off).unwrap();
        let second = s.gibbs_energy().unwrap();

        prop_assert_eq!(first.to_bits(), second.to_bits());
        s.release_all().unwrap();
    }
}
