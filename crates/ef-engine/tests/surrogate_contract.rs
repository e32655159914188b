//! Surrogate engine contract tests.
//!
//! These check the boundary behaviour the session layer relies on, not the
//! (deliberately crude) thermodynamics.

use ef_core::{ComponentIndex, PhaseIndex};
use ef_engine::surrogate::codes;
use ef_engine::{
    BatchAxis, BatchRequest, Condition, EquilibriumEngine, FractionKind, GridMinimizer,
    PhaseSelector, PhaseStatus, SurrogateDatabase, SurrogateEngine, symbols,
};
use proptest::prelude::*;
use std::path::Path;

const DB: &str = "demo-steel.yaml";

fn engine() -> SurrogateEngine {
    SurrogateEngine::new().with_database(DB, SurrogateDatabase::demo_steel())
}

proptest! {
    #[test]
    fn component_order_is_independent_of_request_order(
        order in Just(vec!["FE", "C", "CR", "MO"]).prop_shuffle()
    ) {
        let mut engine = engine();
        let loaded = engine.load_database(Path::new(DB), &order).unwrap();
        prop_assert_eq!(loaded.components, vec!["C", "CR", "FE", "MO"]);
    }
}

#[test]
fn empty_request_loads_every_element() {
    let mut engine = engine();
    let loaded = engine.load_database(Path::new(DB), &[]).unwrap();
    assert_eq!(loaded.components.len(), 6);
    assert_eq!(loaded.components[0], "C");
}

#[test]
fn suspended_phases_carry_no_amount() {
    let mut engine = engine();
    let record = engine
        .load_database(Path::new(DB), &["C", "FE"])
        .unwrap()
        .record;
    engine
        .set_phase_status(record, &PhaseSelector::All, PhaseStatus::Suspended)
        .unwrap();
    engine
        .set_phase_status(
            record,
            &PhaseSelector::from_names(["BCC_A2"]),
            PhaseStatus::Entered,
        )
        .unwrap();
    engine
        .set_condition(record, Condition::Temperature(1050.0))
        .unwrap();
    engine.solve(record, GridMinimizer::On).unwrap();
    assert_eq!(engine.last_error_code(), 0);

    for i in 0..engine.phase_count(record).unwrap() {
        let name = engine.phase_name(record, PhaseIndex(i)).unwrap();
        let amount = engine
            .phase_value(record, symbols::PHASE_AMOUNT, PhaseIndex(i))
            .unwrap();
        if name == "BCC_A2" {
            assert!((amount - 1.0).abs() < 1e-12);
        } else {
            assert_eq!(amount, 0.0, "{name}");
        }
    }
}

#[test]
fn nothing_entered_raises_no_stable_phase() {
    let mut engine = engine();
    let record = engine
        .load_database(Path::new(DB), &["C", "FE"])
        .unwrap()
        .record;
    engine
        .set_phase_status(record, &PhaseSelector::All, PhaseStatus::Suspended)
        .unwrap();
    engine
        .set_condition(record, Condition::Temperature(1000.0))
        .unwrap();
    engine.solve(record, GridMinimizer::On).unwrap();
    assert_eq!(engine.last_error_code(), codes::NO_STABLE_PHASE);
}

#[test]
fn mass_fraction_conditions_convert_to_mole_fractions() {
    let mut engine = engine();
    let record = engine
        .load_database(Path::new(DB), &["C", "FE"])
        .unwrap()
        .record;
    engine
        .set_condition(
            record,
            Condition::Fraction {
                kind: FractionKind::MassFraction,
                component: ComponentIndex(0),
                value: 0.01,
            },
        )
        .unwrap();
    engine
        .set_condition(record, Condition::Temperature(1200.0))
        .unwrap();
    engine.solve(record, GridMinimizer::Off).unwrap();

    let w = engine
        .component_value(record, symbols::MASS_FRACTION, ComponentIndex(0))
        .unwrap();
    let x = engine
        .component_value(record, symbols::MOLE_FRACTION, ComponentIndex(0))
        .unwrap();
    assert!((w - 0.01).abs() < 1e-12);
    // Carbon is light, so its mole fraction exceeds its mass fraction.
    assert!(x > w);
}

#[test]
fn split_aliasing_swaps_instances_between_solves() {
    let mut engine = engine().with_split_aliasing(true);
    let record = engine
        .load_database(Path::new(DB), &["C", "FE"])
        .unwrap()
        .record;
    engine
        .set_condition(
            record,
            Condition::Fraction {
                kind: FractionKind::MoleFraction,
                component: ComponentIndex(0),
                value: 0.05,
            },
        )
        .unwrap();
    engine
        .set_condition(record, Condition::Temperature(1300.0))
        .unwrap();

    let mut first_set_carbon = Vec::new();
    for _ in 0..2 {
        engine.solve(record, GridMinimizer::On).unwrap();
        let idx = (0..engine.phase_count(record).unwrap())
            .find(|i| engine.phase_name(record, PhaseIndex(*i)).unwrap() == "FCC_A1#1")
            .unwrap();
        first_set_carbon.push(engine.phase_composition(record, PhaseIndex(idx)).unwrap()[0]);
    }
    assert!(first_set_carbon[0] < first_set_carbon[1]);
}

#[test]
fn batch_reports_failed_points_as_nan() {
    let mut engine = engine();
    let record = engine
        .load_database(Path::new(DB), &["C", "CR", "FE"])
        .unwrap()
        .record;
    engine.inject_failure(1095.0, 1105.0);
    let request = BatchRequest {
        components: vec![ComponentIndex(0), ComponentIndex(1)],
        fractions: vec![vec![0.01, 0.05]],
        axis: BatchAxis::Temperature {
            temperatures: vec![1000.0, 1100.0, 1200.0],
        },
        symbol: symbols::GIBBS_ENERGY.to_string(),
        grid: GridMinimizer::On,
    };
    let values = engine.solve_batch(record, &request).unwrap();
    assert_eq!(values.len(), 3);
    assert!(values[0].is_finite());
    assert!(values[1].is_nan());
    assert!(values[2].is_finite());
    // Batch failures do not raise the global flag.
    assert_eq!(engine.last_error_code(), 0);
}

#[test]
fn batch_keeps_record_fractions_it_does_not_list() {
    let mut engine = engine();
    let record = engine
        .load_database(Path::new(DB), &["C", "CR", "FE"])
        .unwrap()
        .record;
    let carbon = Condition::Fraction {
        kind: FractionKind::MoleFraction,
        component: ComponentIndex(0),
        value: 0.3,
    };
    engine.set_condition(record, carbon).unwrap();
    engine
        .set_condition(record, Condition::Temperature(1000.0))
        .unwrap();
    let request = BatchRequest {
        components: vec![ComponentIndex(1)],
        fractions: vec![vec![0.05]],
        axis: BatchAxis::Composition { temperature: 1000.0 },
        symbol: symbols::GIBBS_ENERGY.to_string(),
        grid: GridMinimizer::On,
    };
    let batched = engine.solve_batch(record, &request).unwrap()[0];

    engine
        .set_condition(
            record,
            Condition::Fraction {
                kind: FractionKind::MoleFraction,
                component: ComponentIndex(1),
                value: 0.05,
            },
        )
        .unwrap();
    engine.solve(record, GridMinimizer::On).unwrap();
    let single = engine.scalar(record, symbols::GIBBS_ENERGY).unwrap();
    assert!((batched - single).abs() <= 1e-9 * single.abs());
}

#[test]
fn reloading_invalidates_old_records() {
    let mut engine = engine();
    let first = engine
        .load_database(Path::new(DB), &["C", "FE"])
        .unwrap()
        .record;
    let copy = engine.clone_record(first, "SNAPSHOT").unwrap();
    engine.load_database(Path::new(DB), &["C", "FE"]).unwrap();
    assert!(engine.scalar(copy, symbols::PRESSURE).is_err());
    assert_eq!(engine.record_count(), 1);
}
