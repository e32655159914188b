use ef_engine::GridMinimizer;
use ef_project::schema::*;
use ef_project::{ProjectError, from_yaml_str, load, save, validate_scenario};
use ef_session::{BalancePolicy, SessionConfig};
use ef_sweep::{SweepQuantity, TemperatureGrid};

fn tracked_sweep() -> Scenario {
    let mut conditions = ConditionsDef::default();
    conditions
        .composition
        .insert("FE".to_string(), FractionDef::Marker(FractionMarker::Balance));
    conditions
        .composition
        .insert("C".to_string(), FractionDef::Value(0.04));

    Scenario {
        version: ef_project::LATEST_VERSION,
        name: "Tracked sweep".to_string(),
        description: Some("FCC_A1 split followed by carbon".to_string()),
        database: "demo-steel".to_string(),
        components: vec!["FE".to_string(), "C".to_string()],
        session: SessionConfig {
            balance_policy: BalancePolicy::Skip,
            quiet: false,
        },
        conditions,
        phases: PhasesDef {
            entered: vec![],
            statuses: vec![PhaseStatusDef {
                phases: vec!["M23C6".to_string()],
                status: StatusKindDef::Dormant,
                amount: None,
            }],
        },
        calculation: CalculationDef::TemperatureSweep {
            temperatures: TemperatureGrid::step(600.0, 1800.0, 10.0),
            quantity: SweepQuantity::Phase("NP".to_string()),
            grid_minimizer: GridMinimizer::On,
            tracking: Some(TrackingDef {
                tracer: "C".to_string(),
                relabel: RelabelDef::RicherToBranch,
            }),
        },
    }
}

#[test]
fn roundtrip_yaml_tracked_sweep() {
    let scenario = tracked_sweep();
    validate_scenario(&scenario).unwrap();

    let path = std::env::temp_dir().join("ef_project_roundtrip_sweep.yaml");
    save(&path, &scenario).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(scenario, loaded);
}

#[test]
fn roundtrip_json_tracked_sweep() {
    let scenario = tracked_sweep();

    let path = std::env::temp_dir().join("ef_project_roundtrip_sweep.json");
    save(&path, &scenario).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(scenario, loaded);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.trim_start().starts_with('{'));
}

#[test]
fn invalid_scenario_is_not_written() {
    let mut scenario = tracked_sweep();
    scenario
        .conditions
        .composition
        .insert("MN".to_string(), FractionDef::Value(0.01));

    let path = std::env::temp_dir().join("ef_project_invalid_not_written.yaml");
    let _ = std::fs::remove_file(&path);
    assert!(matches!(
        save(&path, &scenario),
        Err(ProjectError::Validation(_))
    ));
    assert!(!path.exists());
}

#[test]
fn minimal_yaml_gets_defaults() {
    let scenario = from_yaml_str(
        r#"
version: 1
name: minimal
database: demo-steel
conditions:
  temperature_k: 1000
calculation:
  kind: single
"#,
    )
    .unwrap();

    assert!(scenario.components.is_empty());
    assert_eq!(scenario.conditions.pressure_pa, 1.0e5);
    assert_eq!(scenario.conditions.total_amount_mol, 1.0);
    assert_eq!(scenario.session, SessionConfig::default());
    assert!(matches!(
        scenario.calculation,
        CalculationDef::Single {
            grid_minimizer: GridMinimizer::On,
            ..
        }
    ));
}

#[test]
fn balance_marker_builds_composition_spec() {
    let scenario = tracked_sweep();
    let spec = scenario.conditions.composition_spec();
    assert_eq!(spec.balance().unwrap(), Some("FE"));
    assert_eq!(spec.fractions().collect::<Vec<_>>(), vec![("C", 0.04)]);
}

#[test]
fn fixed_status_def_carries_amount() {
    let scenario = from_yaml_str(
        r#"
version: 1
name: liquidus
database: demo-steel
components: [FE, C]
phases:
  statuses:
    - phases: [LIQUID]
      status: fixed
      amount: 1.0
calculation:
  kind: single
"#,
    )
    .unwrap();
    let change = &scenario.phases.statuses[0];
    assert_eq!(change.to_status(), ef_engine::PhaseStatus::Fixed { amount: 1.0 });
}

#[test]
fn validation_fails_on_unknown_component() {
    let result = from_yaml_str(
        r#"
version: 1
name: bad
database: demo-steel
components: [FE, C]
conditions:
  temperature_k: 1000
  composition:
    NI: 0.1
calculation:
  kind: single
"#,
    );
    assert!(result.is_err());
}
