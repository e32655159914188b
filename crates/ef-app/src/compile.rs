//! Scenario compilation: database resolution and session setup.

use ef_core::{k, mol, pa};
use ef_engine::{SurrogateDatabase, SurrogateEngine};
use ef_project::schema::{RelabelDef, Scenario, TrackingDef};
use ef_session::{ConstraintSet, Session};
use ef_sweep::{NoRelabel, SplitRole, SplitTracking, TracerRank, TrackedSplit};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Database name that resolves to the built-in demo steel system.
pub const BUILTIN_DEMO_STEEL: &str = "demo-steel";

/// A database ready to hand to the engine.
#[derive(Debug, Clone)]
pub struct ResolvedDatabase {
    /// Key the engine loads the database under.
    pub path: PathBuf,
    pub database: SurrogateDatabase,
    /// Canonical contents, hashed into the run id.
    pub contents: Vec<u8>,
}

/// Resolve the scenario's database: a built-in name, or a file relative to
/// the scenario.
pub fn resolve_database(scenario: &Scenario, scenario_path: &Path) -> AppResult<ResolvedDatabase> {
    if scenario.database == BUILTIN_DEMO_STEEL {
        let database = SurrogateDatabase::demo_steel();
        let contents = serde_yaml::to_string(&database)
            .map_err(|e| AppError::Database {
                path: PathBuf::from(BUILTIN_DEMO_STEEL),
                message: e.to_string(),
            })?
            .into_bytes();
        return Ok(ResolvedDatabase {
            path: PathBuf::from(BUILTIN_DEMO_STEEL),
            database,
            contents,
        });
    }

    let path = scenario_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&scenario.database);
    let text = std::fs::read_to_string(&path).map_err(|source| AppError::DatabaseFileRead {
        path: path.clone(),
        source,
    })?;
    let database = SurrogateDatabase::from_yaml_str(&text).map_err(|message| {
        AppError::Database {
            path: path.clone(),
            message,
        }
    })?;
    Ok(ResolvedDatabase {
        path,
        database,
        contents: text.into_bytes(),
    })
}

/// Open a session on the scenario's database and apply its conditions and
/// phase statuses to the default record.
pub fn open_session(
    scenario: &Scenario,
    database: &ResolvedDatabase,
    verbose: bool,
) -> AppResult<Session<SurrogateEngine>> {
    let engine =
        SurrogateEngine::new().with_database(database.path.clone(), database.database.clone());
    let mut config = scenario.session.clone();
    if verbose {
        config.quiet = false;
    }
    let components: Vec<&str> = scenario.components.iter().map(String::as_str).collect();
    let mut session = Session::open(engine, &database.path, &components, config)?;
    apply_conditions(&mut session, scenario)?;
    debug!(
        scenario = %scenario.name,
        components = ?session.component_names(),
        "scenario compiled"
    );
    Ok(session)
}

/// Conditions first, then composition, then phase statuses.
pub fn apply_conditions(
    session: &mut Session<SurrogateEngine>,
    scenario: &Scenario,
) -> AppResult<()> {
    let conditions = &scenario.conditions;
    let mut set = ConstraintSet::new()
        .pressure(pa(conditions.pressure_pa))
        .total_amount(mol(conditions.total_amount_mol));
    if let Some(t) = conditions.temperature_k {
        set = set.temperature(k(t));
    }
    session.apply(&set)?;
    session.set_element_fractions(&conditions.composition_spec(), conditions.fraction_kind)?;

    if !scenario.phases.entered.is_empty() {
        session.enter_only(&scenario.phases.entered)?;
    }
    for change in &scenario.phases.statuses {
        session.set_phase_status(&change.selector(), change.to_status())?;
    }
    Ok(())
}

pub fn split_tracking(tracking: Option<&TrackingDef>) -> SplitTracking {
    let Some(tracking) = tracking else {
        return SplitTracking::Disabled;
    };
    let split = TrackedSplit::new(tracking.tracer.as_str());
    SplitTracking::Enabled(match tracking.relabel {
        RelabelDef::RicherToBranch => split,
        RelabelDef::RicherToContinuation => split.with_policy(TracerRank {
            richer: SplitRole::Continuation,
        }),
        RelabelDef::None => split.with_policy(NoRelabel),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_engine::PhaseStatus;

    fn scenario(yaml: &str) -> Scenario {
        ef_project::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn builtin_database_needs_no_file() {
        let s = scenario(
            "version: 1\nname: t\ndatabase: demo-steel\nconditions: { temperature_k: 1000 }\ncalculation: { kind: single }\n",
        );
        let db = resolve_database(&s, Path::new("/nowhere/scenario.yaml")).unwrap();
        assert_eq!(db.database, SurrogateDatabase::demo_steel());
        assert!(!db.contents.is_empty());
    }

    #[test]
    fn missing_database_file_is_reported() {
        let s = scenario(
            "version: 1\nname: t\ndatabase: missing.yaml\nconditions: { temperature_k: 1000 }\ncalculation: { kind: single }\n",
        );
        let err = resolve_database(&s, Path::new("/nowhere/scenario.yaml")).unwrap_err();
        assert!(matches!(err, AppError::DatabaseFileRead { .. }));
    }

    #[test]
    fn compiled_session_carries_conditions_and_statuses() {
        let s = scenario(
            r#"
version: 1
name: t
database: demo-steel
components: [FE, C]
conditions:
  temperature_k: 1050
  composition: { FE: balance, C: 0.02 }
phases:
  entered: [FCC_A1, BCC_A2]
calculation: { kind: single }
"#,
        );
        let db = resolve_database(&s, Path::new("scenario.yaml")).unwrap();
        let mut session = open_session(&s, &db, false).unwrap();

        assert_eq!(session.temperature_condition().unwrap(), Some(1050.0));
        assert_eq!(session.balance_component().unwrap(), Some("FE"));
        let statuses = session.phase_statuses().unwrap();
        let suspended: Vec<_> = statuses
            .iter()
            .filter(|p| p.status == PhaseStatus::Suspended)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(suspended, vec!["LIQUID", "M23C6", "M6C"]);
    }

    #[test]
    fn relabel_def_maps_to_policy() {
        assert!(matches!(split_tracking(None), SplitTracking::Disabled));
        let def = TrackingDef {
            tracer: "C".to_string(),
            relabel: RelabelDef::None,
        };
        match split_tracking(Some(&def)) {
            SplitTracking::Enabled(split) => assert_eq!(split.tracer, "C"),
            SplitTracking::Disabled => panic!("tracking should be enabled"),
        }
    }
}
