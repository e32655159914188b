//! Schema migration framework.

use crate::ProjectError;
use crate::schema::{CalculationDef, Scenario};

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut scenario: Scenario) -> Result<Scenario, ProjectError> {
    while scenario.version < LATEST_VERSION {
        scenario = migrate_one_version(scenario)?;
    }
    Ok(scenario)
}

fn migrate_one_version(scenario: Scenario) -> Result<Scenario, ProjectError> {
    match scenario.version {
        0 => migrate_v0_to_v1(scenario),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 matched names case-insensitively; version 1 stores them upper-case.
fn migrate_v0_to_v1(mut scenario: Scenario) -> Result<Scenario, ProjectError> {
    for component in &mut scenario.components {
        component.make_ascii_uppercase();
    }
    scenario.conditions.composition = std::mem::take(&mut scenario.conditions.composition)
        .into_iter()
        .map(|(name, fraction)| (name.to_ascii_uppercase(), fraction))
        .collect();
    for phase in &mut scenario.phases.entered {
        phase.make_ascii_uppercase();
    }
    for change in &mut scenario.phases.statuses {
        for phase in &mut change.phases {
            phase.make_ascii_uppercase();
        }
    }
    match &mut scenario.calculation {
        CalculationDef::TemperatureSweep {
            tracking: Some(tracking),
            ..
        } => tracking.tracer.make_ascii_uppercase(),
        CalculationDef::CompositionBatch { grid, .. } | CalculationDef::CompTempBatch { grid, .. } => {
            for axis in &mut grid.axes {
                axis.component.make_ascii_uppercase();
            }
        }
        _ => {}
    }

    scenario.version = 1;
    Ok(scenario)
}
