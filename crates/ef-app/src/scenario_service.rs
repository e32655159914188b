//! Scenario loading, saving and introspection.

use ef_project::schema::{CalculationDef, Scenario};
use std::path::Path;

use crate::error::AppResult;

/// Summary of a scenario for listing.
#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub name: String,
    pub database: String,
    pub components: Vec<String>,
    pub calculation: &'static str,
    /// Equilibria the calculation will request.
    pub points: usize,
}

/// Load, migrate and validate a scenario file (YAML or JSON).
pub fn load_scenario(path: &Path) -> AppResult<Scenario> {
    Ok(ef_project::load(path)?)
}

pub fn save_scenario(path: &Path, scenario: &Scenario) -> AppResult<()> {
    Ok(ef_project::save(path, scenario)?)
}

pub fn summarize(scenario: &Scenario) -> ScenarioSummary {
    let points = match &scenario.calculation {
        CalculationDef::Single { .. } => 1,
        CalculationDef::TemperatureSweep { temperatures, .. }
        | CalculationDef::ScalarSweep { temperatures, .. }
        | CalculationDef::TemperatureBatch { temperatures, .. } => temperatures.len(),
        CalculationDef::CompositionBatch { grid, .. } => grid.len(),
        CalculationDef::CompTempBatch {
            grid, temperatures, ..
        } => grid.len() * temperatures.len(),
        CalculationDef::MeltingRange => 2,
    };
    ScenarioSummary {
        name: scenario.name.clone(),
        database: scenario.database.clone(),
        components: scenario.components.clone(),
        calculation: scenario.calculation.kind_name(),
        points,
    }
}
