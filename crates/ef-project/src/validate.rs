//! Scenario validation logic.

use crate::schema::{CalculationDef, ConditionsDef, FractionDef, PhasesDef, Scenario, StatusKindDef};
use ef_sweep::{CompositionGrid, TemperatureGrid};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing field: {field}")]
    MissingField { field: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    if scenario.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: scenario.version,
        });
    }
    if scenario.name.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "name".to_string(),
        });
    }
    if scenario.database.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "database".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for component in &scenario.components {
        if component.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "components".to_string(),
                value: format!("'{component}'"),
                reason: "component names must not be empty".to_string(),
            });
        }
        if !seen.insert(component.to_ascii_uppercase()) {
            return Err(ValidationError::DuplicateName {
                name: component.clone(),
                context: "components".to_string(),
            });
        }
    }

    let known = Known(&scenario.components);
    validate_conditions(&scenario.conditions, &known)?;
    validate_phases(&scenario.phases)?;
    validate_calculation(scenario, &known)
}

/// Component names declared by the scenario; an empty list accepts any name.
struct Known<'a>(&'a [String]);

impl Known<'_> {
    fn check(&self, name: &str, context: &str) -> Result<(), ValidationError> {
        if self.0.is_empty() || self.0.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            Ok(())
        } else {
            Err(ValidationError::MissingReference {
                name: name.to_string(),
                context: context.to_string(),
            })
        }
    }

    /// Largest number of independent fractions, when the component list is known.
    fn max_fractions(&self) -> Option<usize> {
        (!self.0.is_empty()).then(|| self.0.len() - 1)
    }
}

fn validate_conditions(conditions: &ConditionsDef, known: &Known<'_>) -> Result<(), ValidationError> {
    if let Some(t) = conditions.temperature_k {
        validate_positive_finite("conditions.temperature_k", t)?;
    }
    validate_positive_finite("conditions.pressure_pa", conditions.pressure_pa)?;
    let n = conditions.total_amount_mol;
    if !n.is_finite() || n < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "conditions.total_amount_mol".to_string(),
            value: n.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }

    let mut balances = 0;
    let mut explicit = 0;
    let mut sum = 0.0;
    for (name, fraction) in &conditions.composition {
        known.check(name, "conditions.composition")?;
        match fraction {
            FractionDef::Value(v) => {
                if !v.is_finite() || !(0.0..=1.0).contains(v) {
                    return Err(ValidationError::InvalidValue {
                        field: format!("conditions.composition.{name}"),
                        value: v.to_string(),
                        reason: "fractions must be in [0, 1]".to_string(),
                    });
                }
                explicit += 1;
                sum += v;
            }
            FractionDef::Marker(_) => balances += 1,
        }
    }
    if balances > 1 {
        return Err(ValidationError::InvalidValue {
            field: "conditions.composition".to_string(),
            value: balances.to_string(),
            reason: "at most one component can be the balance".to_string(),
        });
    }
    if let Some(max) = known.max_fractions()
        && explicit > max
    {
        return Err(ValidationError::InvalidValue {
            field: "conditions.composition".to_string(),
            value: explicit.to_string(),
            reason: format!("at most {max} independent fractions"),
        });
    }
    if sum > 1.0 + 1e-12 {
        return Err(ValidationError::InvalidValue {
            field: "conditions.composition".to_string(),
            value: sum.to_string(),
            reason: "fractions sum to more than one".to_string(),
        });
    }
    Ok(())
}

fn validate_phases(phases: &PhasesDef) -> Result<(), ValidationError> {
    if phases.entered.iter().any(|p| p.trim().is_empty()) {
        return Err(ValidationError::InvalidValue {
            field: "phases.entered".to_string(),
            value: "''".to_string(),
            reason: "phase names must not be empty".to_string(),
        });
    }
    for (i, change) in phases.statuses.iter().enumerate() {
        let field = format!("phases.statuses[{i}]");
        if change.phases.is_empty() {
            return Err(ValidationError::MissingField {
                field: format!("{field}.phases"),
            });
        }
        match (change.status, change.amount) {
            (StatusKindDef::Fixed, Some(amount)) if !amount.is_finite() || amount < 0.0 => {
                return Err(ValidationError::InvalidValue {
                    field: format!("{field}.amount"),
                    value: amount.to_string(),
                    reason: "must be non-negative and finite".to_string(),
                });
            }
            (StatusKindDef::Fixed, _) => {}
            (_, Some(amount)) => {
                return Err(ValidationError::InvalidValue {
                    field: format!("{field}.amount"),
                    value: amount.to_string(),
                    reason: "only fixed phases carry an amount".to_string(),
                });
            }
            (_, None) => {}
        }
    }
    Ok(())
}

fn validate_calculation(scenario: &Scenario, known: &Known<'_>) -> Result<(), ValidationError> {
    let has_fixed_phase = scenario
        .phases
        .statuses
        .iter()
        .any(|s| s.status == StatusKindDef::Fixed);
    match &scenario.calculation {
        CalculationDef::Single { report, .. } => {
            if scenario.conditions.temperature_k.is_none() && !has_fixed_phase {
                return Err(ValidationError::MissingField {
                    field: "conditions.temperature_k".to_string(),
                });
            }
            if report.iter().any(|s| s.trim().is_empty()) {
                return Err(ValidationError::InvalidValue {
                    field: "calculation.report".to_string(),
                    value: "''".to_string(),
                    reason: "symbols must not be empty".to_string(),
                });
            }
        }
        CalculationDef::TemperatureSweep {
            temperatures,
            tracking,
            ..
        } => {
            validate_temperatures(temperatures)?;
            if let Some(tracking) = tracking {
                known.check(&tracking.tracer, "calculation.tracking.tracer")?;
            }
        }
        CalculationDef::ScalarSweep {
            temperatures,
            symbol,
            ..
        }
        | CalculationDef::TemperatureBatch {
            temperatures,
            symbol,
            ..
        } => {
            validate_temperatures(temperatures)?;
            validate_symbol(symbol)?;
        }
        CalculationDef::CompositionBatch {
            grid,
            temperature_k,
            symbol,
            ..
        } => {
            validate_positive_finite("calculation.temperature_k", *temperature_k)?;
            validate_grid(grid, scenario, known)?;
            validate_symbol(symbol)?;
        }
        CalculationDef::CompTempBatch {
            grid,
            temperatures,
            symbol,
            ..
        } => {
            validate_temperatures(temperatures)?;
            validate_grid(grid, scenario, known)?;
            validate_symbol(symbol)?;
        }
        CalculationDef::MeltingRange => {}
    }
    Ok(())
}

fn validate_temperatures(grid: &TemperatureGrid) -> Result<(), ValidationError> {
    grid.validate().map_err(|e| ValidationError::InvalidValue {
        field: "calculation.temperatures".to_string(),
        value: grid.to_string(),
        reason: e.to_string(),
    })
}

fn validate_grid(
    grid: &CompositionGrid,
    scenario: &Scenario,
    known: &Known<'_>,
) -> Result<(), ValidationError> {
    grid.validate().map_err(|e| ValidationError::InvalidValue {
        field: "calculation.grid".to_string(),
        value: grid.components().join(", "),
        reason: e.to_string(),
    })?;
    let balance = scenario.conditions.balance();
    for component in grid.components() {
        known.check(component, "calculation.grid")?;
        if balance.is_some_and(|b| b.eq_ignore_ascii_case(component)) {
            return Err(ValidationError::InvalidValue {
                field: "calculation.grid".to_string(),
                value: component.to_string(),
                reason: "the balance component cannot be a grid axis".to_string(),
            });
        }
    }
    if let Some(max) = known.max_fractions()
        && grid.axes.len() > max
    {
        return Err(ValidationError::InvalidValue {
            field: "calculation.grid".to_string(),
            value: grid.axes.len().to_string(),
            reason: format!("at most {max} composition axes"),
        });
    }
    Ok(())
}

fn validate_symbol(symbol: &str) -> Result<(), ValidationError> {
    if symbol.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "calculation.symbol".to_string(),
        });
    }
    Ok(())
}

fn validate_positive_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    Ok(())
}
