//! Batch equilibria handed to the engine in one call.
//!
//! The fraction matrix is built here in a documented order and passed through
//! unchanged; points the engine cannot solve come back as NaN. Each row is a
//! full fraction vector: the batched components plus every other mole-fraction
//! condition of the active record, in engine component order.

use crate::error::{SweepError, SweepResult};
use crate::grid::{CompositionGrid, MAX_POINTS, TemperatureGrid};
use ef_core::{ComponentIndex, Temperature, kelvin};
use ef_engine::{BatchAxis, BatchRequest, EquilibriumEngine, FractionKind, GridMinimizer};
use ef_session::{CompositionSpec, Session, SessionError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Batch results: `values[t][c]` is the value at temperature `t`, composition `c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTable {
    pub symbol: String,
    /// Components with an explicit fraction, in column order of `compositions`.
    pub components: Vec<String>,
    pub compositions: Vec<Vec<f64>>,
    pub temperatures: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

impl BatchTable {
    pub fn at(&self, temperature: usize, composition: usize) -> Option<f64> {
        self.values.get(temperature)?.get(composition).copied()
    }

    /// Values across temperatures at one composition.
    pub fn column(&self, composition: usize) -> Vec<f64> {
        self.values
            .iter()
            .map(|row| row.get(composition).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Number of points the engine could not solve.
    pub fn failed_points(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_nan()).count()
    }
}

/// Resolve batch components, refusing the balance component and more than N-1.
fn batch_components<E: EquilibriumEngine>(
    session: &Session<E>,
    names: &[&str],
) -> SweepResult<(Vec<ComponentIndex>, Vec<String>)> {
    let max = session.component_names().len().saturating_sub(1);
    if names.len() > max {
        return Err(SessionError::TooManyFractions { max }.into());
    }
    let balance = session.balance_component()?;
    let mut indices = Vec::with_capacity(names.len());
    let mut canonical = Vec::with_capacity(names.len());
    for name in names {
        let index = session.component_index(name)?;
        let component = session.component_names()[index.0].clone();
        if balance.is_some_and(|b| b == component) {
            return Err(SessionError::BalanceComponentConstraint { component }.into());
        }
        indices.push(index);
        canonical.push(component);
    }
    Ok((indices, canonical))
}

/// Merge batched points with the record's other mole-fraction conditions.
///
/// Returns the request columns in engine order and one full row per point.
/// Batch rows are mole fractions, so a mass-fraction condition on a component
/// outside the batch is refused.
fn full_rows<E: EquilibriumEngine>(
    session: &Session<E>,
    batched: &[ComponentIndex],
    points: &[Vec<f64>],
) -> SweepResult<(Vec<ComponentIndex>, Vec<Vec<f64>>)> {
    let mut fixed: Vec<(ComponentIndex, f64)> = Vec::new();
    for (c, kind, value) in session.fixed_fractions()? {
        if batched.contains(&c) {
            continue;
        }
        if kind == FractionKind::MassFraction {
            return Err(SweepError::InvalidConfiguration(format!(
                "{} carries a mass fraction condition; batch rows are mole fractions",
                session.component_names()[c.0]
            )));
        }
        fixed.push((c, value));
    }
    let mut columns: Vec<ComponentIndex> = batched
        .iter()
        .copied()
        .chain(fixed.iter().map(|(c, _)| *c))
        .collect();
    columns.sort();
    let max = session.component_names().len().saturating_sub(1);
    if columns.len() > max {
        return Err(SessionError::TooManyFractions { max }.into());
    }

    let rows = points
        .iter()
        .map(|point| {
            columns
                .iter()
                .map(|c| match batched.iter().position(|b| b == c) {
                    Some(i) => point[i],
                    None => fixed
                        .iter()
                        .find(|(f, _)| f == c)
                        .map(|(_, v)| *v)
                        .unwrap_or(0.0),
                })
                .collect()
        })
        .collect();
    Ok((columns, rows))
}

/// Evaluate `symbol` at every point of `grid`, all at `temperature`.
pub fn composition_batch<E: EquilibriumEngine>(
    session: &mut Session<E>,
    grid: &CompositionGrid,
    temperature: Temperature,
    symbol: &str,
    minimizer: GridMinimizer,
) -> SweepResult<BatchTable> {
    grid.validate()?;
    let (batched, names) = batch_components(session, &grid.components())?;
    let points = grid.points();
    let (components, fractions) = full_rows(session, &batched, &points)?;
    let t = kelvin(temperature);
    let request = BatchRequest {
        components,
        fractions,
        axis: BatchAxis::Composition { temperature: t },
        symbol: symbol.to_string(),
        grid: minimizer,
    };
    debug!(points = request.len(), kelvin = t, symbol, "composition batch");
    let values = session.solve_batch(&request)?;
    Ok(BatchTable {
        symbol: symbol.to_string(),
        components: names,
        compositions: points,
        temperatures: vec![t],
        values: vec![values],
    })
}

/// Evaluate `symbol` at one composition over `temperatures`.
///
/// The balance marker of `composition`, if any, is ignored: only explicit
/// fractions are sent.
pub fn temperature_batch<E: EquilibriumEngine>(
    session: &mut Session<E>,
    composition: &CompositionSpec,
    temperatures: &TemperatureGrid,
    symbol: &str,
    minimizer: GridMinimizer,
) -> SweepResult<BatchTable> {
    temperatures.validate()?;
    let (names, row): (Vec<&str>, Vec<f64>) = composition.fractions().unzip();
    if let Some((name, value)) = composition
        .fractions()
        .find(|(_, v)| !v.is_finite() || !(0.0..=1.0).contains(v))
    {
        return Err(SessionError::InvalidFraction {
            component: name.to_string(),
            value,
        }
        .into());
    }
    let (batched, names) = batch_components(session, &names)?;
    let (components, fractions) = full_rows(session, &batched, std::slice::from_ref(&row))?;
    let points = temperatures.points();
    let request = BatchRequest {
        components,
        fractions,
        axis: BatchAxis::Temperature {
            temperatures: points.clone(),
        },
        symbol: symbol.to_string(),
        grid: minimizer,
    };
    debug!(points = request.len(), symbol, "temperature batch");
    let values = session.solve_batch(&request)?;
    Ok(BatchTable {
        symbol: symbol.to_string(),
        components: names,
        compositions: vec![row],
        temperatures: points,
        values: values.into_iter().map(|v| vec![v]).collect(),
    })
}

/// Composition batch repeated at every temperature (outer temperature, inner composition).
pub fn comp_temp_batch<E: EquilibriumEngine>(
    session: &mut Session<E>,
    grid: &CompositionGrid,
    temperatures: &TemperatureGrid,
    symbol: &str,
    minimizer: GridMinimizer,
) -> SweepResult<BatchTable> {
    temperatures.validate()?;
    grid.validate()?;
    let total = grid.len().saturating_mul(temperatures.len());
    if total > MAX_POINTS {
        return Err(SweepError::InvalidConfiguration(format!(
            "batch has {total} equilibria, at most {MAX_POINTS} allowed"
        )));
    }
    let points = temperatures.points();
    let mut table = BatchTable {
        symbol: symbol.to_string(),
        components: Vec::new(),
        compositions: Vec::new(),
        temperatures: Vec::with_capacity(points.len()),
        values: Vec::with_capacity(points.len()),
    };
    for t in points {
        let slice = composition_batch(session, grid, ef_core::k(t), symbol, minimizer)?;
        table.components = slice.components;
        table.compositions = slice.compositions;
        table.temperatures.push(t);
        table.values.extend(slice.values);
    }
    if table.temperatures.is_empty() {
        return Err(SweepError::InvalidConfiguration(
            "temperature grid is empty".to_string(),
        ));
    }
    info!(
        temperatures = table.temperatures.len(),
        compositions = table.compositions.len(),
        failed = table.failed_points(),
        "composition-temperature batch finished"
    );
    Ok(table)
}
