//! Temperature sweeps over one session.

use crate::error::{SweepError, SweepResult};
use crate::grid::TemperatureGrid;
use crate::table::SweepTable;
use crate::tracking::{Assignment, RelabelPolicy, SplitObservation, SplitState, SplitTracking};
use ef_core::k;
use ef_engine::{EquilibriumEngine, GridMinimizer, PhaseName, symbols};
use ef_session::{NamedValues, Session, SessionError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What a sweep records at each step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "symbol", rename_all = "snake_case")]
pub enum SweepQuantity {
    /// One value per phase, e.g. `NP`.
    Phase(String),
    /// One value per component, e.g. `MU`.
    Component(String),
}

impl SweepQuantity {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Phase(s) | Self::Component(s) => s,
        }
    }
}

impl Default for SweepQuantity {
    fn default() -> Self {
        Self::Phase(symbols::PHASE_AMOUNT.to_string())
    }
}

/// Settings for `temperature_sweep`.
#[derive(Debug, Default)]
pub struct SweepOptions {
    pub quantity: SweepQuantity,
    pub grid: GridMinimizer,
    pub tracking: SplitTracking,
}

impl SweepOptions {
    pub fn phase(symbol: impl Into<String>) -> Self {
        Self {
            quantity: SweepQuantity::Phase(symbol.into()),
            ..Self::default()
        }
    }

    pub fn component(symbol: impl Into<String>) -> Self {
        Self {
            quantity: SweepQuantity::Component(symbol.into()),
            ..Self::default()
        }
    }

    pub fn with_grid(mut self, grid: GridMinimizer) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_tracking(mut self, tracking: SplitTracking) -> Self {
        self.tracking = tracking;
        self
    }
}

/// Sweep the active record over `temperatures`, in order.
///
/// Each step sets T, solves and reads the requested quantity. A failed solve
/// is recorded in `failed_steps` with zeros for every key, and the sweep goes
/// on. With `SplitTracking::Enabled`, composition sets created by the grid
/// minimizer are followed and relabeled (see `tracking`).
pub fn temperature_sweep<E: EquilibriumEngine>(
    session: &mut Session<E>,
    temperatures: &TemperatureGrid,
    options: &SweepOptions,
) -> SweepResult<SweepTable> {
    temperatures.validate()?;
    let mut tracker = match &options.tracking {
        SplitTracking::Disabled => None,
        SplitTracking::Enabled(tracked) => {
            if !matches!(options.quantity, SweepQuantity::Phase(_)) {
                return Err(SweepError::InvalidConfiguration(
                    "split tracking needs a phase-associated quantity".to_string(),
                ));
            }
            let tracer = session.component_index(&tracked.tracer)?;
            Some(Tracker::new(
                session.component_names()[tracer.0].clone(),
                tracked.policy.as_ref(),
            ))
        }
    };

    let points = temperatures.points();
    let last = points.len().saturating_sub(1);
    let mut table = SweepTable::new(symbols::TEMPERATURE, options.quantity.symbol());
    debug!(grid = %temperatures, quantity = options.quantity.symbol(), tracking = tracker.is_some(), "temperature sweep started");

    for t in points {
        let step = table.push_step(t);
        match observe(session, t, options) {
            Ok(observed) => match tracker.as_mut() {
                Some(tracker) => tracker.record(session, &mut table, &observed, step, step == last)?,
                None => {
                    for (key, value) in observed.iter() {
                        table.set(key, value);
                    }
                }
            },
            Err(err) if err.is_solve_failure() => {
                warn!(step, kelvin = t, error = %err, "sweep step failed");
                table.mark_failed(step);
            }
            Err(err) => return Err(err.into()),
        }
    }
    if let Some(tracker) = tracker {
        tracker.finish(&mut table);
    }

    info!(
        steps = table.len(),
        failed = table.failed_steps.len(),
        keys = table.series.len(),
        "temperature sweep finished"
    );
    Ok(table)
}

/// Sweep one scalar (e.g. `H` or `G`) over `temperatures`.
pub fn scalar_temperature_sweep<E: EquilibriumEngine>(
    session: &mut Session<E>,
    temperatures: &TemperatureGrid,
    symbol: &str,
    grid: GridMinimizer,
) -> SweepResult<SweepTable> {
    temperatures.validate()?;
    let mut table = SweepTable::new(symbols::TEMPERATURE, symbol);
    for t in temperatures.points() {
        let step = table.push_step(t);
        match scalar_at(session, t, symbol, grid) {
            Ok(v) => table.set(symbol, v),
            Err(err) if err.is_solve_failure() => {
                warn!(step, kelvin = t, error = %err, "sweep step failed");
                table.series_mut(symbol);
                table.mark_failed(step);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(table)
}

fn scalar_at<E: EquilibriumEngine>(
    session: &mut Session<E>,
    t: f64,
    symbol: &str,
    grid: GridMinimizer,
) -> Result<f64, SessionError> {
    session.set_temperature(Some(k(t)))?;
    session.solve(grid)?;
    session.scalar(symbol)
}

fn observe<E: EquilibriumEngine>(
    session: &mut Session<E>,
    t: f64,
    options: &SweepOptions,
) -> Result<NamedValues, SessionError> {
    session.set_temperature(Some(k(t)))?;
    session.solve(options.grid)?;
    match &options.quantity {
        SweepQuantity::Phase(symbol) => session.phase_values(symbol),
        SweepQuantity::Component(symbol) => session.component_values(symbol),
    }
}

/// Per-sweep state for dynamic-shape tracking.
struct Tracker<'a> {
    tracer: String,
    policy: &'a dyn RelabelPolicy,
    previous: Vec<String>,
    splits: Vec<SplitState>,
}

impl<'a> Tracker<'a> {
    fn new(tracer: String, policy: &'a dyn RelabelPolicy) -> Self {
        Self {
            tracer,
            policy,
            previous: Vec::new(),
            splits: Vec::new(),
        }
    }

    fn record<E: EquilibriumEngine>(
        &mut self,
        session: &mut Session<E>,
        table: &mut SweepTable,
        observed: &NamedValues,
        step: usize,
        is_last: bool,
    ) -> SweepResult<()> {
        let current: Vec<String> = observed.keys().map(str::to_string).collect();
        self.detect_splits(table, &current, step);

        // (target key, value, tracer probe) in engine order.
        let mut entries: Vec<(String, f64, f64)> = Vec::with_capacity(current.len());
        for (key, value) in observed.iter() {
            let probe = session
                .phase_composition(key)?
                .get(&self.tracer)
                .unwrap_or(0.0);
            entries.push((self.route(key), value, probe));
        }

        for split in &self.splits {
            let (Some(cont), Some(branch)) = (&split.continuation, &split.branch) else {
                continue;
            };
            if !current.contains(cont) || !current.contains(branch) {
                continue;
            }
            let ci = entries.iter().position(|e| &e.0 == cont);
            let bi = entries.iter().position(|e| &e.0 == branch);
            let (Some(ci), Some(bi)) = (ci, bi) else {
                continue;
            };
            let assignment = if is_last && split.first_step == step {
                Assignment::AsReturned
            } else {
                self.policy.assign(&SplitObservation {
                    parent: &split.parent,
                    continuation: cont,
                    branch,
                    continuation_tracer: entries[ci].2,
                    branch_tracer: entries[bi].2,
                    step,
                })
            };
            if assignment == Assignment::Swapped {
                debug!(step, continuation = %cont, branch = %branch, "composition sets relabeled");
                let (value, probe) = (entries[ci].1, entries[ci].2);
                entries[ci].1 = entries[bi].1;
                entries[ci].2 = entries[bi].2;
                entries[bi].1 = value;
                entries[bi].2 = probe;
            }
        }

        for (key, value, probe) in entries {
            table.set(&key, value);
            table.set_probe(&key, probe);
        }
        self.previous = current;
        Ok(())
    }

    /// Register composition sets that were not reported at the previous step.
    ///
    /// The parent is the plain-named phase of the same base seen at the
    /// previous step; when there is none (the sweep starts inside a split) the
    /// base name stands in for it.
    fn detect_splits(&mut self, table: &mut SweepTable, current: &[String], step: usize) {
        for key in current.iter().filter(|k| !self.previous.contains(*k)) {
            let name = PhaseName::new(key.as_str());
            if name.set_number().is_none() || table.has_series(key) {
                continue;
            }
            let seen_parent = self
                .previous
                .iter()
                .find(|p| {
                    let p = PhaseName::new(p.as_str());
                    p.set_number().is_none() && p.same_base(&name)
                })
                .cloned();
            let vanished = seen_parent.as_ref().is_some_and(|p| !current.contains(p));
            let parent = seen_parent.unwrap_or_else(|| name.base().to_string());

            let index = match self.splits.iter().position(|s| s.parent == parent) {
                Some(index) => index,
                None => {
                    self.splits.push(SplitState {
                        superseded: !current.contains(&parent),
                        parent: parent.clone(),
                        continuation: None,
                        branch: None,
                        first_step: step,
                    });
                    self.splits.len() - 1
                }
            };
            let split = &mut self.splits[index];
            // A branch may be reported before the parent gives up its plain name.
            if !name.is_auto() && !current.contains(&split.parent) {
                split.superseded = true;
            }
            if name.is_auto() {
                split.branch.get_or_insert_with(|| key.clone());
                table.series_mut(key);
                table.probe_mut(key);
            } else if split.superseded {
                split.continuation.get_or_insert_with(|| key.clone());
                if vanished {
                    backfill(table, &parent, key, step);
                }
            }
            debug!(step, parent = %parent, instance = %key, "composition set appeared");
        }
    }

    /// Key a value is recorded under: a superseded parent maps to its continuation.
    fn route(&self, key: &str) -> String {
        self.splits
            .iter()
            .find(|s| s.superseded && s.parent == key)
            .and_then(|s| s.continuation.clone())
            .unwrap_or_else(|| key.to_string())
    }

    /// Drop parent series replaced by a continuation.
    fn finish(self, table: &mut SweepTable) {
        for split in &self.splits {
            if split.superseded && split.continuation.is_some() {
                table.remove(&split.parent);
            }
        }
    }
}

/// Copy the parent's history (steps before `step`) into a new continuation series.
fn backfill(table: &mut SweepTable, parent: &str, key: &str, step: usize) {
    let history: Vec<f64> = table
        .series(parent)
        .map(|v| v[..step].to_vec())
        .unwrap_or_else(|| vec![0.0; step]);
    let probes: Vec<f64> = table
        .probe(parent)
        .map(|v| v[..step].to_vec())
        .unwrap_or_else(|| vec![0.0; step]);
    table.series_mut(key)[..step].copy_from_slice(&history);
    table.probe_mut(key)[..step].copy_from_slice(&probes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{NoRelabel, TrackedSplit};
    use ef_engine::{FractionKind, SurrogateDatabase, SurrogateEngine};
    use ef_session::SessionConfig;

    const DB: &str = "demo-steel.yaml";

    fn session(aliasing: bool) -> Session<SurrogateEngine> {
        let engine = SurrogateEngine::new()
            .with_database(DB, SurrogateDatabase::demo_steel())
            .with_split_aliasing(aliasing);
        let mut s = Session::open(engine, DB, &["C", "FE"], SessionConfig::default()).unwrap();
        s.set_element_fraction("C", 0.04, FractionKind::MoleFraction)
            .unwrap();
        s
    }

    #[test]
    fn fixed_shape_backfills_late_keys() {
        let mut s = session(false);
        let grid = TemperatureGrid::step(1450.0, 1550.0, 50.0);
        let table = temperature_sweep(&mut s, &grid, &SweepOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.is_aligned());
        // LIQUID only appears at 1500 K.
        assert_eq!(table.series("LIQUID").unwrap()[0], 0.0);
        assert!(table.series("LIQUID").unwrap()[1] > 0.0);
    }

    #[test]
    fn failed_step_is_zero_filled() {
        let mut s = session(false);
        s.engine_mut().inject_failure(995.0, 1005.0);
        let grid = TemperatureGrid::step(980.0, 1030.0, 10.0);
        let table = temperature_sweep(&mut s, &grid, &SweepOptions::default()).unwrap();
        assert_eq!(table.failed_steps, vec![2]);
        assert!(table.row(2).values().all(|v| v == 0.0));
        assert!(table.row(3).total() > 0.0);
        assert!(table.is_aligned());
    }

    #[test]
    fn tracking_requires_phase_quantity() {
        let mut s = session(false);
        let options = SweepOptions::component(symbols::CHEMICAL_POTENTIAL)
            .with_tracking(SplitTracking::Enabled(TrackedSplit::new("C")));
        let err = temperature_sweep(&mut s, &TemperatureGrid::step(900.0, 950.0, 10.0), &options)
            .unwrap_err();
        assert!(matches!(err, SweepError::InvalidConfiguration(_)));
    }

    #[test]
    fn unknown_tracer_is_rejected() {
        let mut s = session(false);
        let options = SweepOptions::default()
            .with_tracking(SplitTracking::Enabled(TrackedSplit::new("N")));
        assert!(matches!(
            temperature_sweep(&mut s, &TemperatureGrid::step(900.0, 950.0, 10.0), &options),
            Err(SweepError::Session(SessionError::UnknownComponent { .. }))
        ));
    }

    #[test]
    fn split_continuation_inherits_parent_history() {
        let mut s = session(false);
        let options = SweepOptions::default()
            .with_tracking(SplitTracking::Enabled(TrackedSplit::new("C")));
        let grid = TemperatureGrid::step(1180.0, 1230.0, 10.0);
        let table = temperature_sweep(&mut s, &grid, &options).unwrap();

        assert!(table.series("FCC_A1").is_none());
        let cont = table.series("FCC_A1#1").unwrap();
        let branch = table.series("FCC_A1_AUTO#2").unwrap();
        // 1180, 1190 before the split.
        assert_eq!(&cont[..2], &[1.0, 1.0]);
        assert_eq!(&branch[..2], &[0.0, 0.0]);
        for step in 2..table.len() {
            assert!((cont[step] + branch[step] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn parent_reappearing_goes_to_continuation() {
        let mut s = session(false);
        let options = SweepOptions::default()
            .with_tracking(SplitTracking::Enabled(TrackedSplit::new("C")));
        let grid = TemperatureGrid::step(1480.0, 1520.0, 10.0);
        let table = temperature_sweep(&mut s, &grid, &options).unwrap();
        // 1500 and 1510: split over, FCC_A1 back as a single set.
        let cont = table.series("FCC_A1#1").unwrap();
        let branch = table.series("FCC_A1_AUTO#2").unwrap();
        assert!(cont[2] > 0.0);
        assert_eq!(branch[2], 0.0);
        assert!(table.series("FCC_A1").is_none());
    }

    #[test]
    fn aliasing_is_undone_by_tracer_rank() {
        let mut s = session(true);
        let options = SweepOptions::default()
            .with_tracking(SplitTracking::Enabled(TrackedSplit::new("C")));
        let grid = TemperatureGrid::step(1200.0, 1300.0, 10.0);
        let table = temperature_sweep(&mut s, &grid, &options).unwrap();
        let cont = table.probe("FCC_A1#1").unwrap();
        let branch = table.probe("FCC_A1_AUTO#2").unwrap();
        for step in 0..table.len() - 1 {
            assert!(branch[step] > cont[step], "step {step}");
        }
    }

    #[test]
    fn no_relabel_keeps_engine_aliasing() {
        let mut s = session(true);
        let options = SweepOptions::default().with_tracking(SplitTracking::Enabled(
            TrackedSplit::new("C").with_policy(NoRelabel),
        ));
        let grid = TemperatureGrid::step(1200.0, 1300.0, 10.0);
        let table = temperature_sweep(&mut s, &grid, &options).unwrap();
        let cont = table.probe("FCC_A1#1").unwrap();
        let branch = table.probe("FCC_A1_AUTO#2").unwrap();
        assert!((0..table.len()).any(|i| cont[i] > branch[i]));
    }

    #[test]
    fn scalar_sweep_records_one_series() {
        let mut s = session(false);
        let grid = TemperatureGrid::linear(900.0, 1000.0, 3);
        let table =
            scalar_temperature_sweep(&mut s, &grid, symbols::ENTHALPY, GridMinimizer::On).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["H"]);
        assert_eq!(table.series("H").unwrap().len(), 3);
    }
}
