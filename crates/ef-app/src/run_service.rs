//! Run execution and caching service.

use ef_core::{k, kelvin};
use ef_engine::{SurrogateEngine, symbols};
use ef_project::schema::{CalculationDef, Scenario};
use ef_results::{
    RunManifest, RunStore, RunType, StepRecord, compute_run_id, records_from_batch,
    records_from_table, timestamp_now,
};
use ef_session::{LIQUID, NamedValues, Session};
use ef_sweep::{
    SweepOptions, comp_temp_batch, composition_batch, scalar_temperature_sweep,
    temperature_batch, temperature_sweep,
};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::compile::{self, ResolvedDatabase};
use crate::error::AppResult;
use crate::scenario_service;

/// Engine identity hashed into every run id.
pub const ENGINE_VERSION: &str = concat!("surrogate-", env!("CARGO_PKG_VERSION"));

/// Options for running scenarios.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    /// Let the engine print its own diagnostics.
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            verbose: false,
        }
    }
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub scenario_path: &'a Path,
    pub options: RunOptions,
}

/// Wall-clock breakdown of a run.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub compile_time_s: f64,
    pub solve_time_s: f64,
    pub save_time_s: f64,
    pub load_cache_time_s: f64,
    pub total_time_s: f64,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub timing: RunTimingSummary,
}

/// What a calculation produced, before it is stored.
struct RunData {
    run_type: RunType,
    variable: String,
    quantity: String,
    records: Vec<StepRecord>,
    failed_steps: Vec<usize>,
}

/// Execute a scenario, or load it from the run cache when an identical run exists.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();

    let scenario = scenario_service::load_scenario(request.scenario_path)?;
    let database = compile::resolve_database(&scenario, request.scenario_path)?;
    let run_id = compute_run_id(&scenario, &database.contents, ENGINE_VERSION);
    let store = RunStore::for_scenario(request.scenario_path)?;

    if request.options.use_cache && store.has_run(&run_id)? {
        let load_start = Instant::now();
        let manifest = store.load_manifest(&run_id)?;
        timing.load_cache_time_s = load_start.elapsed().as_secs_f64();
        timing.total_time_s = started.elapsed().as_secs_f64();
        info!(run_id = %run_id, "run loaded from cache");
        return Ok(RunResponse {
            run_id,
            manifest,
            loaded_from_cache: true,
            timing,
        });
    }

    let compile_start = Instant::now();
    let mut session = compile::open_session(&scenario, &database, request.options.verbose)?;
    timing.compile_time_s = compile_start.elapsed().as_secs_f64();

    let solve_start = Instant::now();
    let data = execute(&mut session, &scenario)?;
    timing.solve_time_s = solve_start.elapsed().as_secs_f64();

    let save_start = Instant::now();
    let manifest = RunManifest {
        run_id: run_id.clone(),
        scenario: scenario.name.clone(),
        timestamp: timestamp_now(),
        run_type: data.run_type,
        engine_version: ENGINE_VERSION.to_string(),
        variable: data.variable,
        quantity: data.quantity,
        failed_steps: data.failed_steps,
        probes: Vec::new(),
    };
    let manifest = store.save_run(&manifest, &data.records)?;
    let pruned = store.prune_engine_versions(&scenario.name, ENGINE_VERSION)?;
    if pruned > 0 {
        info!(scenario = %scenario.name, pruned, "runs from other engine versions removed");
    }
    timing.save_time_s = save_start.elapsed().as_secs_f64();
    timing.total_time_s = started.elapsed().as_secs_f64();

    info!(
        run_id = %run_id,
        steps = data.records.len(),
        failed = manifest.failed_steps.len(),
        "run completed"
    );
    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        timing,
    })
}

fn execute(session: &mut Session<SurrogateEngine>, scenario: &Scenario) -> AppResult<RunData> {
    let data = match &scenario.calculation {
        CalculationDef::Single {
            grid_minimizer,
            report,
        } => {
            session.solve(*grid_minimizer)?;
            let mut values = session.phase_values(symbols::PHASE_AMOUNT)?;
            for symbol in report {
                values.insert(symbol.clone(), session.scalar(symbol)?);
            }
            let t = kelvin(session.temperature()?);
            RunData {
                run_type: RunType::Single,
                variable: symbols::TEMPERATURE.to_string(),
                quantity: symbols::PHASE_AMOUNT.to_string(),
                records: vec![StepRecord::new(0, t, values)],
                failed_steps: Vec::new(),
            }
        }
        CalculationDef::TemperatureSweep {
            temperatures,
            quantity,
            grid_minimizer,
            tracking,
        } => {
            let options = SweepOptions {
                quantity: quantity.clone(),
                grid: *grid_minimizer,
                tracking: compile::split_tracking(tracking.as_ref()),
            };
            let table = temperature_sweep(session, temperatures, &options)?;
            RunData {
                run_type: RunType::TemperatureSweep {
                    steps: table.len(),
                    tracked: tracking.is_some(),
                },
                variable: table.variable.clone(),
                quantity: table.quantity.clone(),
                records: records_from_table(&table),
                failed_steps: table.failed_steps,
            }
        }
        CalculationDef::ScalarSweep {
            temperatures,
            symbol,
            grid_minimizer,
        } => {
            let table = scalar_temperature_sweep(session, temperatures, symbol, *grid_minimizer)?;
            RunData {
                run_type: RunType::ScalarSweep { steps: table.len() },
                variable: table.variable.clone(),
                quantity: table.quantity.clone(),
                records: records_from_table(&table),
                failed_steps: table.failed_steps,
            }
        }
        CalculationDef::CompositionBatch {
            grid,
            temperature_k,
            symbol,
            grid_minimizer,
        } => {
            let batch = composition_batch(session, grid, k(*temperature_k), symbol, *grid_minimizer)?;
            batch_data(&batch)
        }
        CalculationDef::TemperatureBatch {
            temperatures,
            symbol,
            grid_minimizer,
        } => {
            let composition = scenario.conditions.composition_spec();
            let batch =
                temperature_batch(session, &composition, temperatures, symbol, *grid_minimizer)?;
            batch_data(&batch)
        }
        CalculationDef::CompTempBatch {
            grid,
            temperatures,
            symbol,
            grid_minimizer,
        } => {
            let batch = comp_temp_batch(session, grid, temperatures, symbol, *grid_minimizer)?;
            batch_data(&batch)
        }
        CalculationDef::MeltingRange => {
            let range = session.melting_range(LIQUID)?;
            let mut values = NamedValues::new();
            values.insert("LIQUIDUS", kelvin(range.liquidus));
            values.insert("SOLIDUS", kelvin(range.solidus));
            values.insert("FREEZING_RANGE", range.freezing_range_k());
            RunData {
                run_type: RunType::MeltingRange,
                variable: symbols::TEMPERATURE.to_string(),
                quantity: symbols::TEMPERATURE.to_string(),
                records: vec![StepRecord::new(0, kelvin(range.solidus), values)],
                failed_steps: Vec::new(),
            }
        }
    };
    Ok(data)
}

fn batch_data(batch: &ef_sweep::BatchTable) -> RunData {
    RunData {
        run_type: RunType::Batch {
            temperatures: batch.temperatures.len(),
            compositions: batch.compositions.len(),
        },
        variable: symbols::TEMPERATURE.to_string(),
        quantity: batch.symbol.clone(),
        records: records_from_batch(batch),
        failed_steps: Vec::new(),
    }
}

/// Cached runs of the scenario at `scenario_path`, most recent first.
pub fn list_runs(scenario_path: &Path) -> AppResult<Vec<RunManifest>> {
    let scenario = scenario_service::load_scenario(scenario_path)?;
    let store = RunStore::for_scenario(scenario_path)?;

    Ok(store.list_runs(&scenario.name)?)
}

/// Load a specific run.
pub fn load_run(scenario_path: &Path, run_id: &str) -> AppResult<(RunManifest, Vec<StepRecord>)> {
    let store = RunStore::for_scenario(scenario_path)?;

    let manifest = store.load_manifest(run_id)?;
    let records = store.load_steps(run_id)?;

    Ok((manifest, records))
}

/// Display name of a resolved database.
pub fn database_label(database: &ResolvedDatabase) -> String {
    format!("{} ({})", database.database.name, database.path.display())
}
