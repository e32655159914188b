use clap::{Parser, Subcommand};
use ef_app::{AppResult, RunOptions, RunRequest, RunTimingSummary, query, run_service};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "equiflow")]
#[command(about = "EquiFlow CLI - equilibrium sessions and sweeps", long_about = None)]
struct Cli {
    /// Debug logging and engine diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file
    Validate {
        /// Path to the scenario file (.yaml or .json)
        scenario_path: PathBuf,
    },
    /// Run the scenario's calculation
    Run {
        /// Path to the scenario file (.yaml or .json)
        scenario_path: PathBuf,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// List cached runs for a scenario
    Runs {
        /// Path to the scenario file (.yaml or .json)
        scenario_path: PathBuf,
    },
    /// Show details of a cached run
    ShowRun {
        /// Path to the scenario file (.yaml or .json)
        scenario_path: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export one recorded key of a run as CSV
    ExportSeries {
        /// Path to the scenario file (.yaml or .json)
        scenario_path: PathBuf,
        /// Run ID
        run_id: String,
        /// Phase, component or scalar key (e.g. FCC_A1_AUTO#2)
        key: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            no_cache,
        } => cmd_run(&scenario_path, !no_cache, cli.verbose),
        Commands::Runs { scenario_path } => cmd_runs(&scenario_path),
        Commands::ShowRun {
            scenario_path,
            run_id,
        } => cmd_show_run(&scenario_path, &run_id),
        Commands::ExportSeries {
            scenario_path,
            run_id,
            key,
            output,
        } => cmd_export_series(&scenario_path, &run_id, &key, output.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = ef_app::load_scenario(scenario_path)?;
    let database = ef_app::resolve_database(&scenario, scenario_path)?;
    let summary = ef_app::summarize(&scenario);
    println!("✓ Scenario is valid");
    println!("  Name: {}", summary.name);
    println!("  Database: {}", run_service::database_label(&database));
    println!("  Components: {}", summary.components.join(", "));
    println!("  Calculation: {} ({} points)", summary.calculation, summary.points);
    Ok(())
}

fn cmd_run(scenario_path: &Path, use_cache: bool, verbose: bool) -> AppResult<()> {
    println!("Running scenario: {}", scenario_path.display());

    let request = RunRequest {
        scenario_path,
        options: RunOptions { use_cache, verbose },
    };
    let response = run_service::ensure_run(&request)?;

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Calculation completed: {}", response.run_id);
    }
    print_timing_summary(&response.timing);

    let (manifest, records) = run_service::load_run(scenario_path, &response.run_id)?;
    let summary = query::get_run_summary(&records)?;
    println!("  Steps: {}", summary.record_count);
    println!("  Keys: {}", summary.key_count);
    if !manifest.failed_steps.is_empty() {
        warn!(
            run_id = %response.run_id,
            failed = ?manifest.failed_steps,
            "some steps did not solve and were zero-filled"
        );
        println!("  Failed steps: {}", manifest.failed_steps.len());
    }
    Ok(())
}

fn print_timing_summary(timing: &RunTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    println!("\nTiming summary:");
    if timing.load_cache_time_s > 0.0 {
        println!("  Cache load: {:.3}s", timing.load_cache_time_s);
    } else {
        println!(
            "  Compile: {:.3}s ({:.1}%)",
            timing.compile_time_s,
            100.0 * timing.compile_time_s / total
        );
        println!(
            "  Solve:   {:.3}s ({:.1}%)",
            timing.solve_time_s,
            100.0 * timing.solve_time_s / total
        );
        println!(
            "  Save:    {:.3}s ({:.1}%)",
            timing.save_time_s,
            100.0 * timing.save_time_s / total
        );
    }
    println!("  Total:   {:.3}s", timing.total_time_s);
}

fn cmd_runs(scenario_path: &Path) -> AppResult<()> {
    let runs = run_service::list_runs(scenario_path)?;

    if runs.is_empty() {
        println!("No cached runs found for: {}", scenario_path.display());
    } else {
        println!("Cached runs:");
        for manifest in runs {
            println!(
                "  {} ({}, {:?})",
                manifest.run_id, manifest.timestamp, manifest.run_type
            );
        }
    }
    Ok(())
}

fn cmd_show_run(scenario_path: &Path, run_id: &str) -> AppResult<()> {
    println!("Loading run: {}", run_id);

    let (manifest, records) = run_service::load_run(scenario_path, run_id)?;
    debug!(run_id, records = records.len(), engine = %manifest.engine_version, "run loaded");
    let summary = query::get_run_summary(&records)?;

    println!("\nRun Summary:");
    println!("  Scenario: {}", manifest.scenario);
    println!("  Type: {:?}", manifest.run_type);
    println!("  Engine: {}", manifest.engine_version);
    println!("  Steps: {}", summary.record_count);
    println!(
        "  {} range: {} - {}",
        manifest.variable, summary.variable_range.0, summary.variable_range.1
    );
    if summary.failed_count > 0 {
        println!("  Failed steps: {:?}", manifest.failed_steps);
    }

    println!("\nKeys ({}):", manifest.quantity);
    for key in query::list_keys(&records) {
        println!("  {}", key);
    }
    if !manifest.probes.is_empty() {
        println!("\nTracer keys: {}", manifest.probes.join(", "));
    }
    Ok(())
}

fn cmd_export_series(
    scenario_path: &Path,
    run_id: &str,
    key: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let (manifest, records) = run_service::load_run(scenario_path, run_id)?;
    let series = query::extract_series(&records, key)?;
    let csv = ef_results::records_to_csv(&records, &manifest.variable, key);

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        info!(run_id, key, points = series.len(), path = %path.display(), "series exported");
        println!("✓ Exported {} data points to {}", series.len(), path.display());
    } else {
        print!("{}", csv);
    }
    Ok(())
}
