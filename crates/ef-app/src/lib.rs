//! Shared application service layer for equiflow.
//!
//! Front ends go through this crate to load scenarios, compile them into a
//! session, execute the calculation and query cached runs.

pub mod compile;
pub mod error;
pub mod query;
pub mod run_service;
pub mod scenario_service;

pub use compile::{BUILTIN_DEMO_STEEL, ResolvedDatabase, open_session, resolve_database};
pub use error::{AppError, AppResult};
pub use query::{RunSummary, extract_series, get_run_summary, list_keys};
pub use run_service::{
    ENGINE_VERSION, RunOptions, RunRequest, RunResponse, RunTimingSummary, database_label,
    ensure_run, list_runs, load_run,
};
pub use scenario_service::{ScenarioSummary, load_scenario, save_scenario, summarize};
