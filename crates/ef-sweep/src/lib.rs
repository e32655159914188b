//! ef-sweep: temperature sweeps and batch equilibria over an `ef_session::Session`.
//!
//! Sweeps step a session through a temperature grid and collect one value per
//! phase (or component) per step into a `SweepTable`. With split tracking
//! enabled, composition sets created by the grid minimizer are followed under
//! stable keys instead of the names the engine happens to return.

pub mod batch;
pub mod error;
pub mod grid;
pub mod sweep;
pub mod table;
pub mod tracking;

pub use batch::{BatchTable, comp_temp_batch, composition_batch, temperature_batch};
pub use error::{SweepError, SweepResult};
pub use grid::{CompositionAxis, CompositionGrid, MAX_POINTS, TemperatureGrid};
pub use sweep::{SweepOptions, SweepQuantity, scalar_temperature_sweep, temperature_sweep};
pub use table::{Series, SweepTable};
pub use tracking::{
    Assignment, NoRelabel, RelabelPolicy, SplitObservation, SplitRole, SplitTracking, TracerRank,
    TrackedSplit,
};
