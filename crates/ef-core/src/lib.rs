//! ef-core: stable foundation for equiflow.
//!
//! Contains:
//! - units (uom SI types + constructors for T, P, N)
//! - numeric (Real + tolerances + float helpers)
//! - ids (compact handles for records, components and phases)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{EfError, EfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
