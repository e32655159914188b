//! Result symbols shared by the session, sweeps and the surrogate engine.
//!
//! Symbols are passed through to the engine verbatim, so any symbol a native
//! engine understands can be used; these are the ones equiflow itself needs.

/// Temperature [K] (scalar).
pub const TEMPERATURE: &str = "T";
/// Pressure [Pa] (scalar).
pub const PRESSURE: &str = "P";
/// Total amount [mol] (scalar).
pub const TOTAL_AMOUNT: &str = "N";
/// Gibbs energy [J] (scalar).
pub const GIBBS_ENERGY: &str = "G";
/// Molar Gibbs energy [J/mol] (scalar).
pub const MOLAR_GIBBS_ENERGY: &str = "GM";
/// Enthalpy [J] (scalar or per phase).
pub const ENTHALPY: &str = "H";
/// Chemical potential [J/mol] (per component).
pub const CHEMICAL_POTENTIAL: &str = "MU";
/// Overall mole fraction (per component).
pub const MOLE_FRACTION: &str = "X";
/// Overall mass fraction (per component).
pub const MASS_FRACTION: &str = "W";
/// Amount of phase [mol] (per phase).
pub const PHASE_AMOUNT: &str = "NP";
/// Phase fraction of the total amount (per phase).
pub const PHASE_FRACTION: &str = "NPM";
/// Driving force (per phase), zero for stable phases.
pub const DRIVING_FORCE: &str = "DGM";
