//! Sublattice and constituent vocabulary.

use serde::{Deserialize, Serialize};

/// Name of the vacancy constituent.
pub const VACANCY: &str = "VA";

/// One sublattice of a phase in a solved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sublattice {
    /// Number of sites on the sublattice per formula unit.
    pub sites: f64,
    /// Site fraction of each constituent, in the engine's constituent order.
    pub constituents: Vec<(String, f64)>,
}

impl Sublattice {
    /// Site fraction of one constituent (case-insensitive), if present.
    pub fn site_fraction(&self, constituent: &str) -> Option<f64> {
        self.constituents
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(constituent))
            .map(|(_, y)| *y)
    }
}

/// Mass, charge and stoichiometry of a constituent species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentDescription {
    pub name: String,
    /// Molar mass [g/mol].
    pub mass: f64,
    pub charge: f64,
    /// Element stoichiometry, in component order. Empty for vacancies.
    pub elements: Vec<(String, f64)>,
}
