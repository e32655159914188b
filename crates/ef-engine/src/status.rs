//! Phase status, grid minimizer and fraction-unit vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a phase in an equilibrium record.
///
/// Native codes follow the OpenCalphad convention: suspended -3, dormant -2,
/// entered 0, fixed 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Removed from consideration entirely.
    Suspended,
    /// Never stable, but its driving force is still computed.
    Dormant,
    /// Free to be stable or not.
    #[default]
    Entered,
    /// Stable with a pinned amount [mol]; replaces one condition as unknown.
    Fixed { amount: f64 },
}

impl PhaseStatus {
    pub const SUSPENDED_CODE: i32 = -3;
    pub const DORMANT_CODE: i32 = -2;
    pub const ENTERED_CODE: i32 = 0;
    pub const FIXED_CODE: i32 = 2;

    /// Native status code.
    pub fn code(self) -> i32 {
        match self {
            Self::Suspended => Self::SUSPENDED_CODE,
            Self::Dormant => Self::DORMANT_CODE,
            Self::Entered => Self::ENTERED_CODE,
            Self::Fixed { .. } => Self::FIXED_CODE,
        }
    }

    /// Build a status from a native code and the amount reported with it.
    pub fn from_code(code: i32, amount: f64) -> Option<Self> {
        match code {
            Self::SUSPENDED_CODE => Some(Self::Suspended),
            Self::DORMANT_CODE => Some(Self::Dormant),
            Self::ENTERED_CODE => Some(Self::Entered),
            Self::FIXED_CODE => Some(Self::Fixed { amount }),
            _ => None,
        }
    }

    /// Pinned amount for fixed phases, zero otherwise.
    pub fn amount(self) -> f64 {
        match self {
            Self::Fixed { amount } => amount,
            _ => 0.0,
        }
    }

    pub fn is_suspended(self) -> bool {
        matches!(self, Self::Suspended)
    }

    /// True when the phase may carry a nonzero amount at equilibrium.
    pub fn can_be_stable(self) -> bool {
        matches!(self, Self::Entered | Self::Fixed { .. })
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => write!(f, "suspended"),
            Self::Dormant => write!(f, "dormant"),
            Self::Entered => write!(f, "entered"),
            Self::Fixed { amount } => write!(f, "fixed ({amount})"),
        }
    }
}

/// Whether the engine runs its global grid search before Newton refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GridMinimizer {
    #[default]
    On,
    Off,
}

impl GridMinimizer {
    /// Native code: on 0, off -1.
    pub fn code(self) -> i32 {
        match self {
            Self::On => 0,
            Self::Off => -1,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for GridMinimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Unit of an element fraction condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FractionKind {
    /// Mole fraction, condition symbol `X`.
    #[default]
    MoleFraction,
    /// Mass fraction, condition symbol `W`.
    MassFraction,
}

impl FractionKind {
    /// Condition symbol understood by CALPHAD engines.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::MoleFraction => "X",
            Self::MassFraction => "W",
        }
    }

    /// Native unit code: mole fraction 1, mass fraction 2.
    pub fn code(self) -> i32 {
        match self {
            Self::MoleFraction => 1,
            Self::MassFraction => 2,
        }
    }
}

/// Which phases a status change applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSelector {
    /// Wildcard: every phase in the database.
    All,
    /// Explicit phase names (base names or composition-set names).
    Named(Vec<String>),
}

impl PhaseSelector {
    /// Build a selector from user-facing names, where `*` means all phases.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut named = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name == "*" {
                return Self::All;
            }
            if !name.is_empty() {
                named.push(name.to_string());
            }
        }
        Self::Named(named)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Native selector string: names joined with `;`, or `*`.
    pub fn to_native(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Named(names) => names.join(";"),
        }
    }
}

impl fmt::Display for PhaseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all phases"),
            Self::Named(names) => write!(f, "{}", names.join(", ")),
        }
    }
}
