//! Scenario schema definitions.

use ef_core::constants::P_STANDARD_PA;
use ef_engine::{FractionKind, GridMinimizer, PhaseSelector, PhaseStatus};
use ef_session::{CompositionSpec, SessionConfig};
use ef_sweep::{CompositionGrid, SweepQuantity, TemperatureGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Database path, relative to the scenario file, or a built-in name.
    pub database: String,
    /// Requested components; empty loads every element of the database.
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub conditions: ConditionsDef,
    #[serde(default)]
    pub phases: PhasesDef,
    pub calculation: CalculationDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionsDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_k: Option<f64>,
    #[serde(default = "standard_pressure")]
    pub pressure_pa: f64,
    #[serde(default = "one_mole")]
    pub total_amount_mol: f64,
    #[serde(default)]
    pub fraction_kind: FractionKind,
    /// Component -> fraction, or `balance` for the one that closes the sum.
    #[serde(default)]
    pub composition: BTreeMap<String, FractionDef>,
}

fn standard_pressure() -> f64 {
    P_STANDARD_PA
}

fn one_mole() -> f64 {
    1.0
}

impl Default for ConditionsDef {
    fn default() -> Self {
        Self {
            temperature_k: None,
            pressure_pa: standard_pressure(),
            total_amount_mol: one_mole(),
            fraction_kind: FractionKind::default(),
            composition: BTreeMap::new(),
        }
    }
}

impl ConditionsDef {
    pub fn composition_spec(&self) -> CompositionSpec {
        self.composition
            .iter()
            .fold(CompositionSpec::new(), |spec, (name, fraction)| match fraction {
                FractionDef::Value(v) => spec.with(name.as_str(), *v),
                FractionDef::Marker(FractionMarker::Balance) => spec.with_balance(name.as_str()),
            })
    }

    /// Name of the component marked `balance`, if any.
    pub fn balance(&self) -> Option<&str> {
        self.composition
            .iter()
            .find(|(_, f)| matches!(f, FractionDef::Marker(FractionMarker::Balance)))
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FractionDef {
    Value(f64),
    Marker(FractionMarker),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FractionMarker {
    Balance,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhasesDef {
    /// When non-empty, every other phase is suspended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entered: Vec<String>,
    /// Status changes applied after `entered`, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<PhaseStatusDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseStatusDef {
    /// Phase names; `*` selects every phase.
    pub phases: Vec<String>,
    pub status: StatusKindDef,
    /// Pinned amount [mol] for `fixed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl PhaseStatusDef {
    pub fn selector(&self) -> PhaseSelector {
        PhaseSelector::from_names(&self.phases)
    }

    pub fn to_status(&self) -> PhaseStatus {
        match self.status {
            StatusKindDef::Suspended => PhaseStatus::Suspended,
            StatusKindDef::Dormant => PhaseStatus::Dormant,
            StatusKindDef::Entered => PhaseStatus::Entered,
            StatusKindDef::Fixed => PhaseStatus::Fixed {
                amount: self.amount.unwrap_or(0.0),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusKindDef {
    Suspended,
    Dormant,
    Entered,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationDef {
    /// One equilibrium at the scenario conditions.
    Single {
        #[serde(default)]
        grid_minimizer: GridMinimizer,
        /// Extra scalars to report, e.g. `H`.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        report: Vec<String>,
    },
    TemperatureSweep {
        temperatures: TemperatureGrid,
        #[serde(default)]
        quantity: SweepQuantity,
        #[serde(default)]
        grid_minimizer: GridMinimizer,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracking: Option<TrackingDef>,
    },
    ScalarSweep {
        temperatures: TemperatureGrid,
        symbol: String,
        #[serde(default)]
        grid_minimizer: GridMinimizer,
    },
    CompositionBatch {
        grid: CompositionGrid,
        temperature_k: f64,
        symbol: String,
        #[serde(default)]
        grid_minimizer: GridMinimizer,
    },
    /// Batch over temperatures at the scenario composition.
    TemperatureBatch {
        temperatures: TemperatureGrid,
        symbol: String,
        #[serde(default)]
        grid_minimizer: GridMinimizer,
    },
    CompTempBatch {
        grid: CompositionGrid,
        temperatures: TemperatureGrid,
        symbol: String,
        #[serde(default)]
        grid_minimizer: GridMinimizer,
    },
    /// Liquidus and solidus at the scenario composition.
    MeltingRange,
}

impl CalculationDef {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::TemperatureSweep { .. } => "temperature_sweep",
            Self::ScalarSweep { .. } => "scalar_sweep",
            Self::CompositionBatch { .. } => "composition_batch",
            Self::TemperatureBatch { .. } => "temperature_batch",
            Self::CompTempBatch { .. } => "comp_temp_batch",
            Self::MeltingRange => "melting_range",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingDef {
    /// Component whose fraction tells split instances apart.
    pub tracer: String,
    #[serde(default)]
    pub relabel: RelabelDef,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelabelDef {
    #[default]
    RicherToBranch,
    RicherToContinuation,
    None,
}
