//! Conditions and batch requests passed across the engine boundary.

use crate::status::{FractionKind, GridMinimizer};
use ef_core::ComponentIndex;

/// One condition on an equilibrium record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// Temperature [K].
    Temperature(f64),
    /// Remove the temperature condition so T becomes an unknown.
    UnsetTemperature,
    /// Pressure [Pa].
    Pressure(f64),
    /// Total amount [mol].
    TotalAmount(f64),
    /// Overall element fraction of one component.
    Fraction {
        kind: FractionKind,
        component: ComponentIndex,
        value: f64,
    },
}

impl Condition {
    /// Condition symbol as written by CALPHAD engines.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Temperature(_) | Self::UnsetTemperature => "T",
            Self::Pressure(_) => "P",
            Self::TotalAmount(_) => "N",
            Self::Fraction { kind, .. } => kind.symbol(),
        }
    }
}

/// Independent variable of a batch calculation.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchAxis {
    /// One point per composition row, all at a fixed temperature [K].
    Composition { temperature: f64 },
    /// One point per temperature [K], all at the single composition row.
    Temperature { temperatures: Vec<f64> },
}

/// A batch of equilibria evaluated by the engine in one call.
///
/// Each row of `fractions` gives mole fractions for `components`, in the same
/// order; the component left out of `components` is the balance.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub components: Vec<ComponentIndex>,
    pub fractions: Vec<Vec<f64>>,
    pub axis: BatchAxis,
    /// Scalar symbol evaluated at each point (e.g. `G`).
    pub symbol: String,
    pub grid: GridMinimizer,
}

impl BatchRequest {
    /// Number of values the engine returns for this request.
    pub fn len(&self) -> usize {
        match &self.axis {
            BatchAxis::Composition { .. } => self.fractions.len(),
            BatchAxis::Temperature { temperatures } => temperatures.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check row widths and axis shape before handing the request over.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(row) = self
            .fractions
            .iter()
            .find(|row| row.len() != self.components.len())
        {
            return Err(format!(
                "row has {} fractions for {} components",
                row.len(),
                self.components.len()
            ));
        }
        if let BatchAxis::Temperature { .. } = self.axis
            && self.fractions.len() != 1
        {
            return Err(format!(
                "temperature batch needs exactly one composition row, got {}",
                self.fractions.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(axis: BatchAxis, rows: Vec<Vec<f64>>) -> BatchRequest {
        BatchRequest {
            components: vec![ComponentIndex(1), ComponentIndex(2)],
            fractions: rows,
            axis,
            symbol: "G".to_string(),
            grid: GridMinimizer::On,
        }
    }

    #[test]
    fn composition_batch_len() {
        let req = request(
            BatchAxis::Composition { temperature: 873.15 },
            vec![vec![0.01, 0.02], vec![0.02, 0.02], vec![0.03, 0.02]],
        );
        assert_eq!(req.len(), 3);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn temperature_batch_needs_one_row() {
        let req = request(
            BatchAxis::Temperature {
                temperatures: vec![500.0, 600.0],
            },
            vec![vec![0.01, 0.02], vec![0.02, 0.02]],
        );
        assert!(req.validate().is_err());
    }

    #[test]
    fn ragged_rows_rejected() {
        let req = request(
            BatchAxis::Composition { temperature: 873.15 },
            vec![vec![0.01]],
        );
        assert!(req.validate().unwrap_err().contains("1 fractions"));
    }

    #[test]
    fn condition_symbols() {
        assert_eq!(Condition::UnsetTemperature.symbol(), "T");
        let x = Condition::Fraction {
            kind: FractionKind::MassFraction,
            component: ComponentIndex(0),
            value: 0.1,
        };
        assert_eq!(x.symbol(), "W");
    }
}
