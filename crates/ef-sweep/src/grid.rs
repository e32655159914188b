//! Temperature and composition grids.
//!
//! Grids only generate points; they never touch a session. Composition grids
//! are row-major: the first axis is the outer loop.

use crate::error::{SweepError, SweepResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Most points one grid (or one composition-temperature batch) may hold.
pub const MAX_POINTS: usize = 1_000_000;

/// Ordered temperatures [K] for a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemperatureGrid {
    /// `count` uniformly spaced points, both ends included.
    Linear { start: f64, end: f64, count: usize },
    /// `start`, `start + step`, ... up to `end` (excluded unless `inclusive`).
    Step {
        start: f64,
        end: f64,
        step: f64,
        #[serde(default)]
        inclusive: bool,
    },
    /// Explicit temperatures, swept in the given order.
    Points { values: Vec<f64> },
}

impl TemperatureGrid {
    /// Relative slack when deciding whether a step lands on `end`.
    const END_SLACK: f64 = 1e-9;

    pub fn linear(start: f64, end: f64, count: usize) -> Self {
        Self::Linear { start, end, count }
    }

    /// Exclusive-end stepping, like a half-open range.
    pub fn step(start: f64, end: f64, step: f64) -> Self {
        Self::Step {
            start,
            end,
            step,
            inclusive: false,
        }
    }

    /// Check bounds and spacing.
    pub fn validate(&self) -> SweepResult<()> {
        let invalid = |msg: &str| Err(SweepError::InvalidConfiguration(msg.to_string()));
        match self {
            Self::Linear { start, end, count } => {
                if !start.is_finite() || !end.is_finite() {
                    return invalid("temperature bounds must be finite");
                }
                if *count == 0 {
                    return invalid("temperature grid needs at least one point");
                }
                if *count > 1 && (start - end).abs() < 1e-12 {
                    return invalid("start and end temperatures must differ");
                }
            }
            Self::Step {
                start, end, step, ..
            } => {
                if !start.is_finite() || !end.is_finite() || !step.is_finite() {
                    return invalid("temperature bounds and step must be finite");
                }
                if *step == 0.0 || (end - start).signum() != step.signum() {
                    return invalid("step must be nonzero and point from start towards end");
                }
            }
            Self::Points { values } => {
                if values.is_empty() {
                    return invalid("temperature grid needs at least one point");
                }
                if values.iter().any(|t| !t.is_finite()) {
                    return invalid("temperatures must be finite");
                }
            }
        }
        let count = self.len();
        if count > MAX_POINTS {
            return Err(SweepError::InvalidConfiguration(format!(
                "temperature grid has {count} points, at most {MAX_POINTS} allowed"
            )));
        }
        if self.points().iter().any(|t| *t <= 0.0) {
            return invalid("temperatures must be positive");
        }
        Ok(())
    }

    /// Generate all points in sweep order.
    pub fn points(&self) -> Vec<f64> {
        match self {
            Self::Linear { start, end, count } => ef_core::linspace(*start, *end, *count),
            Self::Step {
                start,
                end,
                step,
                inclusive,
            } => {
                // Index-based to avoid accumulating rounding error.
                (0..Self::step_count(*start, *end, *step, *inclusive))
                    .map(|i| start + i as f64 * step)
                    .collect()
            }
            Self::Points { values } => values.clone(),
        }
    }

    /// Number of points of a step grid, saturating; zero when the step
    /// points away from `end`.
    fn step_count(start: f64, end: f64, step: f64, inclusive: bool) -> usize {
        if step == 0.0 || (end - start).signum() != step.signum() {
            return 0;
        }
        let span = (end - start) / step;
        let slack = Self::END_SLACK * span.abs().max(1.0);
        let last = if inclusive {
            (span + slack).floor()
        } else {
            (span - slack).ceil() - 1.0
        };
        // Float-to-int casts saturate, and NaN becomes zero.
        (last + 1.0).max(0.0) as usize
    }

    /// Number of points, computed without generating them.
    pub fn len(&self) -> usize {
        match self {
            Self::Linear { count, .. } => *count,
            Self::Step {
                start,
                end,
                step,
                inclusive,
            } => Self::step_count(*start, *end, *step, *inclusive),
            Self::Points { values } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for TemperatureGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { start, end, count } => {
                write!(f, "T {start}..={end} K ({count} points)")
            }
            Self::Step {
                start,
                end,
                step,
                inclusive,
            } => {
                let op = if *inclusive { "..=" } else { ".." };
                write!(f, "T {start}{op}{end} K step {step}")
            }
            Self::Points { values } => write!(f, "T at {} points", values.len()),
        }
    }
}

/// Fraction values for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionAxis {
    pub component: String,
    pub values: Vec<f64>,
}

impl CompositionAxis {
    pub fn new(component: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            component: component.into(),
            values,
        }
    }

    /// `count` uniformly spaced fractions, both ends included.
    pub fn linear(component: impl Into<String>, start: f64, end: f64, count: usize) -> Self {
        Self::new(component, ef_core::linspace(start, end, count))
    }

    /// Fractions `start, start + step, ...` below `end`.
    pub fn step(component: impl Into<String>, start: f64, end: f64, step: f64) -> Self {
        Self::new(component, TemperatureGrid::step(start, end, step).points())
    }
}

/// Cartesian composition grid over one or more components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionGrid {
    pub axes: Vec<CompositionAxis>,
}

impl CompositionGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, axis: CompositionAxis) -> Self {
        self.axes.push(axis);
        self
    }

    /// Component names in axis order (the column order of `points`).
    pub fn components(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.component.as_str()).collect()
    }

    /// Number of points (product of axis lengths, saturating).
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes
            .iter()
            .fold(1usize, |n, a| n.saturating_mul(a.values.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All points, row-major: the first axis varies slowest.
    pub fn points(&self) -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = vec![Vec::new()];
        for axis in &self.axes {
            rows = rows
                .into_iter()
                .flat_map(|row| {
                    axis.values.iter().map(move |v| {
                        let mut next = row.clone();
                        next.push(*v);
                        next
                    })
                })
                .collect();
        }
        if self.axes.is_empty() { Vec::new() } else { rows }
    }

    /// Check axes, fraction ranges and that every point leaves room for a balance.
    pub fn validate(&self) -> SweepResult<()> {
        let invalid = |msg: String| Err(SweepError::InvalidConfiguration(msg));
        if self.axes.is_empty() {
            return invalid("composition grid needs at least one axis".to_string());
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if axis.values.is_empty() {
                return invalid(format!("axis {} has no values", axis.component));
            }
            if self.axes[..i]
                .iter()
                .any(|a| a.component.eq_ignore_ascii_case(&axis.component))
            {
                return invalid(format!("component {} appears twice", axis.component));
            }
            if let Some(v) = axis
                .values
                .iter()
                .find(|v| !v.is_finite() || !(0.0..=1.0).contains(*v))
            {
                return invalid(format!("fraction {v} of {} outside [0, 1]", axis.component));
            }
        }
        let count = self.len();
        if count > MAX_POINTS {
            return invalid(format!(
                "composition grid has {count} points, at most {MAX_POINTS} allowed"
            ));
        }
        let max_sum: f64 = self
            .axes
            .iter()
            .map(|a| a.values.iter().copied().fold(f64::MIN, f64::max))
            .sum();
        if max_sum > 1.0 + 1e-12 {
            return invalid(format!(
                "fractions can sum to {max_sum}, leaving nothing for the balance component"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn step_grid_excludes_end() {
        let grid = TemperatureGrid::step(600.0, 1800.0, 10.0);
        let points = grid.points();
        assert_eq!(points.len(), 120);
        assert_eq!(points[0], 600.0);
        assert_eq!(points[119], 1790.0);
    }

    #[test]
    fn inclusive_step_grid_keeps_end() {
        let grid = TemperatureGrid::Step {
            start: 600.0,
            end: 1800.0,
            step: 10.0,
            inclusive: true,
        };
        assert_eq!(grid.len(), 121);
    }

    #[test]
    fn descending_step_grid() {
        let points = TemperatureGrid::step(1000.0, 900.0, -25.0).points();
        assert_eq!(points, vec![1000.0, 975.0, 950.0, 925.0]);
    }

    #[test]
    fn step_pointing_away_is_invalid() {
        assert!(TemperatureGrid::step(600.0, 1800.0, -10.0).validate().is_err());
        assert!(TemperatureGrid::step(600.0, 1800.0, -10.0).is_empty());
    }

    #[test]
    fn linear_grid_hits_both_ends() {
        let points = TemperatureGrid::linear(300.0, 400.0, 5).points();
        assert_eq!(points.len(), 5);
        assert!((points[2] - 350.0).abs() < 1e-9);
        assert_eq!(points[4], 400.0);
    }

    #[test]
    fn oversized_grids_rejected_before_generating_points() {
        let fine = TemperatureGrid::step(300.0, 2000.0, 1e-6);
        assert!(fine.len() > MAX_POINTS);
        let err = fine.validate().unwrap_err().to_string();
        assert!(err.contains("at most"), "{err}");

        assert!(TemperatureGrid::linear(300.0, 400.0, MAX_POINTS + 1).validate().is_err());
        assert!(TemperatureGrid::linear(300.0, 400.0, MAX_POINTS).validate().is_ok());
        assert!(TemperatureGrid::step(300.0, 2000.0, 1e-300).validate().is_err());
    }

    #[test]
    fn step_len_matches_points() {
        for grid in [
            TemperatureGrid::step(600.0, 1800.0, 10.0),
            TemperatureGrid::step(1000.0, 900.0, -25.0),
            TemperatureGrid::step(600.0, 1800.0, -10.0),
            TemperatureGrid::Step {
                start: 600.0,
                end: 1800.0,
                step: 10.0,
                inclusive: true,
            },
        ] {
            assert_eq!(grid.len(), grid.points().len(), "{grid}");
        }
    }

    #[test]
    fn oversized_composition_grid_rejected() {
        let values: Vec<f64> = vec![0.0; 1001];
        let grid = CompositionGrid::new()
            .with_axis(CompositionAxis::new("CR", values.clone()))
            .with_axis(CompositionAxis::new("C", values));
        assert_eq!(grid.len(), 1001 * 1001);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn non_positive_temperature_rejected() {
        let grid = TemperatureGrid::Points {
            values: vec![300.0, 0.0],
        };
        assert!(grid.validate().is_err());
    }

    #[test]
    fn composition_grid_is_row_major() {
        let grid = CompositionGrid::new()
            .with_axis(CompositionAxis::new("CR", vec![0.01, 0.02]))
            .with_axis(CompositionAxis::new("C", vec![0.001, 0.002, 0.003]));
        let points = grid.points();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], vec![0.01, 0.001]);
        assert_eq!(points[1], vec![0.01, 0.002]);
        assert_eq!(points[3], vec![0.02, 0.001]);
        assert_eq!(grid.components(), vec!["CR", "C"]);
    }

    #[test]
    fn composition_grid_rejects_overfull_points() {
        let grid = CompositionGrid::new()
            .with_axis(CompositionAxis::new("CR", vec![0.6]))
            .with_axis(CompositionAxis::new("C", vec![0.5]));
        assert!(grid.validate().is_err());
    }

    #[test]
    fn composition_grid_rejects_duplicate_component() {
        let grid = CompositionGrid::new()
            .with_axis(CompositionAxis::new("CR", vec![0.1]))
            .with_axis(CompositionAxis::new("cr", vec![0.2]));
        assert!(grid.validate().is_err());
    }

    proptest! {
        #[test]
        fn row_major_index_matches_axes(n1 in 1usize..6, n2 in 1usize..6) {
            let a: Vec<f64> = (0..n1).map(|i| i as f64 * 0.01).collect();
            let b: Vec<f64> = (0..n2).map(|j| j as f64 * 0.001).collect();
            let grid = CompositionGrid::new()
                .with_axis(CompositionAxis::new("A", a.clone()))
                .with_axis(CompositionAxis::new("B", b.clone()));
            let points = grid.points();
            prop_assert_eq!(points.len(), n1 * n2);
            for i in 0..n1 {
                for j in 0..n2 {
                    prop_assert_eq!(&points[i * n2 + j], &vec![a[i], b[j]]);
                }
            }
        }

        #[test]
        fn step_grid_points_stay_below_end(start in 200.0f64..1000.0, span in 1.0f64..800.0, step in 0.5f64..50.0) {
            let end = start + span;
            let points = TemperatureGrid::step(start, end, step).points();
            prop_assert!(!points.is_empty());
            prop_assert!(points.iter().all(|t| *t < end));
            prop_assert!(points.windows(2).all(|w| w[1] > w[0]));
        }
    }
}
