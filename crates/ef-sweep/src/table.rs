//! Parameter-indexed result tables.

use ef_session::NamedValues;
use serde::{Deserialize, Serialize};

/// Values of one key (phase or component) at every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub key: String,
    pub values: Vec<f64>,
}

/// Ordered sweep results.
///
/// Invariant: every series holds exactly one value per step. Keys that are
/// absent at a step, and every key at a failed step, read zero there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepTable {
    /// Name of the independent variable (e.g. `T`).
    pub variable: String,
    /// Symbol of the recorded quantity (e.g. `NP`).
    pub quantity: String,
    /// Independent variable value at each step.
    pub steps: Vec<f64>,
    /// Series in order of first appearance.
    pub series: Vec<Series>,
    /// Steps whose equilibrium failed.
    #[serde(default)]
    pub failed_steps: Vec<usize>,
    /// Tracer fraction per phase key at each step (dynamic tracking only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<Series>,
}

impl SweepTable {
    pub fn new(variable: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            quantity: quantity.into(),
            ..Self::default()
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.key.as_str())
    }

    pub fn series(&self, key: &str) -> Option<&[f64]> {
        find(&self.series, key).map(|s| s.values.as_slice())
    }

    pub fn probe(&self, key: &str) -> Option<&[f64]> {
        find(&self.probes, key).map(|s| s.values.as_slice())
    }

    /// Value of `key` at `step`; zero for keys never seen.
    pub fn value(&self, key: &str, step: usize) -> f64 {
        self.series(key)
            .and_then(|v| v.get(step).copied())
            .unwrap_or(0.0)
    }

    /// All keys at one step.
    pub fn row(&self, step: usize) -> NamedValues {
        self.series
            .iter()
            .map(|s| (s.key.clone(), s.values.get(step).copied().unwrap_or(0.0)))
            .collect()
    }

    pub fn is_failed(&self, step: usize) -> bool {
        self.failed_steps.contains(&step)
    }

    /// True when every series (and probe) has one value per step.
    pub fn is_aligned(&self) -> bool {
        let n = self.steps.len();
        self.series
            .iter()
            .chain(&self.probes)
            .all(|s| s.values.len() == n)
    }

    /// Start a new step: every existing series gets a zero placeholder.
    pub(crate) fn push_step(&mut self, x: f64) -> usize {
        self.steps.push(x);
        for s in self.series.iter_mut().chain(self.probes.iter_mut()) {
            s.values.push(0.0);
        }
        self.steps.len() - 1
    }

    pub(crate) fn mark_failed(&mut self, step: usize) {
        self.failed_steps.push(step);
    }

    /// Series for `key`, created zero-filled up to the current step if new.
    pub(crate) fn series_mut(&mut self, key: &str) -> &mut Vec<f64> {
        let n = self.steps.len();
        &mut entry(&mut self.series, key, n).values
    }

    pub(crate) fn probe_mut(&mut self, key: &str) -> &mut Vec<f64> {
        let n = self.steps.len();
        &mut entry(&mut self.probes, key, n).values
    }

    /// Set `key` at the current (last) step.
    pub(crate) fn set(&mut self, key: &str, value: f64) {
        if let Some(slot) = self.series_mut(key).last_mut() {
            *slot = value;
        }
    }

    pub(crate) fn set_probe(&mut self, key: &str, value: f64) {
        if let Some(slot) = self.probe_mut(key).last_mut() {
            *slot = value;
        }
    }

    pub(crate) fn has_series(&self, key: &str) -> bool {
        find(&self.series, key).is_some()
    }

    /// Drop a series (and its probe) entirely.
    pub(crate) fn remove(&mut self, key: &str) {
        self.series.retain(|s| s.key != key);
        self.probes.retain(|s| s.key != key);
    }
}

fn find<'a>(series: &'a [Series], key: &str) -> Option<&'a Series> {
    series.iter().find(|s| s.key == key)
}

fn entry<'a>(series: &'a mut Vec<Series>, key: &str, len: usize) -> &'a mut Series {
    let pos = match series.iter().position(|s| s.key == key) {
        Some(pos) => pos,
        None => {
            series.push(Series {
                key: key.to_string(),
                values: vec![0.0; len],
            });
            series.len() - 1
        }
    };
    &mut series[pos]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_keys_are_backfilled_with_zeros() {
        let mut table = SweepTable::new("T", "NP");
        table.push_step(600.0);
        table.set("BCC_A2", 1.0);
        table.push_step(610.0);
        table.set("BCC_A2", 0.5);
        table.set("FCC_A1", 0.5);
        table.push_step(620.0);

        assert!(table.is_aligned());
        assert_eq!(table.series("FCC_A1").unwrap(), &[0.0, 0.5, 0.0]);
        assert_eq!(table.series("BCC_A2").unwrap(), &[1.0, 0.5, 0.0]);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["BCC_A2", "FCC_A1"]);
    }

    #[test]
    fn row_and_value_lookup() {
        let mut table = SweepTable::new("T", "NP");
        table.push_step(600.0);
        table.set("LIQUID", 0.25);
        assert_eq!(table.value("LIQUID", 0), 0.25);
        assert_eq!(table.value("SIGMA", 0), 0.0);
        assert_eq!(table.row(0).get("LIQUID"), Some(0.25));
    }

    #[test]
    fn remove_drops_series_and_probe() {
        let mut table = SweepTable::new("T", "NP");
        table.push_step(600.0);
        table.set("FCC_A1", 1.0);
        table.set_probe("FCC_A1", 0.02);
        table.remove("FCC_A1");
        assert!(table.series("FCC_A1").is_none());
        assert!(table.probe("FCC_A1").is_none());
    }
}
