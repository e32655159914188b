//! Result data types.

use ef_session::NamedValues;
use ef_sweep::{BatchTable, Series, SweepTable};
use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    /// Scenario name the run was computed from.
    pub scenario: String,
    pub timestamp: String,
    pub run_type: RunType,
    pub engine_version: String,
    /// Name of the independent variable (`T`).
    pub variable: String,
    /// Symbol of the recorded quantity.
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_steps: Vec<usize>,
    /// Keys of the diagnostic series stored next to the values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunType {
    Single,
    TemperatureSweep { steps: usize, tracked: bool },
    ScalarSweep { steps: usize },
    Batch { temperatures: usize, compositions: usize },
    MeltingRange,
}

/// One step of a run, one JSON line in `steps.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    /// Independent variable value (temperature [K]).
    pub variable: f64,
    #[serde(default)]
    pub failed: bool,
    pub values: NamedValues,
    #[serde(default, skip_serializing_if = "NamedValues::is_empty")]
    pub probes: NamedValues,
    /// Keys the engine returned no number for (batch points).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

impl StepRecord {
    pub fn new(step: usize, variable: f64, values: NamedValues) -> Self {
        Self {
            step,
            variable,
            failed: false,
            values,
            probes: NamedValues::new(),
            missing: Vec::new(),
        }
    }
}

/// One record per sweep step, every key present.
pub fn records_from_table(table: &SweepTable) -> Vec<StepRecord> {
    (0..table.len())
        .map(|step| {
            let probes = table
                .probes
                .iter()
                .map(|s| (s.key.clone(), s.values.get(step).copied().unwrap_or(0.0)))
                .collect();
            StepRecord {
                failed: table.is_failed(step),
                probes,
                ..StepRecord::new(step, table.steps[step], table.row(step))
            }
        })
        .collect()
}

/// Rebuild a sweep table from stored records.
///
/// Series keep the order of first appearance; a key missing from a record
/// reads zero at that step.
pub fn table_from_records(
    variable: &str,
    quantity: &str,
    records: &[StepRecord],
) -> SweepTable {
    let n = records.len();
    let mut table = SweepTable::new(variable, quantity);
    for (i, record) in records.iter().enumerate() {
        table.steps.push(record.variable);
        if record.failed {
            table.failed_steps.push(i);
        }
        fill(&mut table.series, &record.values, i, n);
        fill(&mut table.probes, &record.probes, i, n);
    }
    table
}

fn fill(series: &mut Vec<Series>, values: &NamedValues, step: usize, len: usize) {
    for (key, value) in values.iter() {
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
        series[pos].values[step] = value;
    }
}

/// Label of composition row `c` of a batch, e.g. `CR=0.02;C=0.01`.
pub fn composition_label(batch: &BatchTable, c: usize) -> String {
    batch
        .components
        .iter()
        .zip(batch.compositions.get(c).map(Vec::as_slice).unwrap_or_default())
        .map(|(name, x)| format!("{name}={x}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// One record per batch temperature, keyed by composition label.
///
/// Points the engine could not solve are listed in `missing` instead of
/// being stored as NaN.
pub fn records_from_batch(batch: &BatchTable) -> Vec<StepRecord> {
    let labels = crate::export::batch_labels(batch);
    batch
        .temperatures
        .iter()
        .zip(&batch.values)
        .enumerate()
        .map(|(step, (t, row))| {
            let mut record = StepRecord::new(step, *t, NamedValues::new());
            for (label, value) in labels.iter().zip(row) {
                if value.is_finite() {
                    record.values.insert(label.clone(), *value);
                } else {
                    record.missing.push(label.clone());
                }
            }
            record
        })
        .collect()
}
