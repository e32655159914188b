//! Queries over stored step records.

use ef_results::StepRecord;

use crate::error::{AppError, AppResult};

/// Summary statistics for a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub record_count: usize,
    pub failed_count: usize,
    pub key_count: usize,
    pub variable_range: (f64, f64),
}

pub fn get_run_summary(records: &[StepRecord]) -> AppResult<RunSummary> {
    let first = records
        .first()
        .ok_or_else(|| AppError::Results("run has no records".to_string()))?;
    let (lo, hi) = records
        .iter()
        .fold((first.variable, first.variable), |(lo, hi), r| {
            (lo.min(r.variable), hi.max(r.variable))
        });
    Ok(RunSummary {
        record_count: records.len(),
        failed_count: records.iter().filter(|r| r.failed).count(),
        key_count: list_keys(records).len(),
        variable_range: (lo, hi),
    })
}

/// Every key present in any record, in order of first appearance.
pub fn list_keys(records: &[StepRecord]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for record in records {
        for key in record.values.keys().chain(record.missing.iter().map(String::as_str)) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }
    keys
}

/// `(variable, value)` pairs of one key; steps without the key are skipped.
pub fn extract_series(records: &[StepRecord], key: &str) -> AppResult<Vec<(f64, f64)>> {
    let series: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.values.get(key).map(|v| (r.variable, v)))
        .collect();
    if series.is_empty() {
        return Err(AppError::KeyNotFound(key.to_string()));
    }
    Ok(series)
}
