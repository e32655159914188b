//! CSV export.

use crate::types::{StepRecord, composition_label};
use ef_sweep::{BatchTable, SweepTable};
use std::fmt::Write;

/// One row per step: variable, one column per key, then `failed`.
pub fn table_to_csv(table: &SweepTable) -> String {
    let mut csv = String::new();
    csv.push_str(&table.variable);
    for key in table.keys() {
        csv.push(',');
        csv.push_str(key);
    }
    csv.push_str(",failed\n");
    for (step, x) in table.steps.iter().enumerate() {
        let _ = write!(csv, "{x}");
        for series in &table.series {
            let _ = write!(csv, ",{}", series.values.get(step).copied().unwrap_or(0.0));
        }
        let _ = writeln!(csv, ",{}", u8::from(table.is_failed(step)));
    }
    csv
}

/// Long format: temperature, one column per batch component, value.
///
/// Unsolved points are written with an empty value.
pub fn batch_to_csv(batch: &BatchTable) -> String {
    let mut csv = String::from("T");
    for component in &batch.components {
        csv.push(',');
        csv.push_str(component);
    }
    let _ = writeln!(csv, ",{}", batch.symbol);
    for (t, row) in batch.temperatures.iter().zip(&batch.values) {
        for (composition, value) in batch.compositions.iter().zip(row) {
            let _ = write!(csv, "{t}");
            for x in composition {
                let _ = write!(csv, ",{x}");
            }
            if value.is_finite() {
                let _ = writeln!(csv, ",{value}");
            } else {
                csv.push_str(",\n");
            }
        }
    }
    csv
}

/// One key over all stored steps: `variable,value`.
pub fn records_to_csv(records: &[StepRecord], variable: &str, key: &str) -> String {
    let mut csv = format!("{variable},{key}\n");
    for record in records {
        let _ = writeln!(csv, "{},{}", record.variable, record.values.get(key).unwrap_or(0.0));
    }
    csv
}

/// Composition labels of a batch, in column order.
pub fn batch_labels(batch: &BatchTable) -> Vec<String> {
    (0..batch.compositions.len())
        .map(|c| composition_label(batch, c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_sweep::Series;

    #[test]
    fn sweep_csv_has_header_and_failed_column() {
        let mut table = SweepTable::new("T", "NP");
        table.steps = vec![900.0, 910.0];
        table.series = vec![Series {
            key: "FCC_A1".to_string(),
            values: vec![1.0, 0.0],
        }];
        table.failed_steps = vec![1];
        assert_eq!(table_to_csv(&table), "T,FCC_A1,failed\n900,1,0\n910,0,1\n");
    }

    #[test]
    fn batch_csv_is_long_format() {
        let batch = BatchTable {
            symbol: "G".to_string(),
            components: vec!["CR".to_string(), "C".to_string()],
            compositions: vec![vec![0.02, 0.01], vec![0.04, 0.01]],
            temperatures: vec![1000.0],
            values: vec![vec![-5.0, f64::NAN]],
        };
        assert_eq!(
            batch_to_csv(&batch),
            "T,CR,C,G\n1000,0.02,0.01,-5\n1000,0.04,0.01,\n"
        );
        assert_eq!(batch_labels(&batch), vec!["CR=0.02;C=0.01", "CR=0.04;C=0.01"]);
    }
}
