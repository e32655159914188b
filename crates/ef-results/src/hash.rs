//! Content-based hashing for run IDs.

use ef_project::schema::Scenario;
use sha2::{Digest, Sha256};

/// Run id from everything that determines the result: the scenario, the
/// database contents and the engine version.
pub fn compute_run_id(scenario: &Scenario, database: &[u8], engine_version: &str) -> String {
    let mut hasher = Sha256::new();

    let scenario_json = serde_json::to_string(scenario).unwrap_or_default();
    hasher.update(scenario_json.as_bytes());

    hasher.update(database);
    hasher.update(engine_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(temperature_k: f64) -> Scenario {
        ef_project::from_yaml_str(&format!(
            r#"
version: 1
name: hash
database: demo-steel
components: [FE, C]
conditions:
  temperature_k: {temperature_k}
  composition: {{ FE: balance, C: 0.02 }}
calculation:
  kind: single
"#
        ))
        .unwrap()
    }

    #[test]
    fn hash_stability() {
        let s = scenario(1173.0);
        let hash1 = compute_run_id(&s, b"db", "v1");
        let hash2 = compute_run_id(&s, b"db", "v1");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = compute_run_id(&scenario(1173.0), b"db", "v1");
        assert_ne!(a, compute_run_id(&scenario(1273.0), b"db", "v1"));
        assert_ne!(a, compute_run_id(&scenario(1173.0), b"db2", "v1"));
        assert_ne!(a, compute_run_id(&scenario(1173.0), b"db", "v2"));
    }
}
