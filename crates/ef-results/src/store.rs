//! On-disk run cache.
//!
//! Layout under the store root:
//!
//! ```text
//! index.json                         manifests of every stored run
//! <scenario>/<engine>/<run-id>/
//!     manifest.json
//!     steps.jsonl                    one StepRecord per line
//! ```
//!
//! Runs are grouped by scenario and engine version, so records computed by
//! another engine build are never mixed into a listing. Lookups go through
//! the index; the tree is never walked.

use crate::types::{RunManifest, StepRecord};
use crate::{ResultsError, ResultsResult};
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";
const MANIFEST_FILE: &str = "manifest.json";
const STEPS_FILE: &str = "steps.jsonl";

#[derive(Debug, Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    /// Store under `.equiflow/runs` next to the scenario file.
    pub fn for_scenario(scenario_path: &Path) -> ResultsResult<Self> {
        let scenario_dir = scenario_path
            .parent()
            .ok_or_else(|| ResultsError::InvalidPath {
                message: "scenario path has no parent directory".to_string(),
            })?;
        Self::new(scenario_dir.join(".equiflow").join("runs"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn run_dir(&self, manifest: &RunManifest) -> PathBuf {
        self.root_dir
            .join(slug(&manifest.scenario))
            .join(slug(&manifest.engine_version))
            .join(&manifest.run_id)
    }

    fn read_index(&self) -> ResultsResult<Vec<RunManifest>> {
        let path = self.root_dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn write_index(&self, index: &[RunManifest]) -> ResultsResult<()> {
        let tmp = self.root_dir.join(format!("{INDEX_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_string_pretty(index)?)?;
        fs::rename(tmp, self.root_dir.join(INDEX_FILE))?;
        Ok(())
    }

    fn indexed(&self, run_id: &str) -> ResultsResult<RunManifest> {
        self.read_index()?
            .into_iter()
            .find(|m| m.run_id == run_id)
            .ok_or_else(|| ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// True when `run_id` is indexed and its files are still on disk.
    pub fn has_run(&self, run_id: &str) -> ResultsResult<bool> {
        Ok(match self.indexed(run_id) {
            Ok(manifest) => self.run_dir(&manifest).join(STEPS_FILE).exists(),
            Err(ResultsError::RunNotFound { .. }) => false,
            Err(e) => return Err(e),
        })
    }

    /// Store one run and return its manifest as written.
    ///
    /// The stored manifest lists the tracer keys found in `records`. Its
    /// failed steps must be exactly the records flagged as failed.
    pub fn save_run(
        &self,
        manifest: &RunManifest,
        records: &[StepRecord],
    ) -> ResultsResult<RunManifest> {
        check_records(manifest, records).map_err(|message| ResultsError::InvalidRun {
            run_id: manifest.run_id.clone(),
            message,
        })?;

        let mut stored = manifest.clone();
        stored.probes.clear();
        for record in records {
            for key in record.probes.keys() {
                if !stored.probes.iter().any(|k| k == key) {
                    stored.probes.push(key.to_string());
                }
            }
        }

        let run_dir = self.run_dir(&stored);
        fs::create_dir_all(&run_dir)?;
        fs::write(run_dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&stored)?)?;
        let mut lines = String::new();
        for record in records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }
        fs::write(run_dir.join(STEPS_FILE), lines)?;

        let mut index = self.read_index()?;
        index.retain(|m| m.run_id != stored.run_id);
        index.push(stored.clone());
        self.write_index(&index)?;
        Ok(stored)
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let indexed = self.indexed(run_id)?;
        let path = self.run_dir(&indexed).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Step records of a run, checked against its manifest.
    pub fn load_steps(&self, run_id: &str) -> ResultsResult<Vec<StepRecord>> {
        let manifest = self.load_manifest(run_id)?;
        let path = self.run_dir(&manifest).join(STEPS_FILE);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let records = fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<StepRecord>(line))
            .collect::<Result<Vec<_>, _>>()?;
        check_records(&manifest, &records).map_err(|message| ResultsError::InvalidRun {
            run_id: run_id.to_string(),
            message,
        })?;
        Ok(records)
    }

    /// Runs of the scenario named `scenario`, most recent first.
    pub fn list_runs(&self, scenario: &str) -> ResultsResult<Vec<RunManifest>> {
        let mut runs: Vec<RunManifest> = self
            .read_index()?
            .into_iter()
            .filter(|m| m.scenario == scenario)
            .collect();
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    /// Delete the runs of `scenario` computed by any engine other than
    /// `engine_version`. Returns how many were removed.
    pub fn prune_engine_versions(&self, scenario: &str, engine_version: &str) -> ResultsResult<usize> {
        let (stale, kept): (Vec<_>, Vec<_>) = self
            .read_index()?
            .into_iter()
            .partition(|m| m.scenario == scenario && m.engine_version != engine_version);
        for manifest in &stale {
            let dir = self.run_dir(manifest);
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        if !stale.is_empty() {
            self.write_index(&kept)?;
        }
        Ok(stale.len())
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let mut index = self.read_index()?;
        let Some(pos) = index.iter().position(|m| m.run_id == run_id) else {
            return Ok(());
        };
        let manifest = index.remove(pos);
        let dir = self.run_dir(&manifest);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        self.write_index(&index)
    }
}

/// Steps numbered `0..n` in order, failed flags matching the manifest.
fn check_records(manifest: &RunManifest, records: &[StepRecord]) -> Result<(), String> {
    if let Some((i, record)) = records.iter().enumerate().find(|(i, r)| r.step != *i) {
        return Err(format!("record {i} is numbered step {}", record.step));
    }
    let failed: Vec<usize> = records.iter().filter(|r| r.failed).map(|r| r.step).collect();
    if failed != manifest.failed_steps {
        return Err(format!(
            "manifest lists failed steps {:?}, records flag {:?}",
            manifest.failed_steps, failed
        ));
    }
    Ok(())
}

/// Directory name for a scenario or engine label.
fn slug(label: &str) -> String {
    let slug: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    match slug.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}

/// RFC 3339 timestamp for a new manifest.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_path_safe() {
        assert_eq!(slug("Fe-C sweep"), "fe-c-sweep");
        assert_eq!(slug("surrogate-0.1.0"), "surrogate-0.1.0");
        assert_eq!(slug("../up"), "-up");
        assert_eq!(slug(".."), "_");
    }
}
