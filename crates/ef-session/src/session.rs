//! Equilibrium session: named records over one engine.

use crate::error::{SessionError, SessionResult};
use ef_core::{ComponentIndex, RecordHandle};
use ef_engine::{
    BatchRequest, EngineResult, EquilibriumEngine, FractionKind, GridMinimizer, PhaseStatus,
    engine_record_name,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Session name of the record created when the database is loaded.
pub const DEFAULT_RECORD: &str = "default equilibrium";

/// What to do with a fraction constraint addressed to the balance component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Fail with `BalanceComponentConstraint`.
    #[default]
    Reject,
    /// Drop the constraint and log it at debug level.
    Skip,
}

/// Session-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub balance_policy: BalancePolicy,
    /// Silence the engine's own console output.
    pub quiet: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            balance_policy: BalancePolicy::Reject,
            quiet: true,
        }
    }
}

/// Session-side bookkeeping for one engine record.
#[derive(Debug, Clone)]
pub(crate) struct RecordEntry {
    pub(crate) handle: RecordHandle,
    pub(crate) balance: Option<ComponentIndex>,
    /// Fraction conditions set on this record, by component.
    pub(crate) fractions: BTreeMap<ComponentIndex, (FractionKind, f64)>,
    /// Temperature condition [K], `None` when unset.
    pub(crate) temperature: Option<f64>,
}

/// One phase with its status and driving force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStatusReport {
    pub name: String,
    pub status: PhaseStatus,
    pub driving_force: f64,
}

/// A stateful equilibrium session.
///
/// Records are addressed by name; the session maps each name to the engine
/// handle and passes that handle explicitly on every call. Exactly one record
/// is active and all condition and solve operations act on it.
///
/// Every engine call goes through [`Session::guarded`], which observes and
/// clears the engine's global error flag, so a failure never leaks into the
/// next call.
pub struct Session<E: EquilibriumEngine> {
    engine: E,
    config: SessionConfig,
    database: PathBuf,
    components: Vec<String>,
    records: BTreeMap<String, RecordEntry>,
    active: String,
}

impl<E: EquilibriumEngine> Session<E> {
    /// Load `database` restricted to `components` and activate the default record.
    pub fn open(
        mut engine: E,
        database: impl AsRef<Path>,
        components: &[&str],
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let database = database.as_ref().to_path_buf();
        engine.set_quiet(config.quiet);
        engine.clear_error();
        let loaded = engine.load_database(&database, components);
        let code = engine.last_error_code();
        if code != 0 {
            engine.clear_error();
            return Err(SessionError::SolveFailure { code });
        }
        let loaded = loaded?;
        debug!(
            engine = engine.name(),
            database = %database.display(),
            components = ?loaded.components,
            "session opened"
        );

        let mut records = BTreeMap::new();
        records.insert(
            DEFAULT_RECORD.to_string(),
            RecordEntry {
                handle: loaded.record,
                balance: None,
                fractions: BTreeMap::new(),
                temperature: None,
            },
        );
        Ok(Self {
            engine,
            config,
            database,
            components: loaded.components,
            records,
            active: DEFAULT_RECORD.to_string(),
        })
    }

    /// Run one engine call, then observe and clear the global error flag.
    pub(crate) fn guarded<T>(
        &mut self,
        call: impl FnOnce(&mut E) -> EngineResult<T>,
    ) -> SessionResult<T> {
        let result = call(&mut self.engine);
        let code = self.engine.last_error_code();
        if code != 0 {
            self.engine.clear_error();
            debug!(code, record = %self.active, "engine error flag cleared");
            return Err(SessionError::SolveFailure { code });
        }
        Ok(result?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn database(&self) -> &Path {
        &self.database
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Direct engine access. Calls made here bypass the error guard.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Components in engine order.
    pub fn component_names(&self) -> &[String] {
        &self.components
    }

    /// Position of a component (case-insensitive) in engine order.
    pub fn component_index(&self, name: &str) -> SessionResult<ComponentIndex> {
        self.components
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name.trim()))
            .map(ComponentIndex)
            .ok_or_else(|| SessionError::UnknownComponent {
                name: name.to_string(),
            })
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// Handle of the active record.
    pub fn active_record(&self) -> SessionResult<RecordHandle> {
        Ok(self.active_entry()?.handle)
    }

    pub fn record_names(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub fn has_record(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub(crate) fn active_entry(&self) -> SessionResult<&RecordEntry> {
        self.records
            .get(&self.active)
            .ok_or_else(|| SessionError::UnknownRecord {
                name: self.active.clone(),
            })
    }

    pub(crate) fn active_entry_mut(&mut self) -> SessionResult<&mut RecordEntry> {
        self.records
            .get_mut(&self.active)
            .ok_or_else(|| SessionError::UnknownRecord {
                name: self.active.clone(),
            })
    }

    /// Create a record as a copy of the default record.
    pub fn create_record(&mut self, name: &str) -> SessionResult<RecordHandle> {
        self.create_record_from(name, DEFAULT_RECORD)
    }

    /// Create a record as a copy of `source`, conditions and statuses included.
    ///
    /// Also serves as a snapshot before a multi-step change, since constraint
    /// application has no rollback.
    pub fn create_record_from(&mut self, name: &str, source: &str) -> SessionResult<RecordHandle> {
        if self.records.contains_key(name) {
            return Err(SessionError::DuplicateName {
                name: name.to_string(),
            });
        }
        let source_entry = self
            .records
            .get(source)
            .cloned()
            .ok_or_else(|| SessionError::UnknownRecord {
                name: source.to_string(),
            })?;
        let engine_name = engine_record_name(name);
        let handle =
            self.guarded(|engine| engine.clone_record(source_entry.handle, &engine_name))?;
        debug!(record = name, source, %handle, "equilibrium record created");
        self.records.insert(
            name.to_string(),
            RecordEntry {
                handle,
                ..source_entry
            },
        );
        Ok(handle)
    }

    /// Make `name` the active record.
    pub fn select_record(&mut self, name: &str) -> SessionResult<RecordHandle> {
        let handle = self
            .records
            .get(name)
            .map(|entry| entry.handle)
            .ok_or_else(|| SessionError::UnknownRecord {
                name: name.to_string(),
            })?;
        if self.active != name {
            debug!(record = name, "equilibrium record selected");
            self.active = name.to_string();
        }
        Ok(handle)
    }

    /// Release a record. Deleting the active record reactivates the default.
    pub fn delete_record(&mut self, name: &str) -> SessionResult<()> {
        if name == DEFAULT_RECORD {
            return Err(SessionError::ProtectedRecord {
                name: name.to_string(),
            });
        }
        let handle = self
            .records
            .get(name)
            .map(|entry| entry.handle)
            .ok_or_else(|| SessionError::UnknownRecord {
                name: name.to_string(),
            })?;
        self.guarded(|engine| engine.delete_record(handle))?;
        self.records.remove(name);
        debug!(record = name, "equilibrium record deleted");
        if self.active == name {
            self.active = DEFAULT_RECORD.to_string();
        }
        Ok(())
    }

    /// Release every record, the default included.
    ///
    /// Keeps going past failures and reports the first one; returns how many
    /// records were released. The session holds no records afterwards.
    pub fn release_all(&mut self) -> SessionResult<usize> {
        let entries: Vec<(String, RecordHandle)> = self
            .records
            .iter()
            .map(|(name, entry)| (name.clone(), entry.handle))
            .collect();
        let mut released = 0;
        let mut first_error = None;
        for (name, handle) in entries {
            match self.guarded(|engine| engine.delete_record(handle)) {
                Ok(()) => released += 1,
                Err(err) => {
                    warn!(record = %name, error = %err, "failed to release equilibrium record");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.records.clear();
        debug!(released, "equilibrium records released");
        match first_error {
            Some(err) => Err(err),
            None => Ok(released),
        }
    }

    /// Compute the equilibrium of the active record.
    pub fn solve(&mut self, grid: GridMinimizer) -> SessionResult<()> {
        let handle = self.active_record()?;
        debug!(record = %self.active, %grid, "solving equilibrium");
        self.guarded(|engine| engine.solve(handle, grid))
    }

    /// Hand a batch request to the engine unchanged; failed points come back as NaN.
    pub fn solve_batch(&mut self, request: &BatchRequest) -> SessionResult<Vec<f64>> {
        let handle = self.active_record()?;
        debug!(record = %self.active, points = request.len(), symbol = %request.symbol, "batch equilibrium");
        self.guarded(|engine| engine.solve_batch(handle, request))
    }

    /// Temperature condition [K] of the active record, `None` when unset.
    pub fn temperature_condition(&self) -> SessionResult<Option<f64>> {
        Ok(self.active_entry()?.temperature)
    }

    /// Balance component of the active record, if one is designated.
    pub fn balance_component(&self) -> SessionResult<Option<&str>> {
        Ok(self
            .active_entry()?
            .balance
            .map(|c| self.components[c.0].as_str()))
    }

    /// Components carrying a fraction condition on the active record.
    pub fn constrained_components(&self) -> SessionResult<Vec<&str>> {
        Ok(self
            .active_entry()?
            .fractions
            .keys()
            .map(|c| self.components[c.0].as_str())
            .collect())
    }

    /// Fraction conditions of the active record, in engine component order.
    pub fn fixed_fractions(&self) -> SessionResult<Vec<(ComponentIndex, FractionKind, f64)>> {
        Ok(self
            .active_entry()?
            .fractions
            .iter()
            .map(|(c, (kind, value))| (*c, *kind, *value))
            .collect())
    }

    /// Number of phases (composition sets included) on the active record.
    pub fn phase_count(&mut self) -> SessionResult<usize> {
        let handle = self.active_record()?;
        self.guarded(|engine| engine.phase_count(handle))
    }

    pub fn phase_name(&mut self, index: usize) -> SessionResult<String> {
        let handle = self.active_record()?;
        self.guarded(|engine| engine.phase_name(handle, ef_core::PhaseIndex(index)))
    }

    /// Names of all phases on the active record, in engine order.
    pub fn phase_names(&mut self) -> SessionResult<Vec<String>> {
        let count = self.phase_count()?;
        (0..count).map(|i| self.phase_name(i)).collect()
    }

    /// Status and driving force of every phase on the active record.
    pub fn phase_statuses(&mut self) -> SessionResult<Vec<PhaseStatusReport>> {
        let handle = self.active_record()?;
        let count = self.phase_count()?;
        let mut reports = Vec::with_capacity(count);
        for i in 0..count {
            let index = ef_core::PhaseIndex(i);
            let name = self.guarded(|engine| engine.phase_name(handle, index))?;
            let (status, driving_force) =
                self.guarded(|engine| engine.phase_status(handle, index))?;
            reports.push(PhaseStatusReport {
                name,
                status,
                driving_force,
            });
        }
        Ok(reports)
    }
}

impl<E: EquilibriumEngine> Drop for Session<E> {
    fn drop(&mut self) {
        let leaked: Vec<&str> = self
            .records
            .keys()
            .map(String::as_str)
            .filter(|name| *name != DEFAULT_RECORD)
            .collect();
        if !leaked.is_empty() {
            warn!(records = ?leaked, "session dropped with live equilibrium records");
        }
    }
}
