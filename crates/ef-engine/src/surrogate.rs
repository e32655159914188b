//! Deterministic surrogate equilibrium engine.
//!
//! This engine exists so the session and sweep layers can be exercised end to
//! end without a native CALPHAD library. It is NOT a thermodynamic model:
//! phases are stable inside fixed temperature windows and share the total
//! amount in proportion to constant weights. What it does reproduce faithfully
//! is the behaviour of the boundary:
//!
//! - alphabetical component order regardless of request order
//! - opaque record handles, cloning and deletion
//! - a global error flag for numerical failures that sticks until cleared
//! - composition sets (`NAME#1`, `NAME_AUTO#2`) created by the grid minimizer
//!   inside a split window, optionally with index aliasing between solves
//! - fixed-phase conditions replacing the temperature condition (liquidus and
//!   solidus search)
//! - sublattice site fractions derived from the phase composition, and
//!   per-component reference phases for chemical potentials
//!
//! The phase amounts always sum to the total amount, which keeps mass-balance
//! assertions in tests meaningful.

use crate::components::{PhaseName, sorted_components};
use crate::condition::{BatchAxis, BatchRequest, Condition};
use crate::constituents::{ConstituentDescription, Sublattice, VACANCY};
use crate::engine::{EquilibriumEngine, LoadedDatabase};
use crate::error::{EngineError, EngineResult};
use crate::status::{FractionKind, GridMinimizer, PhaseSelector, PhaseStatus};
use crate::symbols;
use ef_core::constants::{P_STANDARD_PA, R_J_PER_MOL_K};
use ef_core::{ComponentIndex, PhaseIndex, RecordHandle, ensure_finite};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One element of a surrogate database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateElement {
    pub name: String,
    /// Molar mass [g/mol], used to convert mass fractions.
    pub molar_mass: f64,
    /// Reference chemical potential [J/mol].
    #[serde(default)]
    pub mu_ref: f64,
}

/// Composition-set behaviour of a phase inside a temperature window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    /// Temperatures [K] `[lo, hi)` where the grid minimizer splits the phase.
    pub window: [f64; 2],
    /// Share of the phase amount carried by the tracer-lean instance.
    pub share: f64,
    /// Component whose fraction differs between the two instances.
    pub tracer: String,
    /// Relative depletion of the tracer in the lean instance, in [0, 1].
    pub enrichment: f64,
    /// Below this temperature [K] the lean instance keeps the plain phase
    /// name and only the `_AUTO` set is new. `None` renames it to `NAME#1`
    /// across the whole window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_at: Option<f64>,
}

/// One sublattice of a surrogate phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateSublattice {
    pub sites: f64,
    /// Element names or `VA`; elements outside the loaded system are dropped.
    pub constituents: Vec<String>,
}

/// One phase of a surrogate database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogatePhase {
    pub name: String,
    /// Temperatures [K] `[lo, hi)` where the phase can be stable.
    pub window: [f64; 2],
    /// Relative weight when sharing the total amount with other stable phases.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Molar enthalpy [J/mol].
    #[serde(default)]
    pub enthalpy: f64,
    /// Molar entropy [J/(mol·K)].
    #[serde(default)]
    pub entropy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitSpec>,
    /// Empty means one sublattice with one site holding every component.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sublattices: Vec<SurrogateSublattice>,
}

fn default_weight() -> f64 {
    1.0
}

impl SurrogatePhase {
    fn contains(&self, t: f64) -> bool {
        t >= self.window[0] && t < self.window[1]
    }

    fn distance_to_window(&self, t: f64) -> f64 {
        if t < self.window[0] {
            self.window[0] - t
        } else if t >= self.window[1] {
            t - self.window[1]
        } else {
            0.0
        }
    }

    fn molar_gibbs(&self, t: f64) -> f64 {
        self.enthalpy - t * self.entropy
    }

    /// Site fractions of each sublattice for a phase of `composition`.
    fn site_fractions(&self, components: &[String], composition: &[f64]) -> Vec<Sublattice> {
        let fraction_of = |name: &str| {
            components
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
                .map(|i| composition[i])
        };
        if self.sublattices.is_empty() {
            return vec![Sublattice {
                sites: 1.0,
                constituents: components.iter().cloned().zip(composition.iter().copied()).collect(),
            }];
        }

        let mut sublattices = Vec::with_capacity(self.sublattices.len());
        for sublattice in &self.sublattices {
            let mut constituents: Vec<(String, f64)> = sublattice
                .constituents
                .iter()
                .filter(|c| !c.eq_ignore_ascii_case(VACANCY))
                .filter_map(|c| fraction_of(c).map(|x| (c.to_ascii_uppercase(), x)))
                .collect();
            let occupied: f64 = constituents.iter().map(|(_, x)| x).sum();
            if sublattice
                .constituents
                .iter()
                .any(|c| c.eq_ignore_ascii_case(VACANCY))
            {
                constituents.push((VACANCY.to_string(), (1.0 - occupied).max(0.0)));
            } else if constituents.is_empty() {
                continue;
            } else if occupied > 0.0 {
                for (_, y) in &mut constituents {
                    *y /= occupied;
                }
            } else {
                let even = 1.0 / constituents.len() as f64;
                for (_, y) in &mut constituents {
                    *y = even;
                }
            }
            sublattices.push(Sublattice {
                sites: sublattice.sites,
                constituents,
            });
        }
        sublattices
    }
}

/// Elements and phases the surrogate engine can load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateDatabase {
    pub name: String,
    pub elements: Vec<SurrogateElement>,
    pub phases: Vec<SurrogatePhase>,
}

impl SurrogateDatabase {
    /// Parse a database from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        let db: Self = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        db.validate()?;
        Ok(db)
    }

    /// Read a database from a YAML file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::Database {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&text).map_err(|message| EngineError::Database {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Check windows, weights and split specs for consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.elements.is_empty() {
            return Err("database has no elements".to_string());
        }
        for element in &self.elements {
            if !element.molar_mass.is_finite() || element.molar_mass <= 0.0 {
                return Err(format!("element {} has invalid molar mass", element.name));
            }
        }
        for phase in &self.phases {
            if phase.window[0] >= phase.window[1] {
                return Err(format!("phase {} has an empty window", phase.name));
            }
            if !phase.weight.is_finite() || phase.weight <= 0.0 {
                return Err(format!("phase {} has a non-positive weight", phase.name));
            }
            for sublattice in &phase.sublattices {
                if !sublattice.sites.is_finite() || sublattice.sites <= 0.0 {
                    return Err(format!("phase {} has a sublattice without sites", phase.name));
                }
                if sublattice.constituents.is_empty() {
                    return Err(format!(
                        "phase {} has a sublattice without constituents",
                        phase.name
                    ));
                }
            }
            if let Some(split) = &phase.split {
                if split.window[0] >= split.window[1] {
                    return Err(format!("phase {} has an empty split window", phase.name));
                }
                if !(split.share > 0.0 && split.share < 1.0) {
                    return Err(format!("phase {} split share must be in (0, 1)", phase.name));
                }
                if split.rename_at.is_some_and(|r| !r.is_finite()) {
                    return Err(format!("phase {} split rename_at must be finite", phase.name));
                }
                if !(0.0..=1.0).contains(&split.enrichment) {
                    return Err(format!(
                        "phase {} split enrichment must be in [0, 1]",
                        phase.name
                    ));
                }
            }
        }
        Ok(())
    }

    fn element(&self, name: &str) -> Option<&SurrogateElement> {
        self.elements
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    fn phase_index(&self, name: &str) -> Option<usize> {
        let wanted = PhaseName::new(name.to_ascii_uppercase());
        self.phases
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(wanted.base()))
    }

    /// A high-speed-steel-like demo system (C, CR, FE, MO, SI, V).
    ///
    /// FCC_A1 splits into a carbon-lean and a carbon-rich composition set
    /// between 1200 K and 1500 K when the grid minimizer is on.
    pub fn demo_steel() -> Self {
        let element = |name: &str, molar_mass: f64, mu_ref: f64| SurrogateElement {
            name: name.to_string(),
            molar_mass,
            mu_ref,
        };
        let phase = |name: &str, window: [f64; 2], weight: f64, enthalpy: f64, entropy: f64| {
            SurrogatePhase {
                name: name.to_string(),
                window,
                weight,
                enthalpy,
                entropy,
                split: None,
                sublattices: Vec::new(),
            }
        };
        let sublattice = |sites: f64, constituents: &[&str]| SurrogateSublattice {
            sites,
            constituents: constituents.iter().map(|c| c.to_string()).collect(),
        };
        const METALS: [&str; 5] = ["CR", "FE", "MO", "SI", "V"];

        let mut fcc = phase("FCC_A1", [900.0, 1600.0], 2.0, -15_000.0, 8.0);
        fcc.split = Some(SplitSpec {
            window: [1200.0, 1500.0],
            share: 0.7,
            tracer: "C".to_string(),
            enrichment: 0.6,
            rename_at: None,
        });
        fcc.sublattices = vec![sublattice(1.0, &METALS), sublattice(1.0, &["C", VACANCY])];
        let mut bcc = phase("BCC_A2", [200.0, 1100.0], 3.0, -20_000.0, 6.0);
        bcc.sublattices = vec![sublattice(1.0, &METALS), sublattice(3.0, &["C", VACANCY])];
        let mut m23c6 = phase("M23C6", [200.0, 1000.0], 0.5, -30_000.0, 4.0);
        m23c6.sublattices = vec![
            sublattice(20.0, &["CR", "FE"]),
            sublattice(3.0, &["CR", "FE", "MO"]),
            sublattice(6.0, &["C"]),
        ];
        let mut m6c = phase("M6C", [200.0, 1150.0], 0.4, -28_000.0, 4.0);
        m6c.sublattices = vec![
            sublattice(2.0, &["FE"]),
            sublattice(2.0, &["MO"]),
            sublattice(2.0, &["CR", "FE", "MO", "V"]),
            sublattice(1.0, &["C"]),
        ];

        Self {
            name: "demo-steel".to_string(),
            elements: vec![
                element("C", 12.011, -2_000.0),
                element("CR", 51.996, -18_000.0),
                element("FE", 55.845, -25_000.0),
                element("MO", 95.95, -22_000.0),
                element("SI", 28.085, -35_000.0),
                element("V", 50.942, -30_000.0),
            ],
            phases: vec![
                phase("LIQUID", [1500.0, 6000.0], 1.0, 12_000.0, 10.0),
                fcc,
                bcc,
                m23c6,
                m6c,
            ],
        }
    }
}

/// Native-style error codes raised through the global flag.
pub mod codes {
    /// No phase can carry the free amount at the requested temperature.
    pub const NO_STABLE_PHASE: i32 = 4001;
    /// Neither a temperature nor a fixed phase pins the system.
    pub const UNDERDETERMINED: i32 = 4002;
    /// Composition conditions are inconsistent.
    pub const BAD_COMPOSITION: i32 = 4003;
    /// Fixed-phase temperature search found no bracket.
    pub const NO_BRACKET: i32 = 4004;
    /// Fixed phase amounts exceed the total amount.
    pub const FIXED_EXCEEDS_TOTAL: i32 = 4005;
    /// Failure injected for testing.
    pub const INJECTED: i32 = 4099;
}

#[derive(Debug, Clone)]
struct Conditions {
    temperature: Option<f64>,
    pressure: f64,
    total: f64,
    fractions: Vec<Option<(FractionKind, f64)>>,
}

#[derive(Debug, Clone)]
struct PhaseResult {
    name: String,
    db_index: usize,
    amount: f64,
    composition: Vec<f64>,
    driving_force: f64,
}

#[derive(Debug, Clone)]
struct Solution {
    temperature: f64,
    composition: Vec<f64>,
    mass_fractions: Vec<f64>,
    phases: Vec<PhaseResult>,
    gibbs: f64,
    enthalpy: f64,
    chemical_potentials: Vec<f64>,
}

#[derive(Debug, Clone)]
struct SurrogateRecord {
    engine_name: String,
    conditions: Conditions,
    statuses: Vec<PhaseStatus>,
    /// Reference phase (database index) of each component's chemical potential.
    references: Vec<Option<usize>>,
    solution: Option<Solution>,
}

#[derive(Debug, Clone)]
struct Loaded {
    db: SurrogateDatabase,
    components: Vec<String>,
    molar_masses: Vec<f64>,
    mu_refs: Vec<f64>,
}

/// In-process engine backed by a `SurrogateDatabase`.
#[derive(Debug, Default)]
pub struct SurrogateEngine {
    databases: HashMap<PathBuf, SurrogateDatabase>,
    loaded: Option<Loaded>,
    records: BTreeMap<RecordHandle, SurrogateRecord>,
    next_handle: u32,
    error_code: i32,
    quiet: bool,
    solves: u64,
    alias_split_sets: bool,
    failure_band: Option<[f64; 2]>,
}

impl SurrogateEngine {
    /// Lower bound [K] of the fixed-phase temperature search.
    const T_SEARCH_MIN: f64 = 200.0;
    /// Upper bound [K] of the fixed-phase temperature search.
    const T_SEARCH_MAX: f64 = 6000.0;
    const T_SEARCH_TOL: f64 = 1e-7;
    const AMOUNT_EPS: f64 = 1e-12;

    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-memory database under `path` so `load_database` skips the file system.
    pub fn with_database(mut self, path: impl Into<PathBuf>, db: SurrogateDatabase) -> Self {
        self.databases.insert(path.into(), db);
        self
    }

    /// Swap the names of the two composition sets on every other solve,
    /// imitating engines that reassign set indices between calls.
    pub fn with_split_aliasing(mut self, enabled: bool) -> Self {
        self.alias_split_sets = enabled;
        self
    }

    /// Raise `codes::INJECTED` for any solve whose temperature lies in `[lo, hi]`.
    pub fn inject_failure(&mut self, lo: f64, hi: f64) {
        self.failure_band = Some([lo, hi]);
    }

    pub fn clear_injected_failure(&mut self) {
        self.failure_band = None;
    }

    /// Number of live records (for leak checks in tests).
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn loaded(&self) -> EngineResult<&Loaded> {
        self.loaded.as_ref().ok_or_else(|| EngineError::Database {
            path: PathBuf::new(),
            message: "no database loaded".to_string(),
        })
    }

    fn record(&self, handle: RecordHandle) -> EngineResult<&SurrogateRecord> {
        self.records
            .get(&handle)
            .ok_or(EngineError::UnknownRecord { handle })
    }

    fn record_mut(&mut self, handle: RecordHandle) -> EngineResult<&mut SurrogateRecord> {
        self.records
            .get_mut(&handle)
            .ok_or(EngineError::UnknownRecord { handle })
    }

    fn solution(&self, handle: RecordHandle) -> EngineResult<&Solution> {
        self.record(handle)?
            .solution
            .as_ref()
            .ok_or(EngineError::NotSolved { handle })
    }

    fn allocate_handle(&mut self) -> RecordHandle {
        let handle = RecordHandle::from_index(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Resolve the overall mole fractions implied by the fraction conditions.
    fn resolve_composition(loaded: &Loaded, conditions: &Conditions) -> Result<Vec<f64>, i32> {
        let n = loaded.components.len();
        let kinds: Vec<FractionKind> = conditions
            .fractions
            .iter()
            .flatten()
            .map(|(kind, _)| *kind)
            .collect();
        let kind = kinds.first().copied().unwrap_or_default();
        if kinds.iter().any(|k| *k != kind) {
            return Err(codes::BAD_COMPOSITION);
        }

        let given: f64 = conditions.fractions.iter().flatten().map(|(_, v)| v).sum();
        let free = conditions.fractions.iter().filter(|f| f.is_none()).count();
        if given > 1.0 + 1e-9 || (free == 0 && (given - 1.0).abs() > 1e-9) {
            return Err(codes::BAD_COMPOSITION);
        }
        let share = if free == 0 {
            0.0
        } else {
            (1.0 - given).max(0.0) / free as f64
        };
        let fractions: Vec<f64> = conditions
            .fractions
            .iter()
            .map(|f| f.map(|(_, v)| v).unwrap_or(share))
            .collect();

        match kind {
            FractionKind::MoleFraction => Ok(fractions),
            FractionKind::MassFraction => {
                let moles: Vec<f64> = (0..n)
                    .map(|i| fractions[i] / loaded.molar_masses[i])
                    .collect();
                let total: f64 = moles.iter().sum();
                if total <= 0.0 {
                    return Err(codes::BAD_COMPOSITION);
                }
                Ok(moles.iter().map(|m| m / total).collect())
            }
        }
    }

    fn mass_fractions(loaded: &Loaded, composition: &[f64]) -> Vec<f64> {
        let masses: Vec<f64> = composition
            .iter()
            .zip(&loaded.molar_masses)
            .map(|(x, m)| x * m)
            .collect();
        let total: f64 = masses.iter().sum();
        if total <= 0.0 {
            return vec![0.0; composition.len()];
        }
        masses.iter().map(|m| m / total).collect()
    }

    /// Amount of each database phase at temperature `t`, or an error code.
    fn distribute(
        db: &SurrogateDatabase,
        statuses: &[PhaseStatus],
        total: f64,
        t: f64,
    ) -> Result<Vec<f64>, i32> {
        let fixed: f64 = statuses.iter().map(|s| s.amount()).sum();
        if fixed > total + Self::AMOUNT_EPS {
            return Err(codes::FIXED_EXCEEDS_TOTAL);
        }
        let free = (total - fixed).max(0.0);

        let weight_sum: f64 = db
            .phases
            .iter()
            .zip(statuses)
            .filter(|(p, s)| matches!(s, PhaseStatus::Entered) && p.contains(t))
            .map(|(p, _)| p.weight)
            .sum();
        if weight_sum <= 0.0 && free > Self::AMOUNT_EPS {
            return Err(codes::NO_STABLE_PHASE);
        }

        Ok(db
            .phases
            .iter()
            .zip(statuses)
            .map(|(p, s)| match s {
                PhaseStatus::Fixed { amount } => *amount,
                PhaseStatus::Entered if p.contains(t) => free * p.weight / weight_sum,
                _ => 0.0,
            })
            .collect())
    }

    /// Share of the fixed phase among all candidate phases at `t`.
    fn natural_share(db: &SurrogateDatabase, statuses: &[PhaseStatus], fixed: usize, t: f64) -> f64 {
        let candidates = db
            .phases
            .iter()
            .enumerate()
            .filter(|(i, p)| statuses[*i].can_be_stable() && p.contains(t));
        let mut own = 0.0;
        let mut sum = 0.0;
        for (i, p) in candidates {
            sum += p.weight;
            if i == fixed {
                own = p.weight;
            }
        }
        if sum > 0.0 { own / sum } else { 0.0 }
    }

    /// Temperature at which the fixed phase naturally reaches its pinned share.
    fn search_temperature(
        db: &SurrogateDatabase,
        statuses: &[PhaseStatus],
        fixed: usize,
        target: f64,
    ) -> Result<f64, i32> {
        let reached = |t: f64| {
            let share = Self::natural_share(db, statuses, fixed, t);
            if target > Self::AMOUNT_EPS {
                share >= target - 1e-12
            } else {
                share > Self::AMOUNT_EPS
            }
        };

        if reached(Self::T_SEARCH_MIN) {
            return Ok(Self::T_SEARCH_MIN);
        }
        let mut lo = Self::T_SEARCH_MIN;
        let mut hi = None;
        let mut t = Self::T_SEARCH_MIN;
        while t < Self::T_SEARCH_MAX {
            t += 1.0;
            if reached(t) {
                hi = Some(t);
                break;
            }
            lo = t;
        }
        let mut hi = hi.ok_or(codes::NO_BRACKET)?;
        while hi - lo > Self::T_SEARCH_TOL {
            let mid = 0.5 * (lo + hi);
            if reached(mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(hi)
    }

    fn solve_conditions(
        &self,
        conditions: &Conditions,
        statuses: &[PhaseStatus],
        grid: GridMinimizer,
        solve_index: u64,
    ) -> Result<Solution, i32> {
        let Some(loaded) = self.loaded.as_ref() else {
            return Err(codes::UNDERDETERMINED);
        };
        let db = &loaded.db;
        let composition = Self::resolve_composition(loaded, conditions)?;

        let t = match conditions.temperature {
            Some(t) => t,
            None => {
                let fixed = statuses
                    .iter()
                    .position(|s| matches!(s, PhaseStatus::Fixed { .. }))
                    .ok_or(codes::UNDERDETERMINED)?;
                let target = if conditions.total > 0.0 {
                    statuses[fixed].amount() / conditions.total
                } else {
                    0.0
                };
                Self::search_temperature(db, statuses, fixed, target)?
            }
        };
        if let Some([lo, hi]) = self.failure_band
            && t >= lo
            && t <= hi
        {
            return Err(codes::INJECTED);
        }

        let amounts = Self::distribute(db, statuses, conditions.total, t)?;
        let aliased = self.alias_split_sets && solve_index % 2 == 1;

        let mut phases = Vec::with_capacity(db.phases.len() + 1);
        let mut appended = Vec::new();
        for (i, phase) in db.phases.iter().enumerate() {
            let amount = amounts[i];
            let driving_force = if amount > 0.0 || phase.contains(t) {
                0.0
            } else {
                -phase.distance_to_window(t) / t
            };
            let split = phase
                .split
                .as_ref()
                .filter(|s| grid.is_on() && amount > 0.0 && t >= s.window[0] && t < s.window[1]);

            let Some(split) = split else {
                phases.push(PhaseResult {
                    name: phase.name.clone(),
                    db_index: i,
                    amount,
                    composition: composition.clone(),
                    driving_force,
                });
                continue;
            };

            let tracer = loaded
                .components
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&split.tracer));
            let (lean_comp, rich_comp) = match tracer {
                Some(ti) => {
                    let xt = composition[ti];
                    let lean_t = xt * (1.0 - split.enrichment);
                    let rich_t =
                        ((xt - split.share * lean_t) / (1.0 - split.share)).clamp(0.0, 1.0);
                    (
                        Self::with_tracer(&composition, ti, lean_t),
                        Self::with_tracer(&composition, ti, rich_t),
                    )
                }
                None => (composition.clone(), composition.clone()),
            };
            let lean = (split.share * amount, lean_comp);
            let rich = ((1.0 - split.share) * amount, rich_comp);
            let (first, second) = if aliased { (rich, lean) } else { (lean, rich) };
            let first_name = match split.rename_at {
                Some(rename_at) if t < rename_at => phase.name.clone(),
                _ => PhaseName::composition_set(&phase.name, 1, false).to_string(),
            };

            phases.push(PhaseResult {
                name: first_name,
                db_index: i,
                amount: first.0,
                composition: first.1,
                driving_force,
            });
            appended.push(PhaseResult {
                name: PhaseName::composition_set(&phase.name, 2, true).to_string(),
                db_index: i,
                amount: second.0,
                composition: second.1,
                driving_force,
            });
        }
        phases.extend(appended);

        let mixing: f64 = composition
            .iter()
            .filter(|x| **x > 0.0)
            .map(|x| x * x.ln())
            .sum::<f64>()
            * R_J_PER_MOL_K
            * t;
        let gibbs = phases
            .iter()
            .map(|p| p.amount * db.phases[p.db_index].molar_gibbs(t))
            .sum::<f64>()
            + conditions.total * mixing;
        let enthalpy = phases
            .iter()
            .map(|p| p.amount * db.phases[p.db_index].enthalpy)
            .sum();
        let chemical_potentials = composition
            .iter()
            .zip(&loaded.mu_refs)
            .map(|(x, mu0)| mu0 + R_J_PER_MOL_K * t * x.max(1e-30).ln())
            .collect();

        Ok(Solution {
            temperature: t,
            mass_fractions: Self::mass_fractions(loaded, &composition),
            composition,
            phases,
            gibbs,
            enthalpy,
            chemical_potentials,
        })
    }

    fn with_tracer(composition: &[f64], tracer: usize, value: f64) -> Vec<f64> {
        let rest_before = 1.0 - composition[tracer];
        let rest_after = 1.0 - value;
        composition
            .iter()
            .enumerate()
            .map(|(i, x)| {
                if i == tracer {
                    value
                } else if rest_before > 0.0 {
                    x * rest_after / rest_before
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn scalar_from(solution: &Solution, conditions: &Conditions, symbol: &str) -> Option<f64> {
        match symbol {
            symbols::TEMPERATURE => Some(solution.temperature),
            symbols::PRESSURE => Some(conditions.pressure),
            symbols::TOTAL_AMOUNT => Some(conditions.total),
            symbols::GIBBS_ENERGY => Some(solution.gibbs),
            symbols::MOLAR_GIBBS_ENERGY if conditions.total > 0.0 => {
                Some(solution.gibbs / conditions.total)
            }
            symbols::ENTHALPY => Some(solution.enthalpy),
            _ => None,
        }
    }

    fn phase_names(&self, handle: RecordHandle) -> EngineResult<Vec<String>> {
        let record = self.record(handle)?;
        Ok(match &record.solution {
            Some(solution) => solution.phases.iter().map(|p| p.name.clone()).collect(),
            None => self.loaded()?.db.phases.iter().map(|p| p.name.clone()).collect(),
        })
    }
}

impl EquilibriumEngine for SurrogateEngine {
    fn name(&self) -> &str {
        "surrogate"
    }

    fn load_database(
        &mut self,
        path: &Path,
        components: &[&str],
    ) -> EngineResult<LoadedDatabase> {
        let db = match self.databases.get(path) {
            Some(db) => db.clone(),
            None => SurrogateDatabase::load(path)?,
        };

        let requested: Vec<String> = if components.is_empty() {
            db.elements.iter().map(|e| e.name.clone()).collect()
        } else {
            components.iter().map(|c| c.to_string()).collect()
        };
        let components = sorted_components(&requested);
        let mut molar_masses = Vec::with_capacity(components.len());
        let mut mu_refs = Vec::with_capacity(components.len());
        for name in &components {
            let element = db.element(name).ok_or_else(|| EngineError::Database {
                path: path.to_path_buf(),
                message: format!("element {name} not in database {}", db.name),
            })?;
            molar_masses.push(element.molar_mass);
            mu_refs.push(element.mu_ref);
        }

        // Reading a database reinitialises the engine.
        self.records.clear();
        self.error_code = 0;
        let statuses = vec![PhaseStatus::Entered; db.phases.len()];
        let n = components.len();
        let conditions = Conditions {
            temperature: None,
            pressure: P_STANDARD_PA,
            total: 1.0,
            fractions: vec![None; components.len()],
        };
        if !self.quiet {
            debug!(database = %db.name, ?components, "surrogate database loaded");
        }
        self.loaded = Some(Loaded {
            db,
            components: components.clone(),
            molar_masses,
            mu_refs,
        });

        let record = self.allocate_handle();
        self.records.insert(
            record,
            SurrogateRecord {
                engine_name: "DEFAULT_EQUILIBRIUM".to_string(),
                conditions,
                statuses,
                references: vec![None; n],
                solution: None,
            },
        );
        Ok(LoadedDatabase { record, components })
    }

    fn set_condition(&mut self, record: RecordHandle, condition: Condition) -> EngineResult<()> {
        let n = self.loaded()?.components.len();
        let conditions = &mut self.record_mut(record)?.conditions;
        match condition {
            Condition::Temperature(t) => {
                conditions.temperature = Some(ensure_finite(t, "temperature")?);
            }
            Condition::UnsetTemperature => conditions.temperature = None,
            Condition::Pressure(p) => conditions.pressure = ensure_finite(p, "pressure")?,
            Condition::TotalAmount(amount) => {
                conditions.total = ensure_finite(amount, "total amount")?;
            }
            Condition::Fraction {
                kind,
                component,
                value,
            } => {
                if component.0 >= n {
                    return Err(EngineError::ComponentOob {
                        index: component.0,
                        len: n,
                    });
                }
                conditions.fractions[component.0] =
                    Some((kind, ensure_finite(value, "element fraction")?));
            }
        }
        Ok(())
    }

    fn set_phase_status(
        &mut self,
        record: RecordHandle,
        selector: &PhaseSelector,
        status: PhaseStatus,
    ) -> EngineResult<()> {
        let indices: Vec<usize> = {
            let db = &self.loaded()?.db;
            match selector {
                PhaseSelector::All => (0..db.phases.len()).collect(),
                PhaseSelector::Named(names) => names
                    .iter()
                    .map(|name| {
                        db.phase_index(name)
                            .ok_or_else(|| EngineError::UnknownPhase { name: name.clone() })
                    })
                    .collect::<EngineResult<_>>()?,
            }
        };
        let statuses = &mut self.record_mut(record)?.statuses;
        for i in indices {
            statuses[i] = status;
        }
        Ok(())
    }

    fn solve(&mut self, record: RecordHandle, grid: GridMinimizer) -> EngineResult<()> {
        let solve_index = self.solves;
        self.solves += 1;
        let (conditions, statuses) = {
            let r = self.record(record)?;
            (r.conditions.clone(), r.statuses.clone())
        };
        match self.solve_conditions(&conditions, &statuses, grid, solve_index) {
            Ok(solution) => {
                self.record_mut(record)?.solution = Some(solution);
            }
            Err(code) => {
                if !self.quiet {
                    debug!(code, "surrogate solve failed");
                }
                self.error_code = code;
            }
        }
        Ok(())
    }

    fn solve_batch(
        &mut self,
        record: RecordHandle,
        request: &BatchRequest,
    ) -> EngineResult<Vec<f64>> {
        request
            .validate()
            .map_err(|what| EngineError::InvalidBatch { what })?;
        let n = self.loaded()?.components.len();
        if let Some(c) = request.components.iter().find(|c| c.0 >= n) {
            return Err(EngineError::ComponentOob { index: c.0, len: n });
        }
        let (base, statuses) = {
            let r = self.record(record)?;
            (r.conditions.clone(), r.statuses.clone())
        };

        let point = |row: &[f64], t: f64| {
            let mut conditions = base.clone();
            conditions.temperature = Some(t);
            for (c, x) in request.components.iter().zip(row) {
                conditions.fractions[c.0] = Some((FractionKind::MoleFraction, *x));
            }
            conditions
        };
        let evaluate = |conditions: &Conditions| {
            self.solve_conditions(conditions, &statuses, request.grid, 0)
                .ok()
                .and_then(|s| Self::scalar_from(&s, conditions, &request.symbol))
                .unwrap_or(f64::NAN)
        };

        let values = match &request.axis {
            BatchAxis::Composition { temperature } => request
                .fractions
                .iter()
                .map(|row| evaluate(&point(row, *temperature)))
                .collect(),
            BatchAxis::Temperature { temperatures } => temperatures
                .iter()
                .map(|t| evaluate(&point(&request.fractions[0], *t)))
                .collect(),
        };
        Ok(values)
    }

    fn scalar(&self, record: RecordHandle, symbol: &str) -> EngineResult<f64> {
        let r = self.record(record)?;
        match (symbol, &r.solution) {
            (symbols::PRESSURE, _) => Ok(r.conditions.pressure),
            (symbols::TOTAL_AMOUNT, _) => Ok(r.conditions.total),
            (symbols::TEMPERATURE, None) => r
                .conditions
                .temperature
                .ok_or(EngineError::NotSolved { handle: record }),
            (_, Some(solution)) => Self::scalar_from(solution, &r.conditions, symbol)
                .ok_or_else(|| EngineError::UnknownSymbol {
                    symbol: symbol.to_string(),
                }),
            (_, None) => Err(EngineError::NotSolved { handle: record }),
        }
    }

    fn component_value(
        &self,
        record: RecordHandle,
        symbol: &str,
        component: ComponentIndex,
    ) -> EngineResult<f64> {
        let solution = self.solution(record)?;
        let len = solution.composition.len();
        if component.0 >= len {
            return Err(EngineError::ComponentOob {
                index: component.0,
                len,
            });
        }
        match symbol {
            symbols::MOLE_FRACTION => Ok(solution.composition[component.0]),
            symbols::MASS_FRACTION => Ok(solution.mass_fractions[component.0]),
            symbols::CHEMICAL_POTENTIAL => {
                let shift = match self.record(record)?.references[component.0] {
                    Some(phase) => self.loaded()?.db.phases[phase].molar_gibbs(solution.temperature),
                    None => 0.0,
                };
                Ok(solution.chemical_potentials[component.0] - shift)
            }
            _ => Err(EngineError::UnknownSymbol {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn phase_count(&self, record: RecordHandle) -> EngineResult<usize> {
        Ok(self.phase_names(record)?.len())
    }

    fn phase_value(
        &self,
        record: RecordHandle,
        symbol: &str,
        phase: PhaseIndex,
    ) -> EngineResult<f64> {
        let r = self.record(record)?;
        let solution = self.solution(record)?;
        let len = solution.phases.len();
        let p = solution.phases.get(phase.0).ok_or(EngineError::PhaseOob {
            index: phase.0,
            len,
        })?;
        let db = &self.loaded()?.db;
        match symbol {
            symbols::PHASE_AMOUNT => Ok(p.amount),
            symbols::PHASE_FRACTION if r.conditions.total > 0.0 => {
                Ok(p.amount / r.conditions.total)
            }
            symbols::ENTHALPY => Ok(p.amount * db.phases[p.db_index].enthalpy),
            symbols::GIBBS_ENERGY => {
                Ok(p.amount * db.phases[p.db_index].molar_gibbs(solution.temperature))
            }
            symbols::DRIVING_FORCE => Ok(p.driving_force),
            _ => Err(EngineError::UnknownSymbol {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn phase_name(&self, record: RecordHandle, phase: PhaseIndex) -> EngineResult<String> {
        let names = self.phase_names(record)?;
        let len = names.len();
        names
            .into_iter()
            .nth(phase.0)
            .ok_or(EngineError::PhaseOob {
                index: phase.0,
                len,
            })
    }

    fn phase_composition(
        &self,
        record: RecordHandle,
        phase: PhaseIndex,
    ) -> EngineResult<Vec<f64>> {
        let solution = self.solution(record)?;
        solution
            .phases
            .get(phase.0)
            .map(|p| p.composition.clone())
            .ok_or(EngineError::PhaseOob {
                index: phase.0,
                len: solution.phases.len(),
            })
    }

    fn phase_sublattices(
        &self,
        record: RecordHandle,
        phase: PhaseIndex,
    ) -> EngineResult<Vec<Sublattice>> {
        let solution = self.solution(record)?;
        let p = solution.phases.get(phase.0).ok_or(EngineError::PhaseOob {
            index: phase.0,
            len: solution.phases.len(),
        })?;
        let loaded = self.loaded()?;
        Ok(loaded.db.phases[p.db_index].site_fractions(&loaded.components, &p.composition))
    }

    fn constituent(
        &self,
        record: RecordHandle,
        name: &str,
    ) -> EngineResult<ConstituentDescription> {
        self.record(record)?;
        if name.eq_ignore_ascii_case(VACANCY) {
            return Ok(ConstituentDescription {
                name: VACANCY.to_string(),
                mass: 0.0,
                charge: 0.0,
                elements: Vec::new(),
            });
        }
        let loaded = self.loaded()?;
        let index = loaded
            .components
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| EngineError::UnknownConstituent {
                name: name.to_string(),
            })?;
        let element = loaded.components[index].clone();
        Ok(ConstituentDescription {
            name: element.clone(),
            mass: loaded.molar_masses[index],
            charge: 0.0,
            elements: vec![(element, 1.0)],
        })
    }

    fn set_reference_phase(
        &mut self,
        record: RecordHandle,
        component: ComponentIndex,
        phase: Option<&str>,
    ) -> EngineResult<()> {
        let loaded = self.loaded()?;
        let n = loaded.components.len();
        if component.0 >= n {
            return Err(EngineError::ComponentOob {
                index: component.0,
                len: n,
            });
        }
        let reference = phase
            .map(|name| {
                loaded
                    .db
                    .phase_index(name)
                    .ok_or_else(|| EngineError::UnknownPhase {
                        name: name.to_string(),
                    })
            })
            .transpose()?;
        self.record_mut(record)?.references[component.0] = reference;
        Ok(())
    }

    fn phase_status(
        &self,
        record: RecordHandle,
        phase: PhaseIndex,
    ) -> EngineResult<(PhaseStatus, f64)> {
        let r = self.record(record)?;
        let name = self.phase_name(record, phase)?;
        let db_index = self
            .loaded()?
            .db
            .phase_index(&name)
            .ok_or(EngineError::UnknownPhase { name })?;
        let driving_force = r
            .solution
            .as_ref()
            .and_then(|s| s.phases.get(phase.0))
            .map(|p| p.driving_force)
            .unwrap_or(0.0);
        Ok((r.statuses[db_index], driving_force))
    }

    fn clone_record(
        &mut self,
        source: RecordHandle,
        engine_name: &str,
    ) -> EngineResult<RecordHandle> {
        if self.records.values().any(|r| r.engine_name == engine_name) {
            return Err(EngineError::DuplicateRecord {
                name: engine_name.to_string(),
            });
        }
        let mut copy = self.record(source)?.clone();
        copy.engine_name = engine_name.to_string();
        let handle = self.allocate_handle();
        self.records.insert(handle, copy);
        Ok(handle)
    }

    fn delete_record(&mut self, record: RecordHandle) -> EngineResult<()> {
        self.records
            .remove(&record)
            .map(|_| ())
            .ok_or(EngineError::UnknownRecord { handle: record })
    }

    fn last_error_code(&self) -> i32 {
        self.error_code
    }

    fn clear_error(&mut self) {
        self.error_code = 0;
    }

    fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }
}
