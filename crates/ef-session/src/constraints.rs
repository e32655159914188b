//! Constraint setters and constraint sets.
//!
//! Every setter mutates the active record immediately. A `ConstraintSet`
//! batches changes and applies them in a fixed order (temperature, pressure,
//! total amount, fractions, phase statuses); there is no rollback, so callers
//! that need atomicity snapshot the record first with
//! `Session::create_record_from`.

use crate::error::{SessionError, SessionResult};
use crate::session::{BalancePolicy, Session};
use ef_core::{Amount, Pressure, Temperature, ensure_finite, kelvin, moles, pascal};
use ef_engine::{Condition, EquilibriumEngine, FractionKind, PhaseSelector, PhaseStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Target of one entry in a composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractionSpec {
    /// Fraction in [0, 1].
    Value(f64),
    /// The component whose fraction follows from mass balance.
    Balance,
}

impl FractionSpec {
    /// Interpret a raw number where any negative value marks the balance.
    pub fn from_raw(value: f64) -> Self {
        if value < 0.0 {
            FractionSpec::Balance
        } else {
            FractionSpec::Value(value)
        }
    }
}

/// Overall composition: component name to fraction or balance marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionSpec {
    entries: Vec<(String, FractionSpec)>,
}

impl CompositionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, component: impl Into<String>, value: f64) -> Self {
        self.entries
            .push((component.into(), FractionSpec::Value(value)));
        self
    }

    pub fn with_balance(mut self, component: impl Into<String>) -> Self {
        self.entries.push((component.into(), FractionSpec::Balance));
        self
    }

    /// Build from raw pairs where a negative value marks the balance component.
    pub fn from_raw<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(name, value)| (name.into(), FractionSpec::from_raw(value)))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, FractionSpec)] {
        &self.entries
    }

    /// The component marked as balance, if exactly one is.
    pub fn balance(&self) -> SessionResult<Option<&str>> {
        let mut marked = self
            .entries
            .iter()
            .filter(|(_, spec)| *spec == FractionSpec::Balance)
            .map(|(name, _)| name.as_str());
        let first = marked.next();
        if let (Some(first), Some(second)) = (first, marked.next()) {
            return Err(SessionError::AmbiguousBalance {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
        Ok(first)
    }

    /// Components with an explicit fraction, in insertion order.
    pub fn fractions(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().filter_map(|(name, spec)| match spec {
            FractionSpec::Value(v) => Some((name.as_str(), *v)),
            FractionSpec::Balance => None,
        })
    }
}

/// One pending condition change.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintItem {
    Temperature(Option<Temperature>),
    Pressure(Pressure),
    TotalAmount(Amount),
    Fraction {
        component: String,
        value: f64,
        kind: FractionKind,
    },
    PhaseStatus {
        selector: PhaseSelector,
        status: PhaseStatus,
    },
}

impl ConstraintItem {
    fn rank(&self) -> u8 {
        match self {
            ConstraintItem::Temperature(_) => 0,
            ConstraintItem::Pressure(_) => 1,
            ConstraintItem::TotalAmount(_) => 2,
            ConstraintItem::Fraction { .. } => 3,
            ConstraintItem::PhaseStatus { .. } => 4,
        }
    }
}

/// Pending condition changes for one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    items: Vec<ConstraintItem>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, t: Temperature) -> Self {
        self.items.push(ConstraintItem::Temperature(Some(t)));
        self
    }

    /// Remove the temperature condition (T becomes an unknown).
    pub fn unset_temperature(mut self) -> Self {
        self.items.push(ConstraintItem::Temperature(None));
        self
    }

    pub fn pressure(mut self, p: Pressure) -> Self {
        self.items.push(ConstraintItem::Pressure(p));
        self
    }

    pub fn total_amount(mut self, n: Amount) -> Self {
        self.items.push(ConstraintItem::TotalAmount(n));
        self
    }

    pub fn fraction(mut self, component: impl Into<String>, value: f64, kind: FractionKind) -> Self {
        self.items.push(ConstraintItem::Fraction {
            component: component.into(),
            value,
            kind,
        });
        self
    }

    pub fn phase_status(mut self, selector: PhaseSelector, status: PhaseStatus) -> Self {
        self.items
            .push(ConstraintItem::PhaseStatus { selector, status });
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in application order; insertion order is kept within a kind.
    pub fn ordered(&self) -> Vec<&ConstraintItem> {
        let mut items: Vec<&ConstraintItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.rank());
        items
    }
}

impl<E: EquilibriumEngine> Session<E> {
    /// Set the temperature condition, or remove it with `None`.
    pub fn set_temperature(&mut self, t: Option<Temperature>) -> SessionResult<()> {
        let handle = self.active_record()?;
        let condition = match t {
            Some(t) => {
                let kelvin = ensure_finite(kelvin(t), "temperature")?;
                Condition::Temperature(kelvin)
            }
            None => Condition::UnsetTemperature,
        };
        debug!(record = %self.active_name(), ?condition, "set temperature");
        self.guarded(|engine| engine.set_condition(handle, condition))?;
        self.active_entry_mut()?.temperature = match condition {
            Condition::Temperature(kelvin) => Some(kelvin),
            _ => None,
        };
        Ok(())
    }

    pub fn set_pressure(&mut self, p: Pressure) -> SessionResult<()> {
        let handle = self.active_record()?;
        let pascal = ensure_finite(pascal(p), "pressure")?;
        debug!(record = %self.active_name(), pascal, "set pressure");
        self.guarded(|engine| engine.set_condition(handle, Condition::Pressure(pascal)))
    }

    pub fn set_total_amount(&mut self, n: Amount) -> SessionResult<()> {
        let handle = self.active_record()?;
        let moles = ensure_finite(moles(n), "total amount")?;
        debug!(record = %self.active_name(), moles, "set total amount");
        self.guarded(|engine| engine.set_condition(handle, Condition::TotalAmount(moles)))
    }

    /// Designate (or clear) the balance component of the active record.
    ///
    /// A component that already carries a fraction condition cannot become
    /// the balance, since engine conditions cannot be withdrawn one by one.
    pub fn set_balance_component(&mut self, component: Option<&str>) -> SessionResult<()> {
        let index = component.map(|c| self.component_index(c)).transpose()?;
        let entry = self.active_entry_mut()?;
        if let Some(index) = index
            && entry.fractions.contains_key(&index)
        {
            return Err(SessionError::BalanceComponentConstraint {
                component: component.unwrap_or_default().to_string(),
            });
        }
        entry.balance = index;
        Ok(())
    }

    /// Set the overall fraction of one component.
    ///
    /// The balance component's fraction is never forwarded to the engine.
    pub fn set_element_fraction(
        &mut self,
        component: &str,
        value: f64,
        kind: FractionKind,
    ) -> SessionResult<()> {
        let index = self.component_index(component)?;
        let name = self.component_names()[index.0].clone();
        let max = self.component_names().len().saturating_sub(1);
        let policy = self.config().balance_policy;
        let entry = self.active_entry()?;

        if entry.balance == Some(index) {
            return match policy {
                BalancePolicy::Reject => {
                    Err(SessionError::BalanceComponentConstraint { component: name })
                }
                BalancePolicy::Skip => {
                    debug!(component = %name, "fraction on balance component skipped");
                    Ok(())
                }
            };
        }
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(SessionError::InvalidFraction {
                component: name,
                value,
            });
        }
        if !entry.fractions.contains_key(&index) && entry.fractions.len() >= max {
            return Err(SessionError::TooManyFractions { max });
        }

        let handle = entry.handle;
        debug!(record = %self.active_name(), component = %name, value, symbol = kind.symbol(), "set element fraction");
        self.guarded(|engine| {
            engine.set_condition(
                handle,
                Condition::Fraction {
                    kind,
                    component: index,
                    value,
                },
            )
        })?;
        self.active_entry_mut()?
            .fractions
            .insert(index, (kind, value));
        Ok(())
    }

    /// Apply a whole composition: mark its balance component, then set the rest.
    pub fn set_element_fractions(
        &mut self,
        composition: &CompositionSpec,
        kind: FractionKind,
    ) -> SessionResult<()> {
        if let Some(balance) = composition.balance()? {
            self.set_balance_component(Some(balance))?;
        }
        for (component, value) in composition.fractions() {
            self.set_element_fraction(component, value, kind)?;
        }
        Ok(())
    }

    /// Change the status of the selected phases on the active record.
    pub fn set_phase_status(
        &mut self,
        selector: &PhaseSelector,
        status: PhaseStatus,
    ) -> SessionResult<()> {
        if let PhaseStatus::Fixed { amount } = status
            && (!amount.is_finite() || amount < 0.0)
        {
            return Err(SessionError::Core(ef_core::EfError::OutOfRange {
                what: "fixed phase amount",
                value: amount,
                min: 0.0,
                max: f64::INFINITY,
            }));
        }
        let handle = self.active_record()?;
        debug!(record = %self.active_name(), phases = %selector, %status, "set phase status");
        self.guarded(|engine| engine.set_phase_status(handle, selector, status))
    }

    /// Suspend every phase, then enter only `names`.
    pub fn enter_only<S: AsRef<str>>(&mut self, names: &[S]) -> SessionResult<()> {
        self.set_phase_status(&PhaseSelector::All, PhaseStatus::Suspended)?;
        let selector = PhaseSelector::from_names(names);
        if selector == PhaseSelector::Named(Vec::new()) {
            return Ok(());
        }
        self.set_phase_status(&selector, PhaseStatus::Entered)
    }

    /// Report the chemical potential of `component` relative to pure `phase`.
    ///
    /// `None` restores the database reference state.
    pub fn set_reference_phase(&mut self, component: &str, phase: Option<&str>) -> SessionResult<()> {
        let index = self.component_index(component)?;
        let handle = self.active_record()?;
        debug!(record = %self.active_name(), component, phase = ?phase, "set reference phase");
        self.guarded(|engine| engine.set_reference_phase(handle, index, phase))
    }

    /// Apply a constraint set in order; stops at the first failure.
    ///
    /// Returns the number of items applied.
    pub fn apply(&mut self, set: &ConstraintSet) -> SessionResult<usize> {
        let mut applied = 0;
        for item in set.ordered() {
            self.apply_item(item)
                .map_err(|source| SessionError::ConstraintApply {
                    applied,
                    source: Box::new(source),
                })?;
            applied += 1;
        }
        Ok(applied)
    }

    fn apply_item(&mut self, item: &ConstraintItem) -> SessionResult<()> {
        match item {
            ConstraintItem::Temperature(t) => self.set_temperature(*t),
            ConstraintItem::Pressure(p) => self.set_pressure(*p),
            ConstraintItem::TotalAmount(n) => self.set_total_amount(*n),
            ConstraintItem::Fraction {
                component,
                value,
                kind,
            } => self.set_element_fraction(component, *value, *kind),
            ConstraintItem::PhaseStatus { selector, status } => {
                self.set_phase_status(selector, *status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use ef_core::{ComponentIndex, k, mol, pa};
    use ef_engine::{SurrogateDatabase, SurrogateEngine};

    const DB: &str = "demo-steel.yaml";

    fn session(policy: BalancePolicy) -> Session<SurrogateEngine> {
        let engine = SurrogateEngine::new().with_database(DB, SurrogateDatabase::demo_steel());
        let config = SessionConfig {
            balance_policy: policy,
            ..SessionConfig::default()
        };
        Session::open(engine, DB, &["FE", "C", "CR"], config).unwrap()
    }

    #[test]
    fn raw_composition_marks_balance() {
        let spec = CompositionSpec::from_raw([("FE", -1.0), ("C", 0.01), ("CR", 0.05)]);
        assert_eq!(spec.balance().unwrap(), Some("FE"));
        assert_eq!(spec.fractions().count(), 2);
    }

    #[test]
    fn two_balance_markers_are_ambiguous() {
        let spec = CompositionSpec::new().with_balance("FE").with_balance("CR");
        assert!(matches!(
            spec.balance(),
            Err(SessionError::AmbiguousBalance { .. })
        ));
    }

    #[test]
    fn balance_fraction_rejected_and_not_forwarded() {
        let mut s = session(BalancePolicy::Reject);
        s.set_balance_component(Some("FE")).unwrap();
        let err = s
            .set_element_fraction("FE", 0.9, FractionKind::MoleFraction)
            .unwrap_err();
        assert!(matches!(err, SessionError::BalanceComponentConstraint { .. }));
        assert!(s.constrained_components().unwrap().is_empty());
    }

    #[test]
    fn balance_fraction_skipped_under_skip_policy() {
        let mut s = session(BalancePolicy::Skip);
        s.set_balance_component(Some("FE")).unwrap();
        s.set_element_fraction("FE", 0.9, FractionKind::MoleFraction)
            .unwrap();
        assert!(s.constrained_components().unwrap().is_empty());
    }

    #[test]
    fn at_most_n_minus_one_fractions() {
        let mut s = session(BalancePolicy::Reject);
        s.set_element_fraction("C", 0.01, FractionKind::MoleFraction)
            .unwrap();
        s.set_element_fraction("CR", 0.05, FractionKind::MoleFraction)
            .unwrap();
        // Re-setting an existing constraint is fine.
        s.set_element_fraction("CR", 0.06, FractionKind::MoleFraction)
            .unwrap();
        assert!(matches!(
            s.set_element_fraction("FE", 0.5, FractionKind::MoleFraction),
            Err(SessionError::TooManyFractions { max: 2 })
        ));
    }

    #[test]
    fn fixed_fractions_follow_engine_order() {
        let mut s = session(BalancePolicy::Reject);
        s.set_element_fraction("CR", 0.05, FractionKind::MassFraction)
            .unwrap();
        s.set_element_fraction("C", 0.01, FractionKind::MoleFraction)
            .unwrap();
        s.set_element_fraction("CR", 0.06, FractionKind::MassFraction)
            .unwrap();
        let fixed = s.fixed_fractions().unwrap();
        assert_eq!(
            fixed,
            vec![
                (ComponentIndex(0), FractionKind::MoleFraction, 0.01),
                (ComponentIndex(1), FractionKind::MassFraction, 0.06),
            ]
        );
    }

    #[test]
    fn fraction_outside_unit_interval_rejected() {
        let mut s = session(BalancePolicy::Reject);
        assert!(matches!(
            s.set_element_fraction("C", 1.5, FractionKind::MassFraction),
            Err(SessionError::InvalidFraction { .. })
        ));
        assert!(matches!(
            s.set_element_fraction("NI", 0.1, FractionKind::MassFraction),
            Err(SessionError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn constrained_component_cannot_become_balance() {
        let mut s = session(BalancePolicy::Reject);
        s.set_element_fraction("C", 0.01, FractionKind::MoleFraction)
            .unwrap();
        assert!(s.set_balance_component(Some("C")).is_err());
    }

    #[test]
    fn enter_only_leaves_subset_non_suspended() {
        let mut s = session(BalancePolicy::Reject);
        s.enter_only(&["FCC_A1", "BCC_A2"]).unwrap();
        let reports = s.phase_statuses().unwrap();
        let entered: Vec<&str> = reports
            .iter()
            .filter(|r| !r.status.is_suspended())
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(entered, vec!["FCC_A1", "BCC_A2"]);
    }

    #[test]
    fn unknown_phase_in_selector() {
        let mut s = session(BalancePolicy::Reject);
        let err = s
            .set_phase_status(
                &PhaseSelector::from_names(["SIGMA"]),
                PhaseStatus::Entered,
            )
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::UnknownPhase {
                name: "SIGMA".into()
            }
        );
    }

    #[test]
    fn negative_fixed_amount_rejected() {
        let mut s = session(BalancePolicy::Reject);
        assert!(
            s.set_phase_status(
                &PhaseSelector::from_names(["LIQUID"]),
                PhaseStatus::Fixed { amount: -1.0 }
            )
            .is_err()
        );
    }

    #[test]
    fn constraint_set_applies_in_fixed_order() {
        let set = ConstraintSet::new()
            .phase_status(PhaseSelector::All, PhaseStatus::Entered)
            .fraction("C", 0.01, FractionKind::MoleFraction)
            .total_amount(mol(1.0))
            .temperature(k(1173.0))
            .pressure(pa(1e5));
        let ranks: Vec<u8> = set.ordered().iter().map(|i| i.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);

        let mut s = session(BalancePolicy::Reject);
        assert_eq!(s.apply(&set).unwrap(), 5);
        assert_eq!(s.temperature_condition().unwrap(), Some(1173.0));
    }

    #[test]
    fn failed_item_reports_applied_count_without_rollback() {
        let set = ConstraintSet::new()
            .temperature(k(1000.0))
            .fraction("C", 0.01, FractionKind::MoleFraction)
            .fraction("XX", 0.01, FractionKind::MoleFraction);
        let mut s = session(BalancePolicy::Reject);
        match s.apply(&set) {
            Err(SessionError::ConstraintApply { applied, source }) => {
                assert_eq!(applied, 2);
                assert!(matches!(*source, SessionError::UnknownComponent { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.temperature_condition().unwrap(), Some(1000.0));
        assert_eq!(s.constrained_components().unwrap(), vec!["C"]);
    }

    #[test]
    fn unset_temperature_clears_condition() {
        let mut s = session(BalancePolicy::Reject);
        s.set_temperature(Some(k(900.0))).unwrap();
        s.set_temperature(None).unwrap();
        assert_eq!(s.temperature_condition().unwrap(), None);
    }
}
