//! Liquidus and solidus search.
//!
//! With the temperature condition removed and the liquid fixed at the total
//! amount (liquidus) or at zero (solidus), the engine solves for the
//! temperature. The search runs on a scratch copy of the active record so the
//! caller's conditions survive.

use crate::error::SessionResult;
use crate::session::Session;
use ef_core::{RecordHandle, Temperature, k, kelvin};
use ef_engine::{
    Condition, EquilibriumEngine, GridMinimizer, PhaseSelector, PhaseStatus, symbols,
};
use tracing::debug;

/// Conventional name of the liquid phase.
pub const LIQUID: &str = "LIQUID";

const SCRATCH_RECORD: &str = "PHASE_BOUNDARY_SEARCH";

/// Liquidus and solidus of the active composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeltingRange {
    pub liquidus: Temperature,
    pub solidus: Temperature,
}

impl MeltingRange {
    /// Liquidus minus solidus [K].
    pub fn freezing_range_k(&self) -> f64 {
        kelvin(self.liquidus) - kelvin(self.solidus)
    }
}

impl<E: EquilibriumEngine> Session<E> {
    /// Temperature at which `liquid` makes up the whole system.
    pub fn liquidus_temperature(&mut self, liquid: &str) -> SessionResult<Temperature> {
        self.on_scratch(|s, scratch| s.fixed_phase_temperature(scratch, liquid, true))
    }

    /// Temperature at which the first `liquid` appears on heating.
    pub fn solidus_temperature(&mut self, liquid: &str) -> SessionResult<Temperature> {
        self.on_scratch(|s, scratch| s.fixed_phase_temperature(scratch, liquid, false))
    }

    /// Liquidus and solidus in one pass over a single scratch record.
    pub fn melting_range(&mut self, liquid: &str) -> SessionResult<MeltingRange> {
        self.on_scratch(|s, scratch| {
            let liquidus = s.fixed_phase_temperature(scratch, liquid, true)?;
            let solidus = s.fixed_phase_temperature(scratch, liquid, false)?;
            Ok(MeltingRange { liquidus, solidus })
        })
    }

    /// Run `search` on a copy of the active record, then release the copy.
    fn on_scratch<T>(
        &mut self,
        search: impl FnOnce(&mut Self, RecordHandle) -> SessionResult<T>,
    ) -> SessionResult<T> {
        let source = self.active_record()?;
        let scratch = self.guarded(|engine| engine.clone_record(source, SCRATCH_RECORD))?;
        let result = search(self, scratch);
        let released = self.guarded(|engine| engine.delete_record(scratch));
        let value = result?;
        released?;
        Ok(value)
    }

    fn fixed_phase_temperature(
        &mut self,
        record: RecordHandle,
        liquid: &str,
        fully_liquid: bool,
    ) -> SessionResult<Temperature> {
        let total = self.guarded(|engine| engine.scalar(record, symbols::TOTAL_AMOUNT))?;
        let amount = if fully_liquid { total } else { 0.0 };
        let selector = PhaseSelector::from_names([liquid]);
        self.guarded(|engine| engine.set_condition(record, Condition::UnsetTemperature))?;
        self.guarded(|engine| {
            engine.set_phase_status(record, &selector, PhaseStatus::Fixed { amount })
        })?;
        self.guarded(|engine| engine.solve(record, GridMinimizer::On))?;
        let t = self.guarded(|engine| engine.scalar(record, symbols::TEMPERATURE))?;
        debug!(phase = liquid, amount, kelvin = t, "fixed-phase temperature found");
        Ok(k(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::session::SessionConfig;
    use ef_engine::{FractionKind, SurrogateDatabase, SurrogateEngine};

    const DB: &str = "demo-steel.yaml";

    fn session() -> Session<SurrogateEngine> {
        let engine = SurrogateEngine::new().with_database(DB, SurrogateDatabase::demo_steel());
        let mut s =
            Session::open(engine, DB, &["C", "CR", "FE"], SessionConfig::default()).unwrap();
        s.set_element_fraction("C", 0.01, FractionKind::MassFraction)
            .unwrap();
        s.set_temperature(Some(k(1000.0))).unwrap();
        s
    }

    #[test]
    fn liquidus_above_solidus() {
        let mut s = session();
        let range = s.melting_range(LIQUID).unwrap();
        assert!(range.liquidus > range.solidus);
        assert!((kelvin(range.liquidus) - 1600.0).abs() < 1e-3);
        assert!((kelvin(range.solidus) - 1500.0).abs() < 1e-3);
        assert!((range.freezing_range_k() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn search_leaves_active_record_untouched() {
        let mut s = session();
        s.liquidus_temperature(LIQUID).unwrap();
        assert_eq!(s.temperature_condition().unwrap(), Some(1000.0));
        assert_eq!(s.engine().record_count(), 1);
        s.solve(GridMinimizer::Off).unwrap();
        assert!((kelvin(s.temperature().unwrap()) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_liquid_releases_scratch() {
        let mut s = session();
        assert!(matches!(
            s.solidus_temperature("MELT"),
            Err(SessionError::UnknownPhase { .. })
        ));
        assert_eq!(s.engine().record_count(), 1);
    }
}
