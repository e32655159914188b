// ef-core/src/units.rs

use uom::si::f64::{
    AmountOfSubstance as UomAmountOfSubstance, Pressure as UomPressure,
    ThermodynamicTemperature as UomThermodynamicTemperature,
};

// Public canonical unit types (SI, f64)
pub type Amount = UomAmountOfSubstance;
pub type Pressure = UomPressure;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn mol(v: f64) -> Amount {
    use uom::si::amount_of_substance::mole;
    Amount::new::<mole>(v)
}

/// Temperature in kelvin, the unit the engine boundary speaks.
#[inline]
pub fn kelvin(t: Temperature) -> f64 {
    use uom::si::thermodynamic_temperature::kelvin;
    t.get::<kelvin>()
}

/// Pressure in pascal.
#[inline]
pub fn pascal(p: Pressure) -> f64 {
    use uom::si::pressure::pascal;
    p.get::<pascal>()
}

/// Amount of substance in moles.
#[inline]
pub fn moles(n: Amount) -> f64 {
    use uom::si::amount_of_substance::mole;
    n.get::<mole>()
}

pub mod constants {
    /// Standard pressure [Pa] used as the default condition.
    pub const P_STANDARD_PA: f64 = 1.0e5;

    /// Molar gas constant [J/(mol·K)].
    pub const R_J_PER_MOL_K: f64 = 8.314_462_618;
}
