use crate::EfError;

/// Floating point type used throughout the workspace
pub type Real = f64;

/// Absolute/relative tolerance pair for float comparison
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Tolerance used when checking mass balance of phase amounts.
    pub const MASS_BALANCE: Tolerances = Tolerances {
        abs: 1e-6,
        rel: 1e-6,
    };
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, EfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(EfError::NonFinite { what, value: v })
    }
}

/// Check that a fraction lies in the closed unit interval.
pub fn ensure_fraction(v: Real, what: &'static str) -> Result<Real, EfError> {
    let v = ensure_finite(v, what)?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(EfError::OutOfRange {
            what,
            value: v,
            min: 0.0,
            max: 1.0,
        })
    }
}

/// Evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: Real, end: Real, num_points: usize) -> Vec<Real> {
    match num_points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let delta = (end - start) / (n - 1) as Real;
            let mut points: Vec<Real> = (0..n).map(|i| start + i as Real * delta).collect();
            // Ensure exact endpoint
            points[n - 1] = end;
            points
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_fraction_bounds() {
        assert!(ensure_fraction(0.0, "x").is_ok());
        assert!(ensure_fraction(1.0, "x").is_ok());
        assert!(ensure_fraction(-0.1, "x").is_err());
        assert!(ensure_fraction(1.5, "x").is_err());
        assert!(ensure_fraction(Real::INFINITY, "x").is_err());
    }

    #[test]
    fn linspace_endpoints() {
        let pts = linspace(1e-4, 5e-2, 10);
        assert_eq!(pts.len(), 10);
        assert_eq!(pts[0], 1e-4);
        assert_eq!(pts[9], 5e-2);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
    }

    proptest! {
        #[test]
        fn linspace_is_monotonic(start in -1e3f64..1e3, span in 1e-3f64..1e3, n in 2usize..200) {
            let pts = linspace(start, start + span, n);
            prop_assert_eq!(pts.len(), n);
            for w in pts.windows(2) {
                prop_assert!(w[1] > w[0]);
            }
        }
    }
}
