//! Tallying bucket estimators
//!
//! Map `(minimum, maximum, index, observations)` to a value estimate for a
//! bucket that only keeps its extrema.

use std::fmt;
use std::sync::Arc;

type EstimateFn = dyn Fn(f64, f64, u64, u64) -> f64 + Send + Sync;

const LOWER_THIRD: f64 = 1.0 / 3.0;
const UPPER_THIRD: f64 = 2.0 / 3.0;

#[derive(Clone, Default)]
pub enum Estimator {
    /// Always the smallest observed value
    Minimum,
    /// Always the largest observed value
    Maximum,
    /// Mean of the extrema
    #[default]
    Average,
    /// Lower third gives minimum, upper third maximum, middle the mean
    Uniform,
    Custom(Arc<EstimateFn>),
}

impl fmt::Debug for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimator::Minimum => f.write_str("Minimum"),
            Estimator::Maximum => f.write_str("Maximum"),
            Estimator::Average => f.write_str("Average"),
            Estimator::Uniform => f.write_str("Uniform"),
            Estimator::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Estimator {
    /// Wrap a custom estimate function. Empty buckets still yield NaN.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64, f64, u64, u64) -> f64 + Send + Sync + 'static,
    {
        Estimator::Custom(Arc::new(f))
    }

    pub fn estimate_for(&self, minimum: f64, maximum: f64, index: u64, observations: u64) -> f64 {
        if observations == 0 {
            return f64::NAN;
        }
        match self {
            Estimator::Minimum => minimum,
            Estimator::Maximum => maximum,
            Estimator::Average => (minimum + maximum) / 2.0,
            Estimator::Uniform => {
                if observations == 1 {
                    return minimum;
                }
                let region = index as f64 / observations as f64;
                if region > UPPER_THIRD {
                    maximum
                } else if region < LOWER_THIRD {
                    minimum
                } else {
                    (minimum + maximum) / 2.0
                }
            }
            Estimator::Custom(f) => f(minimum, maximum, index, observations),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_nan() {
        for e in [
            Estimator::Minimum,
            Estimator::Maximum,
            Estimator::Average,
            Estimator::Uniform,
            Estimator::custom(|_, _, _, _| 42.0),
        ] {
            assert!(e.estimate_for(1.0, 2.0, 0, 0).is_nan(), "{:?}", e);
        }
    }

    #[test]
    fn test_extrema_estimators() {
        assert_eq!(Estimator::Minimum.estimate_for(1.0, 9.0, 3, 10), 1.0);
        assert_eq!(Estimator::Maximum.estimate_for(1.0, 9.0, 3, 10), 9.0);
        assert_eq!(Estimator::Average.estimate_for(1.0, 9.0, 3, 10), 5.0);
    }

    #[test]
    fn test_uniform_regions() {
        let e = Estimator::Uniform;
        assert_eq!(e.estimate_for(1.0, 9.0, 0, 1), 1.0);
        assert_eq!(e.estimate_for(1.0, 9.0, 1, 10), 1.0);
        assert_eq!(e.estimate_for(1.0, 9.0, 5, 10), 5.0);
        assert_eq!(e.estimate_for(1.0, 9.0, 9, 10), 9.0);
    }

    #[test]
    fn test_custom() {
        let e = Estimator::custom(|min, max, i, n| min + (max - min) * i as f64 / n as f64);
        assert_eq!(e.estimate_for(0.0, 10.0, 5, 10), 5.0);
    }
}
