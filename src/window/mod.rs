//! Sliding Time-Window Quantiles
//!
//! Summaries report quantiles over the trailing `max_age`. A ring of
//! [`CkmsQuantiles`] streams, each started one period after the previous,
//! approximates that window; reads come from the oldest stream.

pub mod ckms;
pub mod sliding;

use std::sync::Arc;

use parking_lot::Mutex;

pub use ckms::{CkmsQuantiles, Quantile};
pub use sliding::SlidingWindow;

use crate::clock::Clock;
use crate::error::Result;

#[derive(Debug)]
pub struct TimeWindowQuantiles {
    window: SlidingWindow<Mutex<CkmsQuantiles>>,
}

impl TimeWindowQuantiles {
    pub fn new(
        quantiles: Vec<Quantile>,
        max_age_ms: i64,
        age_buckets: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        // validate once so the factory below cannot fail
        let template = CkmsQuantiles::new(quantiles)?;
        let window = SlidingWindow::new(
            move || Mutex::new(template.clone()),
            max_age_ms,
            age_buckets,
            clock,
        )?;
        Ok(Self { window })
    }

    pub fn insert(&self, value: f64) {
        self.window.observe(|stream| stream.lock().insert(value));
    }

    /// Estimate over the window, NaN when it saw nothing
    pub fn get(&self, q: f64) -> f64 {
        self.window.current().lock().get(q)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn quantiles() -> Vec<Quantile> {
        vec![Quantile::new(0.5, 0.01).unwrap(), Quantile::new(0.9, 0.01).unwrap()]
    }

    #[test]
    fn test_empty_window_is_nan() {
        let clock = Arc::new(ManualClock::new(0));
        let twq = TimeWindowQuantiles::new(quantiles(), 60_000, 5, clock).unwrap();
        assert!(twq.get(0.5).is_nan());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let clock = Arc::new(ManualClock::new(0));
        assert!(TimeWindowQuantiles::new(quantiles(), 0, 5, clock.clone()).is_err());
        assert!(TimeWindowQuantiles::new(quantiles(), 60_000, 0, clock.clone()).is_err());
        assert!(TimeWindowQuantiles::new(vec![], 60_000, 5, clock).is_err());
    }

    #[test]
    fn test_old_values_do_not_influence_quantiles() {
        let clock = Arc::new(ManualClock::new(0));
        let twq = TimeWindowQuantiles::new(quantiles(), 10_000, 5, clock.clone()).unwrap();
        for _ in 0..100 {
            twq.insert(1000.0);
        }
        assert_eq!(twq.get(0.5), 1000.0);

        clock.advance(10_001);
        for _ in 0..100 {
            twq.insert(1.0);
        }
        // the oldest slot was created after the large values
        clock.advance(2_001);
        assert_eq!(twq.get(0.5), 1.0);
        assert_eq!(twq.get(1.0), 1.0);
    }
}
