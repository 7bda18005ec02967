//! Reservoir Eviction Policies
//!
//! Configurable policies deciding how an accumulating bucket makes room
//! before it would exceed its capacity.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{Error, Result};

/// How evicted samples are folded into one replacement value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Minimum,
    Maximum,
    Average,
    Median,
}

impl Reducer {
    /// Reduce a non-empty slice to one value
    pub fn reduce(&self, values: &mut [f64]) -> f64 {
        match self {
            Reducer::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Average => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Median => {
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
        }
    }
}

/// Eviction policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    /// Name of the policy
    pub name: String,
    /// Number of oldest samples removed per eviction
    pub count: usize,
    /// Replace the removed samples with one reduced value
    pub reducer: Option<Reducer>,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::oldest(1)
    }
}

impl EvictionPolicy {
    /// Drop the `count` oldest samples
    pub fn oldest(count: usize) -> Self {
        Self {
            name: format!("evict-oldest-{}", count),
            count,
            reducer: None,
        }
    }

    /// Replace the `count` oldest samples with one reduced value
    pub fn replace_with(count: usize, reducer: Reducer) -> Self {
        Self {
            name: format!("evict-and-replace-{}-{:?}", count, reducer).to_lowercase(),
            count,
            reducer: Some(reducer),
        }
    }

    /// Replace the `count` oldest samples with their minimum
    pub fn replace_with_minimum(count: usize) -> Self {
        Self::replace_with(count, Reducer::Minimum)
    }

    /// Replace the `count` oldest samples with their maximum
    pub fn replace_with_maximum(count: usize) -> Self {
        Self::replace_with(count, Reducer::Maximum)
    }

    /// Replace the `count` oldest samples with their mean
    pub fn replace_with_average(count: usize) -> Self {
        Self::replace_with(count, Reducer::Average)
    }

    /// Replace the `count` oldest samples with their median
    pub fn replace_with_median(count: usize) -> Self {
        Self::replace_with(count, Reducer::Median)
    }

    /// Check that eviction makes progress for a bucket of `capacity`
    pub fn validate(&self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(Error::invalid("bucket capacity must be at least 1"));
        }
        let min_count = if self.reducer.is_some() { 2 } else { 1 };
        if self.count < min_count || self.count > capacity {
            return Err(Error::invalid(format!(
                "eviction policy '{}' must remove between {} and {} samples, got {}",
                self.name, min_count, capacity, self.count
            )));
        }
        Ok(())
    }

    /// Evict from the oldest end of `samples` in place.
    ///
    /// No-op when fewer than `count` samples are held.
    pub fn evict(&self, samples: &mut VecDeque<f64>) {
        if self.count > samples.len() {
            trace!(
                policy = %self.name,
                size = samples.len(),
                "eviction count exceeds reservoir size, skipping"
            );
            return;
        }

        let mut removed: Vec<f64> = samples.drain(..self.count).collect();
        if let Some(reducer) = self.reducer {
            samples.push_front(reducer.reduce(&mut removed));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn deque(values: &[f64]) -> VecDeque<f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_evict_oldest() {
        let mut samples = deque(&[1.0, 2.0, 3.0, 4.0]);
        EvictionPolicy::oldest(2).evict(&mut samples);
        assert_eq!(samples, deque(&[3.0, 4.0]));
    }

    #[test]
    fn test_evict_count_exceeds_size_is_noop() {
        let mut samples = deque(&[1.0, 2.0]);
        EvictionPolicy::oldest(3).evict(&mut samples);
        assert_eq!(samples, deque(&[1.0, 2.0]));

        EvictionPolicy::replace_with_average(3).evict(&mut samples);
        assert_eq!(samples, deque(&[1.0, 2.0]));
    }

    #[test]
    fn test_replace_with_reducers() {
        let base = [4.0, 1.0, 3.0, 9.0];

        let mut s = deque(&base);
        EvictionPolicy::replace_with_minimum(3).evict(&mut s);
        assert_eq!(s, deque(&[1.0, 9.0]));

        let mut s = deque(&base);
        EvictionPolicy::replace_with_maximum(3).evict(&mut s);
        assert_eq!(s, deque(&[4.0, 9.0]));

        let mut s = deque(&base);
        EvictionPolicy::replace_with_average(2).evict(&mut s);
        assert_eq!(s, deque(&[2.5, 3.0, 9.0]));

        let mut s = deque(&base);
        EvictionPolicy::replace_with_median(3).evict(&mut s);
        assert_eq!(s, deque(&[3.0, 9.0]));

        let mut s = deque(&base);
        EvictionPolicy::replace_with_median(4).evict(&mut s);
        assert_eq!(s, deque(&[3.5]));
    }

    #[test]
    fn test_validate() {
        assert!(EvictionPolicy::oldest(1).validate(1).is_ok());
        assert!(EvictionPolicy::oldest(0).validate(4).is_err());
        assert!(EvictionPolicy::oldest(5).validate(4).is_err());
        assert!(EvictionPolicy::replace_with_average(1).validate(4).is_err());
        assert!(EvictionPolicy::replace_with_average(2).validate(4).is_ok());
        assert!(EvictionPolicy::oldest(1).validate(0).is_err());
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(EvictionPolicy::oldest(2).name, "evict-oldest-2");
        assert_eq!(
            EvictionPolicy::replace_with_median(2).name,
            "evict-and-replace-2-median"
        );
    }
}
