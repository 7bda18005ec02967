//! Percentile histogram over reservoir buckets
//!
//! Samples are routed to the bucket whose start boundary is the greatest
//! one not above the sample. Percentiles walk cumulative bucket counts to
//! find the bucket holding the requested rank and let that bucket estimate
//! the value.

use super::bucket::{Bucket, BucketBuilder};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct PercentileHistogram {
    starts: Vec<f64>,
    buckets: Vec<Box<dyn Bucket>>,
}

impl PercentileHistogram {
    /// Create a histogram with one bucket per start boundary
    pub fn new(starts: Vec<f64>, builder: &BucketBuilder) -> Result<Self> {
        if starts.is_empty() {
            return Err(Error::invalid("percentile histogram needs at least one bucket start"));
        }
        if starts.iter().any(|s| s.is_nan()) {
            return Err(Error::invalid("bucket starts must not be NaN"));
        }
        if starts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::invalid("bucket starts must be strictly increasing"));
        }
        let buckets = starts
            .iter()
            .map(|_| builder.new_bucket())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { starts, buckets })
    }

    /// Equally spaced starts `start, start + width, ...`
    pub fn linear(start: f64, width: f64, count: usize, builder: &BucketBuilder) -> Result<Self> {
        if count == 0 || width <= 0.0 {
            return Err(Error::invalid("linear buckets need count > 0 and width > 0"));
        }
        let starts = (0..count).map(|i| start + width * i as f64).collect();
        Self::new(starts, builder)
    }

    pub fn starts(&self) -> &[f64] {
        &self.starts
    }

    pub fn add(&self, sample: f64) {
        if sample.is_nan() {
            return;
        }
        let index = self
            .starts
            .iter()
            .rposition(|&start| start <= sample)
            .unwrap_or(0);
        self.buckets[index].add(sample);
    }

    /// Total observations over all buckets
    pub fn observations(&self) -> u64 {
        self.buckets.iter().map(|b| b.observations()).sum()
    }

    pub fn reset(&self) {
        for bucket in &self.buckets {
            bucket.reset();
        }
    }

    /// Estimate the value at `percentile` in [0, 1]. NaN without data.
    pub fn percentile(&self, percentile: f64) -> f64 {
        let per_bucket: Vec<u64> = self.buckets.iter().map(|b| b.observations()).collect();
        let total: u64 = per_bucket.iter().sum();
        if total == 0 {
            return f64::NAN;
        }

        let prospective = (percentile.clamp(0.0, 1.0) * (total - 1) as f64) as u64;

        let mut previous_cumulative = 0u64;
        for (i, &count) in per_bucket.iter().enumerate() {
            let cumulative = previous_cumulative + count;
            if cumulative == 0 {
                continue;
            }
            if cumulative >= prospective {
                let sub_index = prospective - previous_cumulative.min(prospective);
                if count == sub_index {
                    // rank sits exactly on the boundary, first value of the next populated bucket
                    if let Some(next) = per_bucket[i + 1..].iter().position(|&c| c > 0) {
                        return self.buckets[i + 1 + next].value_for_index(0);
                    }
                    return self.buckets[i].value_for_index(sub_index.saturating_sub(1));
                }
                return self.buckets[i].value_for_index(sub_index);
            }
            previous_cumulative = cumulative;
        }

        self.buckets[0].value_for_index(0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservoir::{Estimator, EvictionPolicy};

    fn accumulating() -> BucketBuilder {
        BucketBuilder::accumulating(1000, EvictionPolicy::oldest(1)).unwrap()
    }

    #[test]
    fn test_rejects_bad_starts() {
        assert!(PercentileHistogram::new(vec![], &accumulating()).is_err());
        assert!(PercentileHistogram::new(vec![1.0, 1.0], &accumulating()).is_err());
        assert!(PercentileHistogram::new(vec![f64::NAN], &accumulating()).is_err());
    }

    #[test]
    fn test_empty_percentile_is_nan() {
        let h = PercentileHistogram::linear(0.0, 10.0, 5, &accumulating()).unwrap();
        assert!(h.percentile(0.5).is_nan());
    }

    #[test]
    fn test_percentiles_over_uniform_input() {
        let h = PercentileHistogram::linear(0.0, 10.0, 10, &accumulating()).unwrap();
        for v in 0..100 {
            h.add(v as f64);
        }
        assert_eq!(h.observations(), 100);

        let p50 = h.percentile(0.5);
        assert!((45.0..=55.0).contains(&p50), "p50 = {}", p50);

        let p90 = h.percentile(0.9);
        assert!((85.0..=95.0).contains(&p90), "p90 = {}", p90);

        assert_eq!(h.percentile(0.0), 0.0);
    }

    #[test]
    fn test_values_below_first_start_go_to_first_bucket() {
        let h = PercentileHistogram::new(vec![10.0, 20.0], &accumulating()).unwrap();
        h.add(-5.0);
        assert_eq!(h.percentile(0.0), -5.0);
    }

    #[test]
    fn test_tallying_percentile() {
        let h =
            PercentileHistogram::new(vec![0.0, 100.0], &BucketBuilder::tallying(Estimator::Maximum))
                .unwrap();
        h.add(10.0);
        h.add(20.0);
        h.add(150.0);
        assert_eq!(h.percentile(0.0), 20.0);
        assert_eq!(h.percentile(1.0), 150.0);
    }

    #[test]
    fn test_reset() {
        let h = PercentileHistogram::linear(0.0, 1.0, 3, &accumulating()).unwrap();
        h.add(1.5);
        h.reset();
        assert_eq!(h.observations(), 0);
    }
}
