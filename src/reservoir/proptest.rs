//! Property-Based Tests for Reservoir Buckets
//!
//! # Test Properties
//!
//! 1. **Capacity**: `size() <= capacity` after every add
//! 2. **Observation Count**: equals the number of adds since reset
//! 3. **Index Mapping**: `value_for_index` picks position
//!    `floor((len - 1) * index / observations)` of the sorted samples

#![cfg(test)]

use proptest::prelude::*;

use super::bucket::{AccumulatingBucket, Bucket, TallyingBucket};
use super::estimator::Estimator;
use super::eviction::{EvictionPolicy, Reducer};

// =============================================================================
// Property Strategies
// =============================================================================

fn reducer_strategy() -> impl Strategy<Value = Option<Reducer>> {
    prop_oneof![
        Just(None),
        Just(Some(Reducer::Minimum)),
        Just(Some(Reducer::Maximum)),
        Just(Some(Reducer::Average)),
        Just(Some(Reducer::Median)),
    ]
}

/// Valid (capacity, policy) pairs
fn bucket_config_strategy() -> impl Strategy<Value = (usize, EvictionPolicy)> {
    (1usize..=32, reducer_strategy())
        .prop_filter("replace needs capacity >= 2", |(cap, r)| r.is_none() || *cap >= 2)
        .prop_flat_map(|(capacity, reducer)| {
            let min_count = if reducer.is_some() { 2 } else { 1 };
            (Just(capacity), min_count..=capacity, Just(reducer))
        })
        .prop_map(|(capacity, count, reducer)| {
            let policy = match reducer {
                Some(r) => EvictionPolicy::replace_with(count, r),
                None => EvictionPolicy::oldest(count),
            };
            (capacity, policy)
        })
}

fn samples_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 0..500)
}

// =============================================================================
// Accumulating Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the reservoir never holds more than its capacity.
    #[test]
    fn prop_size_never_exceeds_capacity(
        (capacity, policy) in bucket_config_strategy(),
        samples in samples_strategy(),
    ) {
        let bucket = AccumulatingBucket::new(capacity, policy)?;
        for v in samples {
            bucket.add(v);
            prop_assert!(bucket.size() <= capacity);
        }
    }

    /// Property: observations count every add regardless of eviction.
    #[test]
    fn prop_observations_count_all_adds(
        (capacity, policy) in bucket_config_strategy(),
        first in samples_strategy(),
        second in samples_strategy(),
    ) {
        let bucket = AccumulatingBucket::new(capacity, policy)?;
        let mut last = 0;
        for v in &first {
            bucket.add(*v);
            prop_assert!(bucket.observations() > last);
            last = bucket.observations();
        }
        prop_assert_eq!(bucket.observations(), first.len() as u64);

        bucket.reset();
        prop_assert_eq!(bucket.observations(), 0);
        for v in &second {
            bucket.add(*v);
        }
        prop_assert_eq!(bucket.observations(), second.len() as u64);
    }

    /// Property: rank mapping uses lifetime observations as denominator.
    #[test]
    fn prop_value_for_index_formula(
        (capacity, policy) in bucket_config_strategy(),
        samples in prop::collection::vec(-1.0e6f64..1.0e6, 1..300),
        index_fraction in 0.0f64..1.0,
    ) {
        let bucket = AccumulatingBucket::new(capacity, policy)?;
        for v in &samples {
            bucket.add(*v);
        }
        let observations = bucket.observations();
        let index = (index_fraction * observations as f64) as u64;

        let mut sorted = bucket.samples();
        sorted.sort_by(f64::total_cmp);
        let position = ((sorted.len() - 1) as f64 * index as f64 / observations as f64) as usize;

        prop_assert_eq!(bucket.value_for_index(index), sorted[position]);
    }
}

// =============================================================================
// Tallying Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: tallying extrema bound every estimate.
    #[test]
    fn prop_tallying_estimates_within_extrema(
        samples in prop::collection::vec(-1.0e6f64..1.0e6, 1..200),
        index in 0u64..200,
    ) {
        for estimator in [Estimator::Minimum, Estimator::Maximum, Estimator::Average, Estimator::Uniform] {
            let bucket = TallyingBucket::new(estimator);
            for v in &samples {
                bucket.add(*v);
            }
            let estimate = bucket.value_for_index(index);
            prop_assert!(estimate >= bucket.minimum() && estimate <= bucket.maximum());
            prop_assert_eq!(bucket.observations(), samples.len() as u64);
        }
    }
}
