//! Reservoir buckets
//!
//! Two flavours share the [`Bucket`] contract:
//!
//! - [`AccumulatingBucket`] keeps raw samples up to a fixed capacity and
//!   runs an [`EvictionPolicy`] before it would overflow.
//! - [`TallyingBucket`] keeps only min/max/count and answers through an
//!   [`Estimator`].

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::estimator::Estimator;
use super::eviction::EvictionPolicy;
use crate::accumulator::{AtomicCount, AtomicF64};
use crate::error::Result;

/// A bounded sample store answering rank queries
pub trait Bucket: Send + Sync + std::fmt::Debug {
    /// Offer one value
    fn add(&self, value: f64);

    /// Values offered since the last reset
    fn observations(&self) -> u64;

    /// Samples physically held
    fn size(&self) -> usize;

    /// Forget everything
    fn reset(&self);

    /// Estimate the value at rank `index` among all observations
    fn value_for_index(&self, index: u64) -> f64;
}

// =============================================================================
// Accumulating
// =============================================================================

#[derive(Debug, Default)]
struct Samples {
    values: VecDeque<f64>,
    observations: u64,
}

#[derive(Debug)]
pub struct AccumulatingBucket {
    capacity: usize,
    policy: EvictionPolicy,
    state: Mutex<Samples>,
}

impl AccumulatingBucket {
    /// Create a bucket. Fails if the policy cannot make room at this capacity.
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Result<Self> {
        policy.validate(capacity)?;
        Ok(Self {
            capacity,
            policy,
            state: Mutex::new(Samples {
                values: VecDeque::with_capacity(capacity),
                observations: 0,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Copy of the samples, oldest first
    pub fn samples(&self) -> Vec<f64> {
        self.state.lock().values.iter().copied().collect()
    }
}

impl Bucket for AccumulatingBucket {
    fn add(&self, value: f64) {
        let mut state = self.state.lock();
        if state.values.len() + 1 >= self.capacity {
            self.policy.evict(&mut state.values);
        }
        state.values.push_back(value);
        state.observations += 1;
    }

    fn observations(&self) -> u64 {
        self.state.lock().observations
    }

    fn size(&self) -> usize {
        self.state.lock().values.len()
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.values.clear();
        state.observations = 0;
    }

    fn value_for_index(&self, index: u64) -> f64 {
        let (mut sorted, observations) = {
            let state = self.state.lock();
            (
                state.values.iter().copied().collect::<Vec<_>>(),
                state.observations,
            )
        };
        if sorted.is_empty() || observations == 0 {
            return f64::NAN;
        }
        sorted.sort_by(f64::total_cmp);

        // rank is relative to lifetime observations, not physical size
        let position = ((sorted.len() - 1) as f64 * index as f64 / observations as f64) as usize;
        sorted[position.min(sorted.len() - 1)]
    }
}

// =============================================================================
// Tallying
// =============================================================================

#[derive(Debug)]
pub struct TallyingBucket {
    estimator: Estimator,
    minimum: AtomicF64,
    maximum: AtomicF64,
    observations: AtomicCount,
}

impl TallyingBucket {
    pub fn new(estimator: Estimator) -> Self {
        Self {
            estimator,
            minimum: AtomicF64::new(f64::INFINITY),
            maximum: AtomicF64::new(f64::NEG_INFINITY),
            observations: AtomicCount::new(),
        }
    }

    pub fn minimum(&self) -> f64 {
        self.minimum.get()
    }

    pub fn maximum(&self) -> f64 {
        self.maximum.get()
    }
}

impl Default for TallyingBucket {
    fn default() -> Self {
        Self::new(Estimator::default())
    }
}

impl Bucket for TallyingBucket {
    fn add(&self, value: f64) {
        self.minimum.min(value);
        self.maximum.max(value);
        self.observations.inc();
    }

    fn observations(&self) -> u64 {
        self.observations.get()
    }

    fn size(&self) -> usize {
        0
    }

    fn reset(&self) {
        self.minimum.set(f64::INFINITY);
        self.maximum.set(f64::NEG_INFINITY);
        self.observations.reset();
    }

    fn value_for_index(&self, index: u64) -> f64 {
        self.estimator.estimate_for(
            self.minimum.get(),
            self.maximum.get(),
            index,
            self.observations.get(),
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Factory for fresh buckets of one configured kind
#[derive(Debug, Clone)]
pub enum BucketBuilder {
    Accumulating {
        capacity: usize,
        policy: EvictionPolicy,
    },
    Tallying {
        estimator: Estimator,
    },
}

impl Default for BucketBuilder {
    fn default() -> Self {
        BucketBuilder::Accumulating {
            capacity: 50,
            policy: EvictionPolicy::replace_with_average(10),
        }
    }
}

impl BucketBuilder {
    pub fn accumulating(capacity: usize, policy: EvictionPolicy) -> Result<Self> {
        policy.validate(capacity)?;
        Ok(BucketBuilder::Accumulating { capacity, policy })
    }

    pub fn tallying(estimator: Estimator) -> Self {
        BucketBuilder::Tallying { estimator }
    }

    pub fn new_bucket(&self) -> Result<Box<dyn Bucket>> {
        Ok(match self {
            BucketBuilder::Accumulating { capacity, policy } => {
                Box::new(AccumulatingBucket::new(*capacity, policy.clone())?)
            }
            BucketBuilder::Tallying { estimator } => {
                Box::new(TallyingBucket::new(estimator.clone()))
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
