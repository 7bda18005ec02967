//! Bucketed Reservoir
//!
//! Fixed-capacity sample stores used to estimate distribution statistics
//! without keeping unbounded history.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PercentileHistogram                        │
//! │   starts:  [ s0 ]      [ s1 ]      [ s2 ]   ...               │
//! │              │           │           │                        │
//! │         ┌────▼────┐ ┌────▼────┐ ┌────▼────┐                   │
//! │         │ Bucket  │ │ Bucket  │ │ Bucket  │                   │
//! │         └─────────┘ └─────────┘ └─────────┘                   │
//! └──────────────────────────────────────────────────────────────┘
//!
//!   AccumulatingBucket: raw samples + EvictionPolicy (oldest / reduce)
//!   TallyingBucket:     min, max, count + Estimator
//! ```
//!
//! # Invariants
//!
//! - `size() <= capacity` after every `add`
//! - `observations()` equals the number of `add` calls since `reset()`

pub mod bucket;
pub mod estimator;
pub mod eviction;
pub mod histogram;

mod proptest;

pub use bucket::{AccumulatingBucket, Bucket, BucketBuilder, TallyingBucket};
pub use estimator::Estimator;
pub use eviction::{EvictionPolicy, Reducer};
pub use histogram::PercentileHistogram;
