//! Exemplar Sampling
//!
//! Links observations to traces. Counters retain one exemplar through
//! [`DefaultExemplarSampler`]; histograms and summaries keep a slot array
//! per metric in [`ExemplarSampler`]. Both read ids from a [`SpanContext`].

pub mod retention;
pub mod sampler;
pub mod span;

pub use retention::{DefaultExemplarSampler, MIN_RETENTION_INTERVAL_MS};
pub use sampler::{ExemplarSampler, ExemplarSamplerConfig, DEFAULT_NUMBER_OF_EXEMPLARS};
pub use span::{NoopSpanContext, SpanContext, StaticSpanContext};
