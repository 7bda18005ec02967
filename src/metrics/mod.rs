//! Instruments
//!
//! The types application code holds on to. Each instrument is a
//! [`Collector`](crate::registry::Collector) over a [`Family`] of cells:
//!
//! ```text
//!   Counter::labels(&["/a"]) ──▶ Family (DashMap) ──▶ Arc<CounterCell>
//!                                                        │ inc / inc_by
//!                                                        ▼
//!   Registry::scrape() ──▶ Counter::collect() ──▶ CounterSnapshot
//! ```
//!
//! Builders validate names and label names once; the hot path afterwards
//! only touches atomics.

pub mod counter;
pub mod family;
pub mod gauge;
pub mod histogram;
pub mod info;
pub mod instrument;
pub mod stateset;
pub mod summary;

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

pub use counter::{Counter, CounterBuilder, CounterCell};
pub use family::Family;
pub use gauge::{Gauge, GaugeBuilder, GaugeCell};
pub use histogram::{
    exponential_buckets, linear_buckets, Histogram, HistogramBuilder, HistogramCell,
    NativeHistogramConfig, DEFAULT_CLASSIC_UPPER_BOUNDS,
};
pub use info::{Info, InfoBuilder};
pub use stateset::{StateSet, StateSetBuilder, StateSetCell};
pub use summary::{Summary, SummaryBuilder, SummaryCell, SummaryConfig};

use crate::clock::{self, Clock};
use crate::error::{Error, Result};
use crate::exemplars::{DefaultExemplarSampler, NoopSpanContext, SpanContext, MIN_RETENTION_INTERVAL_MS};
use crate::model::naming::{is_valid_label_name, validate_metric_name};
use crate::model::{Exemplar, Labels, MetricMetadata, Unit};

// =============================================================================
// Common Configuration
// =============================================================================

/// Settings shared by every instrument builder
#[derive(Debug, Clone)]
pub struct MetricConfig {
    pub name: String,
    pub help: Option<String>,
    pub unit: Option<Unit>,
    pub label_names: Vec<String>,
    pub const_labels: Labels,
    pub span_context: Arc<dyn SpanContext>,
    pub clock: Arc<dyn Clock>,
    pub exemplars_enabled: bool,
}

impl MetricConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: None,
            unit: None,
            label_names: Vec::new(),
            const_labels: Labels::empty(),
            span_context: Arc::new(NoopSpanContext),
            clock: clock::system(),
            exemplars_enabled: true,
        }
    }

    /// Validate names and produce the metadata every snapshot carries.
    ///
    /// `reserved` lists label names the instrument's exposition already uses.
    pub fn validate(&self, reserved: &[&str]) -> Result<MetricMetadata> {
        validate_metric_name(&self.name)?;

        let mut seen = HashSet::new();
        for name in self.label_names.iter().map(String::as_str).chain(self.const_labels.names()) {
            if !is_valid_label_name(name) {
                return Err(Error::InvalidLabelName(name.to_string()));
            }
            if reserved.contains(&name) {
                return Err(Error::invalid(format!(
                    "'{}' is a reserved label name for {}",
                    name, self.name
                )));
            }
            if !seen.insert(name) {
                return Err(Error::DuplicateLabelName(name.to_string()));
            }
        }

        MetricMetadata::with(self.name.clone(), self.help.clone(), self.unit.clone())
    }
}

/// Builder methods shared by all instrument builders. The builder must
/// have a `config: MetricConfig` field.
macro_rules! metric_builder {
    ($builder:ident) => {
        impl $builder {
            pub fn help(mut self, help: impl Into<String>) -> Self {
                self.config.help = Some(help.into());
                self
            }

            pub fn unit(mut self, unit: $crate::model::Unit) -> Self {
                self.config.unit = Some(unit);
                self
            }

            pub fn label_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
                self.config.label_names = names.into_iter().map(Into::into).collect();
                self
            }

            /// Labels added to every data point of this metric
            pub fn const_labels(mut self, labels: $crate::model::Labels) -> Self {
                self.config.const_labels = labels;
                self
            }

            pub fn span_context(
                mut self,
                span_context: std::sync::Arc<dyn $crate::exemplars::SpanContext>,
            ) -> Self {
                self.config.span_context = span_context;
                self
            }

            pub fn clock(mut self, clock: std::sync::Arc<dyn $crate::clock::Clock>) -> Self {
                self.config.clock = clock;
                self
            }

            pub fn without_exemplars(mut self) -> Self {
                self.config.exemplars_enabled = false;
                self
            }
        }
    };
}
pub(crate) use metric_builder;

// =============================================================================
// Single Exemplar Slot
// =============================================================================

/// One retained exemplar, as counters and gauges keep it.
///
/// Without a sampled span `observe` returns before reading the clock. The
/// timestamp mirror lets it skip the lock while the current exemplar is
/// younger than the retention interval.
#[derive(Debug)]
pub(crate) struct ExemplarSlot {
    sampler: Option<DefaultExemplarSampler>,
    span_context: Arc<dyn SpanContext>,
    clock: Arc<dyn Clock>,
    exemplar: Mutex<Option<Exemplar>>,
    timestamp_ms: AtomicI64,
}

impl ExemplarSlot {
    pub(crate) fn new(config: &MetricConfig) -> Self {
        Self {
            sampler: config
                .exemplars_enabled
                .then(|| DefaultExemplarSampler::new(config.span_context.clone(), config.clock.clone())),
            span_context: config.span_context.clone(),
            clock: config.clock.clone(),
            exemplar: Mutex::new(None),
            timestamp_ms: AtomicI64::new(i64::MIN),
        }
    }

    pub(crate) fn observe(&self, value: f64) {
        let Some(sampler) = &self.sampler else {
            return;
        };
        if !self.span_context.is_current_span_sampled() {
            return;
        }
        let ts = self.timestamp_ms.load(Ordering::Relaxed);
        if ts != i64::MIN && self.clock.now_millis() - ts <= MIN_RETENTION_INTERVAL_MS {
            return;
        }
        let mut slot = self.exemplar.lock();
        if let Some(exemplar) = sampler.sample(value, slot.as_ref()) {
            self.store(&mut slot, exemplar);
        }
    }

    /// Caller-provided exemplar, replaces the current one unconditionally
    pub(crate) fn observe_with_labels(&self, value: f64, labels: Labels) {
        match Exemplar::new(value, labels, Some(self.clock.now_millis())) {
            Ok(exemplar) => {
                let mut slot = self.exemplar.lock();
                self.store(&mut slot, exemplar);
            }
            Err(e) => trace!(error = %e, "Dropping exemplar"),
        }
    }

    pub(crate) fn get(&self) -> Option<Exemplar> {
        self.exemplar.lock().clone()
    }

    fn store(&self, slot: &mut Option<Exemplar>, exemplar: Exemplar) {
        self.timestamp_ms
            .store(exemplar.timestamp_millis().unwrap_or(i64::MIN), Ordering::Relaxed);
        *slot = Some(exemplar);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::exemplars::StaticSpanContext;
    use assert_matches::assert_matches;

    #[test]
    fn test_validate_names() {
        let mut config = MetricConfig::new("http.requests");
        config.label_names = vec!["path".to_string()];
        let metadata = config.validate(&[]).unwrap();
        assert_eq!(metadata.prometheus_name(), "http_requests");

        assert_matches!(
            MetricConfig::new("requests_created").validate(&[]),
            Err(Error::InvalidMetricName { .. })
        );
        assert_matches!(
            MetricConfig::new("1requests").validate(&[]),
            Err(Error::InvalidMetricName { .. })
        );
    }

    #[test]
    fn test_validate_label_names() {
        let mut config = MetricConfig::new("latency");
        config.label_names = vec!["__reserved".to_string()];
        assert_matches!(config.validate(&[]), Err(Error::InvalidLabelName(_)));

        config.label_names = vec!["le".to_string()];
        assert_matches!(config.validate(&["le"]), Err(Error::InvalidArgument(_)));

        config.label_names = vec!["env".to_string()];
        config.const_labels = Labels::of([("env", "prod")]).unwrap();
        assert_matches!(config.validate(&[]), Err(Error::DuplicateLabelName(_)));
    }

    #[test]
    fn test_exemplar_slot_retention() {
        let clock = Arc::new(ManualClock::new(50_000));
        let mut config = MetricConfig::new("jobs");
        config.clock = clock.clone();
        config.span_context = Arc::new(StaticSpanContext::sampled("t1", "s1"));
        let slot = ExemplarSlot::new(&config);

        slot.observe(1.0);
        clock.advance(1_000);
        slot.observe(2.0);
        assert_eq!(slot.get().map(|e| e.value()), Some(1.0));

        clock.advance(MIN_RETENTION_INTERVAL_MS);
        slot.observe(3.0);
        assert_eq!(slot.get().map(|e| e.value()), Some(3.0));
    }

    /// Counts clock reads; every sampling attempt reads the clock
    #[derive(Debug, Default)]
    struct CountingClock {
        reads: AtomicI64,
    }

    impl Clock for CountingClock {
        fn now_millis(&self) -> i64 {
            self.reads.fetch_add(1, Ordering::Relaxed);
            1_000_000
        }
    }

    #[test]
    fn test_exemplar_slot_without_span_skips_sampling() {
        let clock = Arc::new(CountingClock::default());
        let mut config = MetricConfig::new("jobs");
        config.clock = clock.clone();
        let slot = ExemplarSlot::new(&config);

        for _ in 0..100 {
            slot.observe(1.0);
        }
        assert_eq!(clock.reads.load(Ordering::Relaxed), 0);
        assert!(slot.get().is_none());

        let span = Arc::new(StaticSpanContext::new());
        config.span_context = span.clone();
        let slot = ExemplarSlot::new(&config);
        span.set("t1", "s1", false);
        slot.observe(1.0);
        assert_eq!(clock.reads.load(Ordering::Relaxed), 0);

        span.set("t1", "s1", true);
        slot.observe(1.0);
        assert!(clock.reads.load(Ordering::Relaxed) > 0);
        assert_eq!(slot.get().map(|e| e.value()), Some(1.0));
    }

    #[test]
    fn test_exemplar_slot_disabled() {
        let mut config = MetricConfig::new("jobs");
        config.span_context = Arc::new(StaticSpanContext::sampled("t1", "s1"));
        config.exemplars_enabled = false;
        let slot = ExemplarSlot::new(&config);
        slot.observe(1.0);
        assert!(slot.get().is_none());

        slot.observe_with_labels(2.0, Labels::of([("user", "7")]).unwrap());
        assert_eq!(slot.get().map(|e| e.value()), Some(2.0));
    }
}
