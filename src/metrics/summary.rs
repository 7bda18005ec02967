//! Summary
//!
//! Count, sum and optional quantiles over a sliding time window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::family::Family;
use super::{metric_builder, MetricConfig};
use crate::accumulator::{AtomicCount, AtomicF64};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::exemplars::{ExemplarSampler, ExemplarSamplerConfig};
use crate::model::{
    Exemplars, Labels, MetricMetadata, MetricSnapshot, MetricType, QuantileValue, Quantiles, Snapshot,
    SummaryDataPoint,
};
use crate::registry::{Collector, Registry};
use crate::window::{Quantile, TimeWindowQuantiles};

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryConfig {
    pub quantiles: Vec<Quantile>,
    /// Observations older than this do not affect quantiles
    pub max_age: Duration,
    /// Number of sub-windows the max age is divided into
    pub age_buckets: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            quantiles: Vec::new(),
            max_age: Duration::from_secs(5 * 60),
            age_buckets: 5,
        }
    }
}

impl SummaryConfig {
    /// Median, 95th and 99th percentile
    pub fn latency() -> Result<Self> {
        Ok(Self {
            quantiles: vec![
                Quantile::new(0.5, 0.01)?,
                Quantile::new(0.95, 0.005)?,
                Quantile::new(0.99, 0.001)?,
            ],
            ..Default::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_age.is_zero() {
            return Err(Error::invalid("summary max age must be > 0"));
        }
        if self.age_buckets == 0 {
            return Err(Error::invalid("summary age buckets must be > 0"));
        }
        let mut seen: Vec<f64> = self.quantiles.iter().map(|q| q.quantile).collect();
        seen.sort_by(f64::total_cmp);
        if let Some(w) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::invalid(format!("quantile {} configured twice", w[0])));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SummaryCell {
    count: AtomicCount,
    sum: AtomicF64,
    quantiles: Option<TimeWindowQuantiles>,
    tracked: Vec<f64>,
    exemplars: Option<ExemplarSampler>,
    created_ms: i64,
}

impl SummaryCell {
    fn new(summary: &SummaryConfig, config: &MetricConfig) -> Result<Self> {
        let quantiles = if summary.quantiles.is_empty() {
            None
        } else {
            Some(TimeWindowQuantiles::new(
                summary.quantiles.clone(),
                summary.max_age.as_millis() as i64,
                summary.age_buckets,
                config.clock.clone(),
            )?)
        };
        let exemplars = if config.exemplars_enabled {
            Some(ExemplarSampler::new(
                ExemplarSamplerConfig::default(),
                config.span_context.clone(),
                config.clock.clone(),
            )?)
        } else {
            None
        };
        Ok(Self {
            count: AtomicCount::new(),
            sum: AtomicF64::new(0.0),
            quantiles,
            tracked: summary.quantiles.iter().map(|q| q.quantile).collect(),
            exemplars,
            created_ms: config.clock.now_millis(),
        })
    }

    /// Record a value; NaN is ignored
    pub fn observe(&self, value: f64) {
        if self.record(value) {
            if let Some(exemplars) = &self.exemplars {
                exemplars.observe(value);
            }
        }
    }

    pub fn observe_with_exemplar(&self, value: f64, labels: Labels) {
        if self.record(value) {
            if let Some(exemplars) = &self.exemplars {
                exemplars.observe_with_exemplar(value, labels);
            }
        }
    }

    /// Run `f` and observe its duration in seconds
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.observe(start.elapsed().as_secs_f64());
        result
    }

    pub fn count(&self) -> u64 {
        self.count.get()
    }

    pub fn sum(&self) -> f64 {
        self.sum.get()
    }

    /// Current estimate for a configured quantile, NaN if unknown
    pub fn quantile(&self, q: f64) -> f64 {
        self.quantiles.as_ref().map_or(f64::NAN, |w| w.get(q))
    }

    fn record(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.count.inc();
        self.sum.add(value);
        if let Some(quantiles) = &self.quantiles {
            quantiles.insert(value);
        }
        true
    }

    fn data_point(&self, labels: Labels) -> Result<SummaryDataPoint> {
        let quantiles = self
            .tracked
            .iter()
            .map(|&quantile| QuantileValue {
                quantile,
                value: self.quantile(quantile),
            })
            .collect();
        Ok(SummaryDataPoint {
            labels,
            quantiles: Quantiles::new(quantiles)?,
            count: Some(self.count()),
            sum: Some(self.sum()),
            exemplars: self.exemplars.as_ref().map_or_else(Exemplars::empty, ExemplarSampler::collect),
            created_timestamp_millis: Some(self.created_ms),
            scrape_timestamp_millis: None,
        })
    }
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug)]
pub struct Summary {
    metadata: MetricMetadata,
    family: Family<SummaryCell>,
}

impl Summary {
    pub fn builder(name: impl Into<String>) -> SummaryBuilder {
        SummaryBuilder {
            config: MetricConfig::new(name),
            summary: SummaryConfig::default(),
            quantile_errors: Vec::new(),
        }
    }

    pub fn labels(&self, values: &[&str]) -> Result<Arc<SummaryCell>> {
        self.family.labels(values)
    }

    pub fn remove(&self, values: &[&str]) {
        self.family.remove(values);
    }

    pub fn clear(&self) {
        self.family.clear();
    }

    pub fn observe(&self, value: f64) {
        match self.family.no_labels() {
            Some(cell) => cell.observe(value),
            None => debug!(metric = %self.metadata.name(), "Unlabeled observation on labeled summary ignored"),
        }
    }

    pub fn observe_with_exemplar(&self, value: f64, labels: Labels) {
        match self.family.no_labels() {
            Some(cell) => cell.observe_with_exemplar(value, labels),
            None => debug!(metric = %self.metadata.name(), "Unlabeled observation on labeled summary ignored"),
        }
    }

    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        match self.family.no_labels() {
            Some(cell) => cell.time(f),
            None => f(),
        }
    }
}

impl Collector for Summary {
    fn collect(&self) -> Result<MetricSnapshot> {
        let points = self
            .family
            .cells()
            .into_iter()
            .map(|(labels, cell)| cell.data_point(labels))
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricSnapshot::Summary(Snapshot::new(self.metadata.clone(), points)?))
    }

    fn prometheus_name(&self) -> Option<String> {
        Some(self.metadata.prometheus_name().to_string())
    }

    fn metric_type(&self) -> Option<MetricType> {
        Some(MetricType::Summary)
    }

    fn label_names(&self) -> Option<Vec<String>> {
        Some(self.family.label_names().to_vec())
    }
}

pub struct SummaryBuilder {
    config: MetricConfig,
    summary: SummaryConfig,
    quantile_errors: Vec<Error>,
}

metric_builder!(SummaryBuilder);

impl SummaryBuilder {
    /// Track quantile `q` with allowed rank error `epsilon`
    pub fn quantile(mut self, q: f64, epsilon: f64) -> Self {
        match Quantile::new(q, epsilon) {
            Ok(quantile) => self.summary.quantiles.push(quantile),
            Err(e) => self.quantile_errors.push(e),
        }
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.summary.max_age = max_age;
        self
    }

    pub fn age_buckets(mut self, age_buckets: usize) -> Self {
        self.summary.age_buckets = age_buckets;
        self
    }

    pub fn summary_config(mut self, summary: SummaryConfig) -> Self {
        self.summary = summary;
        self
    }

    pub fn build(mut self) -> Result<Summary> {
        if let Some(e) = self.quantile_errors.pop() {
            return Err(e);
        }
        let metadata = self.config.validate(&["quantile"])?;
        self.summary.validate()?;

        let (summary, config) = (self.summary, self.config);
        let family = Family::new(
            config.label_names.clone(),
            config.const_labels.clone(),
            move || SummaryCell::new(&summary, &config),
        )?;
        Ok(Summary { metadata, family })
    }

    pub fn register(self, registry: &Registry) -> Result<Arc<Summary>> {
        let summary = Arc::new(self.build()?);
        registry.register(summary.clone())?;
        Ok(summary)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_matches::assert_matches;

    fn point(summary: &Summary) -> SummaryDataPoint {
        match summary.collect().unwrap() {
            MetricSnapshot::Summary(s) => s.data_points()[0].clone(),
            other => panic!("unexpected snapshot {:?}", other.metric_type()),
        }
    }

    #[test]
    fn test_count_and_sum() {
        let summary = Summary::builder("request_size_bytes").build().unwrap();
        summary.observe(10.0);
        summary.observe(20.0);
        summary.observe(f64::NAN);
        let p = point(&summary);
        assert_eq!(p.count, Some(2));
        assert_eq!(p.sum, Some(30.0));
        assert!(p.quantiles.is_empty());
    }

    #[test]
    fn test_quantiles() {
        let summary = Summary::builder("latency_seconds")
            .quantile(0.5, 0.01)
            .quantile(0.99, 0.001)
            .build()
            .unwrap();
        for i in 1..=1000 {
            summary.observe(i as f64);
        }
        let p = point(&summary);
        let values: Vec<&QuantileValue> = p.quantiles.iter().collect();
        assert_eq!(values.len(), 2);
        assert!((values[0].value - 500.0).abs() <= 10.0);
        assert!((values[1].value - 990.0).abs() <= 2.0);
    }

    #[test]
    fn test_quantiles_expire() {
        let clock = Arc::new(ManualClock::new(0));
        let summary = Summary::builder("latency_seconds")
            .quantile(0.5, 0.01)
            .max_age(Duration::from_secs(10))
            .age_buckets(2)
            .clock(clock.clone())
            .build()
            .unwrap();
        summary.observe(1.0);
        clock.advance(11_000);
        assert!(point(&summary).quantiles.iter().next().unwrap().value.is_nan());
        // count and sum are cumulative
        assert_eq!(point(&summary).count, Some(1));
    }

    #[test]
    fn test_invalid_configuration() {
        assert_matches!(
            Summary::builder("s").quantile(1.5, 0.01).build(),
            Err(Error::InvalidQuantile(_))
        );
        assert_matches!(
            Summary::builder("s").age_buckets(0).build(),
            Err(Error::InvalidArgument(_))
        );
        assert!(Summary::builder("s").label_names(["quantile"]).build().is_err());
    }

    #[test]
    fn test_latency_preset() {
        let config = SummaryConfig::latency().unwrap();
        assert_eq!(config.quantiles.len(), 3);
        let summary = Summary::builder("rpc_seconds").summary_config(config).build().unwrap();
        summary.time(|| ());
        assert_eq!(point(&summary).count, Some(1));
    }
}
