//! Counter
//!
//! Monotonically increasing value, exposed with a `_total` suffix. Each
//! cell keeps its created timestamp and at most one exemplar.

use std::sync::Arc;

use tracing::debug;

use super::family::Family;
use super::{metric_builder, ExemplarSlot, MetricConfig};
use crate::accumulator::AtomicF64;
use crate::error::{Error, Result};
use crate::model::{
    CounterDataPoint, Labels, MetricMetadata, MetricSnapshot, MetricType, Snapshot,
};
use crate::registry::{Collector, Registry};

#[derive(Debug)]
pub struct CounterCell {
    name: Arc<str>,
    value: AtomicF64,
    exemplar: ExemplarSlot,
    created_ms: i64,
}

impl CounterCell {
    fn new(name: Arc<str>, config: &MetricConfig) -> Self {
        Self {
            name,
            value: AtomicF64::new(0.0),
            exemplar: ExemplarSlot::new(config),
            created_ms: config.clock.now_millis(),
        }
    }

    pub fn inc(&self) {
        self.value.add(1.0);
        self.exemplar.observe(1.0);
    }

    /// Add `amount`; negative and NaN amounts are rejected
    pub fn inc_by(&self, amount: f64) -> Result<()> {
        self.check(amount)?;
        self.value.add(amount);
        self.exemplar.observe(amount);
        Ok(())
    }

    /// Add `amount` and attach `labels` as the exemplar
    pub fn inc_with_exemplar(&self, amount: f64, labels: Labels) -> Result<()> {
        self.check(amount)?;
        self.value.add(amount);
        self.exemplar.observe_with_labels(amount, labels);
        Ok(())
    }

    pub fn get(&self) -> f64 {
        self.value.get()
    }

    pub fn created_timestamp_millis(&self) -> i64 {
        self.created_ms
    }

    fn check(&self, amount: f64) -> Result<()> {
        if amount < 0.0 || amount.is_nan() {
            return Err(Error::NegativeIncrement {
                name: self.name.to_string(),
                amount,
            });
        }
        Ok(())
    }

    fn data_point(&self, labels: Labels) -> CounterDataPoint {
        CounterDataPoint {
            labels,
            value: self.get(),
            exemplar: self.exemplar.get(),
            created_timestamp_millis: Some(self.created_ms),
            scrape_timestamp_millis: None,
        }
    }
}

// =============================================================================
// Counter
// =============================================================================

#[derive(Debug)]
pub struct Counter {
    metadata: MetricMetadata,
    family: Family<CounterCell>,
}

impl Counter {
    /// A trailing `_total` is dropped; `requests_total` and `requests`
    /// name the same counter.
    pub fn builder(name: impl Into<String>) -> CounterBuilder {
        CounterBuilder {
            config: MetricConfig::new(normalize_name(name.into())),
        }
    }

    pub fn labels(&self, values: &[&str]) -> Result<Arc<CounterCell>> {
        self.family.labels(values)
    }

    pub fn remove(&self, values: &[&str]) {
        self.family.remove(values);
    }

    pub fn clear(&self) {
        self.family.clear();
    }

    pub fn inc(&self) {
        if let Some(cell) = self.unlabeled() {
            cell.inc();
        }
    }

    pub fn inc_by(&self, amount: f64) -> Result<()> {
        match self.unlabeled() {
            Some(cell) => cell.inc_by(amount),
            None => Ok(()),
        }
    }

    pub fn inc_with_exemplar(&self, amount: f64, labels: Labels) -> Result<()> {
        match self.unlabeled() {
            Some(cell) => cell.inc_with_exemplar(amount, labels),
            None => Ok(()),
        }
    }

    /// Value of the unlabeled cell, 0 for labeled counters
    pub fn get(&self) -> f64 {
        self.family.no_labels().map_or(0.0, |c| c.get())
    }

    fn unlabeled(&self) -> Option<&Arc<CounterCell>> {
        let cell = self.family.no_labels();
        if cell.is_none() {
            debug!(metric = %self.metadata.name(), "Unlabeled update on labeled counter ignored");
        }
        cell
    }
}

impl Collector for Counter {
    fn collect(&self) -> Result<MetricSnapshot> {
        let points = self
            .family
            .cells()
            .into_iter()
            .map(|(labels, cell)| cell.data_point(labels))
            .collect();
        Ok(MetricSnapshot::Counter(Snapshot::new(self.metadata.clone(), points)?))
    }

    fn prometheus_name(&self) -> Option<String> {
        Some(self.metadata.prometheus_name().to_string())
    }

    fn metric_type(&self) -> Option<MetricType> {
        Some(MetricType::Counter)
    }

    fn label_names(&self) -> Option<Vec<String>> {
        Some(self.family.label_names().to_vec())
    }
}

// =============================================================================
// Builder
// =============================================================================

const TOTAL_SUFFIX: &str = "_total";

fn normalize_name(mut name: String) -> String {
    if name.ends_with(TOTAL_SUFFIX) {
        name.truncate(name.len() - TOTAL_SUFFIX.len());
    }
    name
}

pub struct CounterBuilder {
    config: MetricConfig,
}

metric_builder!(CounterBuilder);

impl CounterBuilder {
    pub fn build(self) -> Result<Counter> {
        let metadata = self.config.validate(&[])?;
        let name: Arc<str> = Arc::from(self.config.name.as_str());
        let config = self.config;
        let family = Family::new(
            config.label_names.clone(),
            config.const_labels.clone(),
            move || Ok(CounterCell::new(name.clone(), &config)),
        )?;
        Ok(Counter { metadata, family })
    }

    pub fn register(self, registry: &Registry) -> Result<Arc<Counter>> {
        let counter = Arc::new(self.build()?);
        registry.register(counter.clone())?;
        Ok(counter)
    }
}

// =============================================================================
// Tests
// =============================================================================
