//! Gauge

use std::sync::Arc;

use tracing::debug;

use super::family::Family;
use super::{metric_builder, ExemplarSlot, MetricConfig};
use crate::accumulator::AtomicF64;
use crate::clock::Clock;
use crate::error::Result;
use crate::model::{GaugeDataPoint, Labels, MetricMetadata, MetricSnapshot, MetricType, Snapshot};
use crate::registry::{Collector, Registry};

#[derive(Debug)]
pub struct GaugeCell {
    value: AtomicF64,
    exemplar: ExemplarSlot,
    clock: Arc<dyn Clock>,
}

impl GaugeCell {
    fn new(config: &MetricConfig) -> Self {
        Self {
            value: AtomicF64::new(0.0),
            exemplar: ExemplarSlot::new(config),
            clock: config.clock.clone(),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.set(value);
        self.exemplar.observe(value);
    }

    pub fn set_with_exemplar(&self, value: f64, labels: Labels) {
        self.value.set(value);
        self.exemplar.observe_with_labels(value, labels);
    }

    pub fn inc(&self) {
        self.inc_by(1.0);
    }

    pub fn inc_by(&self, amount: f64) {
        let value = self.value.add(amount);
        self.exemplar.observe(value);
    }

    pub fn dec(&self) {
        self.inc_by(-1.0);
    }

    pub fn dec_by(&self, amount: f64) {
        self.inc_by(-amount);
    }

    /// Set to the current Unix time in seconds
    pub fn set_to_current_time(&self) {
        self.set(self.clock.now_millis() as f64 / 1000.0);
    }

    pub fn get(&self) -> f64 {
        self.value.get()
    }

    fn data_point(&self, labels: Labels) -> GaugeDataPoint {
        GaugeDataPoint {
            labels,
            value: self.get(),
            exemplar: self.exemplar.get(),
            scrape_timestamp_millis: None,
        }
    }
}

#[derive(Debug)]
pub struct Gauge {
    metadata: MetricMetadata,
    family: Family<GaugeCell>,
}

impl Gauge {
    pub fn builder(name: impl Into<String>) -> GaugeBuilder {
        GaugeBuilder {
            config: MetricConfig::new(name),
        }
    }

    pub fn labels(&self, values: &[&str]) -> Result<Arc<GaugeCell>> {
        self.family.labels(values)
    }

    pub fn remove(&self, values: &[&str]) {
        self.family.remove(values);
    }

    pub fn clear(&self) {
        self.family.clear();
    }

    pub fn set(&self, value: f64) {
        self.with_unlabeled(|c| c.set(value));
    }

    pub fn inc(&self) {
        self.with_unlabeled(GaugeCell::inc);
    }

    pub fn inc_by(&self, amount: f64) {
        self.with_unlabeled(|c| c.inc_by(amount));
    }

    pub fn dec(&self) {
        self.with_unlabeled(GaugeCell::dec);
    }

    pub fn dec_by(&self, amount: f64) {
        self.with_unlabeled(|c| c.dec_by(amount));
    }

    pub fn set_to_current_time(&self) {
        self.with_unlabeled(GaugeCell::set_to_current_time);
    }

    pub fn get(&self) -> f64 {
        self.family.no_labels().map_or(0.0, |c| c.get())
    }

    fn with_unlabeled(&self, f: impl FnOnce(&GaugeCell)) {
        match self.family.no_labels() {
            Some(cell) => f(cell),
            None => debug!(metric = %self.metadata.name(), "Unlabeled update on labeled gauge ignored"),
        }
    }
}

impl Collector for Gauge {
    fn collect(&self) -> Result<MetricSnapshot> {
        let points = self
            .family
            .cells()
            .into_iter()
            .map(|(labels, cell)| cell.data_point(labels))
            .collect();
        Ok(MetricSnapshot::Gauge(Snapshot::new(self.metadata.clone(), points)?))
    }

    fn prometheus_name(&self) -> Option<String> {
        Some(self.metadata.prometheus_name().to_string())
    }

    fn metric_type(&self) -> Option<MetricType> {
        Some(MetricType::Gauge)
    }

    fn label_names(&self) -> Option<Vec<String>> {
        Some(self.family.label_names().to_vec())
    }
}

pub struct GaugeBuilder {
    config: MetricConfig,
}

metric_builder!(GaugeBuilder);

impl GaugeBuilder {
    pub fn build(self) -> Result<Gauge> {
        let metadata = self.config.validate(&[])?;
        let config = self.config;
        let family = Family::new(
            config.label_names.clone(),
            config.const_labels.clone(),
            move || Ok(GaugeCell::new(&config)),
        )?;
        Ok(Gauge { metadata, family })
    }

    pub fn register(self, registry: &Registry) -> Result<Arc<Gauge>> {
        let gauge = Arc::new(self.build()?);
        registry.register(gauge.clone())?;
        Ok(gauge)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_gauge_operations() {
        let gauge = Gauge::builder("queue_depth").build().unwrap();
        gauge.set(10.0);
        gauge.inc();
        gauge.inc_by(4.0);
        gauge.dec();
        gauge.dec_by(2.5);
        assert_eq!(gauge.get(), 11.5);
    }

    #[test]
    fn test_set_to_current_time() {
        let clock = Arc::new(ManualClock::new(1_500));
        let gauge = Gauge::builder("last_run_seconds").clock(clock).build().unwrap();
        gauge.set_to_current_time();
        assert_eq!(gauge.get(), 1.5);
    }

    #[test]
    fn test_labeled_gauge_collect() {
        let gauge = Gauge::builder("temperature_celsius")
            .unit(crate::model::Unit::celsius())
            .label_names(["room"])
            .build()
            .unwrap();
        gauge.labels(&["kitchen"]).unwrap().set(21.0);
        gauge.labels(&["attic"]).unwrap().set(-3.0);
        gauge.set(99.0);

        let MetricSnapshot::Gauge(snapshot) = gauge.collect().unwrap() else {
            panic!("expected gauge snapshot");
        };
        let values: Vec<f64> = snapshot.data_points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![-3.0, 21.0]);
        assert_eq!(snapshot.metadata().unit().map(|u| u.as_str()), Some("celsius"));
    }
}
