//! Metric Registry
//!
//! ```text
//!   register(c) ──▶ instance / type checks ──▶ collectors (RwLock<Vec>)
//!
//!   scrape() ──▶ copy collector list ──▶ collect each ──▶ merge by name
//!                                           │                  │
//!                                InvalidMetricHandler   duplicate labels or
//!                                 (propagate / skip)    type conflict: fail
//! ```
//!
//! Register and unregister may run during a scrape; the scrape works on the
//! list it copied.

pub mod collector;
pub mod filter;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

pub use collector::{Collector, FnCollector, MultiCollector};
pub use filter::MetricNameFilter;

use crate::error::{Error, Result};
use crate::model::{MetricSnapshot, MetricSnapshots, MetricType};

/// What a scrape does when one collector fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidMetricHandler {
    /// Abort the scrape with the collector's error
    #[default]
    Propagate,
    /// Log and continue without that collector
    Skip,
}

impl InvalidMetricHandler {
    fn handle<T>(&self, name: &str, result: Result<T>) -> Result<Option<T>> {
        match (result, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), InvalidMetricHandler::Propagate) => Err(e),
            (Err(e), InvalidMetricHandler::Skip) => {
                warn!(collector = %name, error = %e, "Skipping failed collector");
                Ok(None)
            }
        }
    }
}

#[derive(Default)]
pub struct Registry {
    collectors: RwLock<Vec<Arc<dyn Collector>>>,
    multi_collectors: RwLock<Vec<Arc<dyn MultiCollector>>>,
    registered_types: RwLock<HashMap<String, MetricType>>,
    invalid_metric_handler: InvalidMetricHandler,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("collectors", &self.collectors.read().len())
            .field("multi_collectors", &self.multi_collectors.read().len())
            .field("invalid_metric_handler", &self.invalid_metric_handler)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invalid_metric_handler(handler: InvalidMetricHandler) -> Self {
        Self {
            invalid_metric_handler: handler,
            ..Default::default()
        }
    }

    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let mut collectors = self.collectors.write();
        if collectors.iter().any(|c| Arc::ptr_eq(c, &collector)) {
            return Err(Error::AlreadyRegistered);
        }
        if let (Some(name), Some(metric_type)) = (collector.prometheus_name(), collector.metric_type()) {
            self.check_type(&name, metric_type)?;
        }
        debug!(name = ?collector.prometheus_name(), "Registered collector");
        collectors.push(collector);
        Ok(())
    }

    pub fn register_multi(&self, collector: Arc<dyn MultiCollector>) -> Result<()> {
        let mut multi = self.multi_collectors.write();
        if multi.iter().any(|c| Arc::ptr_eq(c, &collector)) {
            return Err(Error::AlreadyRegistered);
        }
        let names = collector.prometheus_names();
        // check every name first so a conflict registers nothing
        {
            let registered = self.registered_types.read();
            for name in &names {
                if let (Some(existing), Some(new)) = (registered.get(name), collector.metric_type(name)) {
                    if *existing != new {
                        return Err(type_conflict(name, *existing, new));
                    }
                }
            }
        }
        for name in &names {
            if let Some(metric_type) = collector.metric_type(name) {
                self.check_type(name, metric_type)?;
            }
        }
        debug!(names = ?names, "Registered multi collector");
        multi.push(collector);
        Ok(())
    }

    /// Remove a collector. Unknown collectors are ignored.
    pub fn unregister(&self, collector: &Arc<dyn Collector>) {
        let mut collectors = self.collectors.write();
        collectors.retain(|c| !Arc::ptr_eq(c, collector));
        if let Some(name) = collector.prometheus_name() {
            let still_used = collectors
                .iter()
                .any(|c| c.prometheus_name().as_deref() == Some(name.as_str()));
            if !still_used && !self.multi_uses(&name) {
                self.registered_types.write().remove(&name);
            }
        }
    }

    pub fn unregister_multi(&self, collector: &Arc<dyn MultiCollector>) {
        self.multi_collectors
            .write()
            .retain(|c| !Arc::ptr_eq(c, collector));
        let collectors = self.collectors.read();
        for name in collector.prometheus_names() {
            let still_used = collectors
                .iter()
                .any(|c| c.prometheus_name().as_deref() == Some(name.as_str()))
                || self.multi_uses(&name);
            if !still_used {
                self.registered_types.write().remove(&name);
            }
        }
    }

    pub fn clear(&self) {
        self.collectors.write().clear();
        self.multi_collectors.write().clear();
        self.registered_types.write().clear();
    }

    /// Collect every registered collector
    pub fn scrape(&self) -> Result<MetricSnapshots> {
        let (collectors, multi) = self.copy_lists();
        let mut snapshots = Vec::new();

        for collector in &collectors {
            let name = collector.prometheus_name().unwrap_or_default();
            if let Some(snapshot) = self.invalid_metric_handler.handle(&name, collector.collect())? {
                snapshots.push(snapshot);
            }
        }
        for collector in &multi {
            let name = collector.prometheus_names().join(",");
            if let Some(result) = self.invalid_metric_handler.handle(&name, collector.collect())? {
                snapshots.extend(result);
            }
        }
        merge(snapshots)
    }

    /// Collect only families whose prometheus name the filter accepts
    pub fn scrape_filtered(&self, filter: &MetricNameFilter) -> Result<MetricSnapshots> {
        if filter.is_allow_all() {
            return self.scrape();
        }
        let (collectors, multi) = self.copy_lists();
        let mut snapshots = Vec::new();

        for collector in &collectors {
            let name = collector.prometheus_name();
            // unknown names must be collected to be filtered
            if name.as_deref().map_or(true, |n| filter.test(n)) {
                let result = collector.collect_filtered(filter);
                if let Some(Some(snapshot)) =
                    self.invalid_metric_handler.handle(&name.unwrap_or_default(), result)?
                {
                    snapshots.push(snapshot);
                }
            }
        }
        for collector in &multi {
            let names = collector.prometheus_names();
            let excluded = !names.is_empty() && !names.iter().any(|n| filter.test(n));
            if !excluded {
                let result = collector.collect_filtered(filter);
                if let Some(result) = self.invalid_metric_handler.handle(&names.join(","), result)? {
                    snapshots.extend(result);
                }
            }
        }
        merge(snapshots)
    }

    fn copy_lists(&self) -> (Vec<Arc<dyn Collector>>, Vec<Arc<dyn MultiCollector>>) {
        (
            self.collectors.read().clone(),
            self.multi_collectors.read().clone(),
        )
    }

    fn multi_uses(&self, name: &str) -> bool {
        self.multi_collectors
            .read()
            .iter()
            .any(|c| c.prometheus_names().iter().any(|n| n == name))
    }

    fn check_type(&self, name: &str, metric_type: MetricType) -> Result<()> {
        let mut registered = self.registered_types.write();
        match registered.get(name) {
            Some(existing) if *existing != metric_type => {
                Err(type_conflict(name, *existing, metric_type))
            }
            Some(_) => Ok(()),
            None => {
                registered.insert(name.to_string(), metric_type);
                Ok(())
            }
        }
    }
}

fn type_conflict(name: &str, existing: MetricType, new: MetricType) -> Error {
    Error::TypeConflict {
        name: name.to_string(),
        existing: existing.to_string(),
        new: new.to_string(),
    }
}

fn merge(snapshots: Vec<MetricSnapshot>) -> Result<MetricSnapshots> {
    let result = MetricSnapshots::of(snapshots);
    if let Err(e) = &result {
        warn!(error = %e, "Scrape failed");
    }
    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CounterDataPoint, CounterSnapshot, GaugeDataPoint, GaugeSnapshot, Labels};
    use assert_matches::assert_matches;

    struct Fixed {
        name: &'static str,
        labels: Labels,
        metric_type: MetricType,
    }

    impl Collector for Fixed {
        fn collect(&self) -> Result<MetricSnapshot> {
            Ok(match self.metric_type {
                MetricType::Gauge => MetricSnapshot::Gauge(
                    GaugeSnapshot::builder(self.name)
                        .data_point(GaugeDataPoint {
                            labels: self.labels.clone(),
                            value: 1.0,
                            ..Default::default()
                        })
                        .build()?,
                ),
                _ => MetricSnapshot::Counter(
                    CounterSnapshot::builder(self.name)
                        .data_point(CounterDataPoint {
                            labels: self.labels.clone(),
                            value: 1.0,
                            ..Default::default()
                        })
                        .build()?,
                ),
            })
        }

        fn prometheus_name(&self) -> Option<String> {
            Some(self.name.to_string())
        }

        fn metric_type(&self) -> Option<MetricType> {
            Some(self.metric_type)
        }
    }

    fn counter(name: &'static str, path: &str) -> Arc<dyn Collector> {
        Arc::new(Fixed {
            name,
            labels: Labels::of([("path", path)]).unwrap(),
            metric_type: MetricType::Counter,
        })
    }

    #[test]
    fn test_register_same_instance_twice() {
        let registry = Registry::new();
        let c = counter("requests", "/a");
        registry.register(c.clone()).unwrap();
        assert_matches!(registry.register(c), Err(Error::AlreadyRegistered));
    }

    #[test]
    fn test_register_type_conflict() {
        let registry = Registry::new();
        registry.register(counter("requests", "/a")).unwrap();
        let gauge: Arc<dyn Collector> = Arc::new(Fixed {
            name: "requests",
            labels: Labels::empty(),
            metric_type: MetricType::Gauge,
        });
        assert_matches!(registry.register(gauge), Err(Error::TypeConflict { .. }));
    }

    #[test]
    fn test_scrape_merges_disjoint_labels() {
        let registry = Registry::new();
        registry.register(counter("requests", "/a")).unwrap();
        registry.register(counter("requests", "/b")).unwrap();
        let snapshots = registry.scrape().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots.get("requests").unwrap().len(), 2);
    }

    #[test]
    fn test_scrape_fails_on_duplicate_labels() {
        let registry = Registry::new();
        registry.register(counter("requests", "/a")).unwrap();
        registry.register(counter("requests", "/a")).unwrap();
        assert_matches!(
            registry.scrape(),
            Err(Error::DuplicateLabels { name, .. }) if name == "requests"
        );
    }

    #[test]
    fn test_unregister() {
        let registry = Registry::new();
        let c = counter("requests", "/a");
        registry.register(c.clone()).unwrap();
        registry.unregister(&c);
        assert!(registry.scrape().unwrap().is_empty());

        // name is free again for another type
        let gauge: Arc<dyn Collector> = Arc::new(Fixed {
            name: "requests",
            labels: Labels::empty(),
            metric_type: MetricType::Gauge,
        });
        assert!(registry.register(gauge).is_ok());
    }

    #[test]
    fn test_scrape_filtered_skips_excluded() {
        let registry = Registry::new();
        registry.register(counter("requests", "/a")).unwrap();
        registry.register(counter("errors", "/a")).unwrap();
        let filter = MetricNameFilter::default().name_must_be_equal_to(["errors_total"]);
        let snapshots = registry.scrape_filtered(&filter).unwrap();
        let names: Vec<_> = snapshots.iter().map(|s| s.prometheus_name()).collect();
        assert_eq!(names, vec!["errors"]);
    }

    #[test]
    fn test_invalid_metric_handler() {
        let failing: Arc<dyn Collector> = Arc::new(FnCollector::new(|| {
            Err(Error::CollectorFailed {
                name: "broken".into(),
                reason: "boom".into(),
            })
        }));

        let strict = Registry::new();
        strict.register(failing.clone()).unwrap();
        strict.register(counter("requests", "/a")).unwrap();
        assert_matches!(strict.scrape(), Err(Error::CollectorFailed { .. }));

        let lenient = Registry::with_invalid_metric_handler(InvalidMetricHandler::Skip);
        lenient.register(failing).unwrap();
        lenient.register(counter("requests", "/a")).unwrap();
        assert_eq!(lenient.scrape().unwrap().len(), 1);
    }
}
