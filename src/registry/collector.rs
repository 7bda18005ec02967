//! Collector seams between metrics and the registry

use super::filter::MetricNameFilter;
use crate::error::Result;
use crate::model::{MetricSnapshot, MetricSnapshots, MetricType};

/// Produces one metric family per scrape
pub trait Collector: Send + Sync {
    fn collect(&self) -> Result<MetricSnapshot>;

    /// Collect only if the filter accepts the name. Collectors that can
    /// filter cheaper than collecting should override this.
    fn collect_filtered(&self, filter: &MetricNameFilter) -> Result<Option<MetricSnapshot>> {
        let snapshot = self.collect()?;
        Ok(filter
            .test(snapshot.prometheus_name())
            .then_some(snapshot))
    }

    /// Known name lets the registry skip filtered collectors without collecting
    fn prometheus_name(&self) -> Option<String> {
        None
    }

    fn metric_type(&self) -> Option<MetricType> {
        None
    }

    fn label_names(&self) -> Option<Vec<String>> {
        None
    }
}

/// Produces several metric families per scrape
pub trait MultiCollector: Send + Sync {
    fn collect(&self) -> Result<MetricSnapshots>;

    fn collect_filtered(&self, filter: &MetricNameFilter) -> Result<MetricSnapshots> {
        let all = self.collect()?;
        MetricSnapshots::of(all.into_iter().filter(|s| filter.test(s.prometheus_name())))
    }

    /// Empty when the names are only known after collecting
    fn prometheus_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn metric_type(&self, _prometheus_name: &str) -> Option<MetricType> {
        None
    }
}

/// Collector backed by a closure
pub struct FnCollector<F> {
    collect: F,
}

impl<F> FnCollector<F>
where
    F: Fn() -> Result<MetricSnapshot> + Send + Sync,
{
    pub fn new(collect: F) -> Self {
        Self { collect }
    }
}

impl<F> Collector for FnCollector<F>
where
    F: Fn() -> Result<MetricSnapshot> + Send + Sync,
{
    fn collect(&self) -> Result<MetricSnapshot> {
        (self.collect)()
    }
}
