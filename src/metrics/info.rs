//! Info
//!
//! Static key/value facts exposed as `name_info{...} 1`, such as a build
//! version. Each distinct label value tuple is one data point.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{metric_builder, MetricConfig};
use crate::error::{Error, Result};
use crate::model::{InfoDataPoint, Labels, MetricMetadata, MetricSnapshot, MetricType, Snapshot};
use crate::registry::{Collector, Registry};

#[derive(Debug)]
pub struct Info {
    metadata: MetricMetadata,
    label_names: Vec<String>,
    const_labels: Labels,
    points: RwLock<Vec<Labels>>,
}

impl Info {
    pub fn builder(name: impl Into<String>) -> InfoBuilder {
        InfoBuilder {
            config: MetricConfig::new(name),
        }
    }

    /// Replace all data points with one for `values`
    pub fn set_label_values(&self, values: &[&str]) -> Result<()> {
        let labels = self.labels_for(values)?;
        *self.points.write() = vec![labels];
        Ok(())
    }

    /// Add a data point unless one with the same labels exists
    pub fn add_label_values(&self, values: &[&str]) -> Result<()> {
        let labels = self.labels_for(values)?;
        let mut points = self.points.write();
        if !points.contains(&labels) {
            points.push(labels);
        }
        Ok(())
    }

    pub fn remove(&self, values: &[&str]) -> Result<()> {
        let labels = self.labels_for(values)?;
        self.points.write().retain(|p| p != &labels);
        Ok(())
    }

    pub fn clear(&self) {
        self.points.write().clear();
    }

    fn labels_for(&self, values: &[&str]) -> Result<Labels> {
        if values.len() != self.label_names.len() {
            return Err(Error::LabelArity {
                expected: self.label_names.len(),
                actual: values.len(),
            });
        }
        Labels::from_names_values(&self.label_names, values)?.merge(&self.const_labels)
    }
}

impl Collector for Info {
    fn collect(&self) -> Result<MetricSnapshot> {
        let points = self
            .points
            .read()
            .iter()
            .map(|labels| InfoDataPoint {
                labels: labels.clone(),
                scrape_timestamp_millis: None,
            })
            .collect();
        Ok(MetricSnapshot::Info(Snapshot::new(self.metadata.clone(), points)?))
    }

    fn prometheus_name(&self) -> Option<String> {
        Some(self.metadata.prometheus_name().to_string())
    }

    fn metric_type(&self) -> Option<MetricType> {
        Some(MetricType::Info)
    }

    fn label_names(&self) -> Option<Vec<String>> {
        Some(self.label_names.clone())
    }
}

pub struct InfoBuilder {
    config: MetricConfig,
}

metric_builder!(InfoBuilder);

impl InfoBuilder {
    pub fn build(self) -> Result<Info> {
        if self.config.unit.is_some() {
            return Err(Error::invalid("info metrics have no unit"));
        }
        let metadata = self.config.validate(&[])?;
        // without label names the only data point is the constant one
        let points = if self.config.label_names.is_empty() {
            vec![self.config.const_labels.clone()]
        } else {
            Vec::new()
        };
        Ok(Info {
            metadata,
            label_names: self.config.label_names,
            const_labels: self.config.const_labels,
            points: RwLock::new(points),
        })
    }

    pub fn register(self, registry: &Registry) -> Result<Arc<Info>> {
        let info = Arc::new(self.build()?);
        registry.register(info.clone())?;
        Ok(info)
    }
}

// =============================================================================
// Tests
// =============================================================================
