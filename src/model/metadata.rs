//! Metric family metadata

use std::fmt;

use super::naming::{prometheus_name, RESERVED_METRIC_NAME_SUFFIXES};
use crate::error::{Error, Result};

/// Metric type as declared by a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Info,
    StateSet,
    Unknown,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Info => "info",
            MetricType::StateSet => "stateset",
            MetricType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a metric, used as name suffix and OpenMetrics `# UNIT`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit(String);

impl Unit {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(Error::invalid(format!("'{}': illegal unit name", name)));
        }
        Ok(Unit(trimmed.to_string()))
    }

    pub fn seconds() -> Self {
        Unit("seconds".to_string())
    }

    pub fn bytes() -> Self {
        Unit("bytes".to_string())
    }

    pub fn ratio() -> Self {
        Unit("ratio".to_string())
    }

    pub fn celsius() -> Self {
        Unit("celsius".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricMetadata {
    name: String,
    prometheus_name: String,
    help: Option<String>,
    unit: Option<Unit>,
}

impl MetricMetadata {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with(name, None, None)
    }

    pub fn with(name: impl Into<String>, help: Option<String>, unit: Option<Unit>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidMetricName {
                name,
                reason: "The metric name must not be empty".to_string(),
            });
        }
        if let Some(suffix) = RESERVED_METRIC_NAME_SUFFIXES
            .iter()
            .find(|s| name.ends_with(*s))
        {
            return Err(Error::InvalidMetricName {
                reason: format!("The metric name must not include the '{}' suffix.", suffix),
                name,
            });
        }
        if let Some(unit) = &unit {
            let underscore = format!("_{}", unit);
            let dot = format!(".{}", unit);
            if !name.ends_with(&underscore) && !name.ends_with(&dot) {
                return Err(Error::InvalidMetricName {
                    reason: format!("Names of metrics with unit '{}' must end with '{}'", unit, underscore),
                    name,
                });
            }
        }
        Ok(Self {
            prometheus_name: prometheus_name(&name),
            name,
            help,
            unit,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with dots replaced, used for grouping and exposition
    pub fn prometheus_name(&self) -> &str {
        &self.prometheus_name
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }
}
