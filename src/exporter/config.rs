//! Exporter configuration
//!
//! Loaded from an optional YAML file; every field has a default so an
//! empty or partial file is valid.
//!
//! ```yaml
//! allowed_prefixes: ["http_"]
//! excluded_names: ["http_debug_requests"]
//! include_created_timestamps: true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::exposition::ExpositionConfig;
use crate::registry::MetricNameFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Only these metric names are exposed (empty: all)
    pub allowed_names: Vec<String>,
    pub excluded_names: Vec<String>,
    /// Only names with one of these prefixes are exposed (empty: all)
    pub allowed_prefixes: Vec<String>,
    pub excluded_prefixes: Vec<String>,
    pub include_created_timestamps: bool,
    pub exemplars_on_all_metric_types: bool,
    /// Prometheus text timestamps in milliseconds
    pub timestamps_in_ms: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            allowed_names: Vec::new(),
            excluded_names: Vec::new(),
            allowed_prefixes: Vec::new(),
            excluded_prefixes: Vec::new(),
            include_created_timestamps: false,
            exemplars_on_all_metric_types: false,
            timestamps_in_ms: true,
        }
    }
}

impl ExporterConfig {
    /// Read `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Name filter built from the allow and exclude lists
    pub fn name_filter(&self) -> MetricNameFilter {
        MetricNameFilter::allow_all()
            .name_must_be_equal_to(self.allowed_names.iter().cloned())
            .name_must_not_be_equal_to(self.excluded_names.iter().cloned())
            .name_must_start_with(self.allowed_prefixes.iter().cloned())
            .name_must_not_start_with(self.excluded_prefixes.iter().cloned())
    }

    pub fn exposition(&self) -> ExpositionConfig {
        ExpositionConfig {
            include_created_timestamps: self.include_created_timestamps,
            exemplars_on_all_metric_types: self.exemplars_on_all_metric_types,
            timestamps_in_ms: self.timestamps_in_ms,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::load(None).unwrap();
        assert_eq!(config, ExporterConfig::default());
        assert!(config.name_filter().is_allow_all());
        assert_eq!(config.exposition(), ExpositionConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let config = ExporterConfig::from_yaml(
            "allowed_prefixes: [\"http_\"]\nexcluded_names: [http_debug]\ninclude_created_timestamps: true\n",
        )
        .unwrap();
        assert!(config.include_created_timestamps);
        assert!(config.timestamps_in_ms);

        let filter = config.name_filter();
        assert!(filter.test("http_requests"));
        assert!(!filter.test("http_debug"));
        assert!(!filter.test("db_queries"));
    }

    #[test]
    fn test_invalid_yaml() {
        assert_matches!(
            ExporterConfig::from_yaml("allowed_names: 12: x"),
            Err(Error::Config(_))
        );
        assert_matches!(
            ExporterConfig::load(Some(Path::new("/nonexistent/promcore.yaml"))),
            Err(Error::Config(_))
        );
    }
}
