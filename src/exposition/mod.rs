//! Exposition Formats
//!
//! Writers that turn a scrape result into bytes on the wire.
//!
//! ```text
//!   Accept header ──> ExpositionFormats::find_writer
//!                        │
//!          ┌─────────────┼──────────────────┐
//!          ▼             ▼                  ▼
//!      protobuf      OpenMetrics      Prometheus text
//!   (if accepted)   (if accepted)       (fallback)
//! ```

pub mod openmetrics;
pub mod protobuf;
pub mod text;
pub mod util;

use std::io::Write;

use crate::error::Result;
use crate::model::{EscapingScheme, MetricSnapshots};

pub use openmetrics::OpenMetricsTextFormatWriter;
pub use protobuf::PrometheusProtobufFormatWriter;
pub use text::PrometheusTextFormatWriter;

/// A wire format for scrape results
pub trait ExpositionFormatWriter: Send + Sync {
    /// Whether this writer can answer a request with this `Accept` header
    fn accepts(&self, accept: Option<&str>) -> bool;

    fn content_type(&self) -> &'static str;

    fn write(
        &self,
        out: &mut dyn Write,
        snapshots: &MetricSnapshots,
        scheme: EscapingScheme,
    ) -> Result<()>;

    /// Human-readable rendering, used by the `debug` query parameter
    fn to_debug_string(&self, snapshots: &MetricSnapshots, scheme: EscapingScheme) -> Result<String> {
        let mut out = Vec::new();
        self.write(&mut out, snapshots, scheme)?;
        Ok(String::from_utf8(out)?)
    }
}

/// Knobs shared by all writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpositionConfig {
    /// Write `_created` series
    pub include_created_timestamps: bool,
    /// Write exemplars on gauges, summaries and unknown metrics too
    pub exemplars_on_all_metric_types: bool,
    /// Prometheus text timestamps in milliseconds instead of seconds
    pub timestamps_in_ms: bool,
}

impl Default for ExpositionConfig {
    fn default() -> Self {
        Self {
            include_created_timestamps: false,
            exemplars_on_all_metric_types: false,
            timestamps_in_ms: true,
        }
    }
}

/// The three writers, configured once
#[derive(Debug, Clone)]
pub struct ExpositionFormats {
    protobuf: PrometheusProtobufFormatWriter,
    openmetrics: OpenMetricsTextFormatWriter,
    text: PrometheusTextFormatWriter,
}

impl Default for ExpositionFormats {
    fn default() -> Self {
        Self::new(&ExpositionConfig::default())
    }
}

impl ExpositionFormats {
    pub fn new(config: &ExpositionConfig) -> Self {
        Self {
            protobuf: PrometheusProtobufFormatWriter::new(),
            openmetrics: OpenMetricsTextFormatWriter::new(config),
            text: PrometheusTextFormatWriter::new(config),
        }
    }

    /// Pick a writer for an `Accept` header, falling back to Prometheus text
    pub fn find_writer(&self, accept: Option<&str>) -> &dyn ExpositionFormatWriter {
        if self.protobuf.accepts(accept) {
            &self.protobuf
        } else if self.openmetrics.accepts(accept) {
            &self.openmetrics
        } else {
            &self.text
        }
    }

    pub fn protobuf(&self) -> &PrometheusProtobufFormatWriter {
        &self.protobuf
    }

    pub fn openmetrics(&self) -> &OpenMetricsTextFormatWriter {
        &self.openmetrics
    }

    pub fn text(&self) -> &PrometheusTextFormatWriter {
        &self.text
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_writer() {
        let formats = ExpositionFormats::default();
        assert_eq!(
            formats.find_writer(None).content_type(),
            PrometheusTextFormatWriter::CONTENT_TYPE
        );
        assert_eq!(
            formats
                .find_writer(Some("application/openmetrics-text; version=1.0.0,text/plain;q=0.5"))
                .content_type(),
            OpenMetricsTextFormatWriter::CONTENT_TYPE
        );
        assert_eq!(
            formats
                .find_writer(Some(
                    "application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=delimited"
                ))
                .content_type(),
            PrometheusProtobufFormatWriter::CONTENT_TYPE
        );
        assert_eq!(
            formats.find_writer(Some("application/json")).content_type(),
            PrometheusTextFormatWriter::CONTENT_TYPE
        );
    }
}
