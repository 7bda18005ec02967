//! Scrape request handling
//!
//! Transport-free: takes the query string and `Accept` header, returns
//! status, content type and body. The HTTP server wraps this.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::config::ExporterConfig;
use crate::error::{Error, Result};
use crate::exposition::{ExpositionFormatWriter, ExpositionFormats};
use crate::model::{EscapingScheme, MetricSnapshots};
use crate::registry::{MetricNameFilter, Registry};

pub const DEBUG_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
}

impl ScrapeResponse {
    fn ok(content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    fn error(status: u16, message: String) -> Self {
        Self {
            status,
            content_type: DEBUG_CONTENT_TYPE,
            body: Bytes::from(message),
        }
    }
}

#[derive(Debug)]
pub struct ScrapeHandler {
    registry: Arc<Registry>,
    formats: ExpositionFormats,
    filter: MetricNameFilter,
}

impl ScrapeHandler {
    pub fn new(registry: Arc<Registry>, config: &ExporterConfig) -> Self {
        Self {
            registry,
            formats: ExpositionFormats::new(&config.exposition()),
            filter: config.name_filter(),
        }
    }

    pub fn handle(&self, query: Option<&str>, accept: Option<&str>) -> ScrapeResponse {
        let params = QueryParams::parse(query.unwrap_or(""));
        let scheme = EscapingScheme::from_accept_header(accept);

        let snapshots = match self.scrape(&params.names) {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(error = %e, "Scrape failed");
                return ScrapeResponse::error(500, e.to_string());
            }
        };

        match params.debug.as_deref() {
            Some(format) => self.debug(format, &snapshots, scheme),
            None => {
                let writer = self.formats.find_writer(accept);
                let mut body = Vec::new();
                match writer.write(&mut body, &snapshots, scheme) {
                    Ok(()) => ScrapeResponse::ok(writer.content_type(), body),
                    Err(e) => {
                        warn!(error = %e, "Writing scrape response failed");
                        ScrapeResponse::error(500, e.to_string())
                    }
                }
            }
        }
    }

    fn scrape(&self, names: &[String]) -> Result<MetricSnapshots> {
        let filter = if names.is_empty() {
            self.filter.clone()
        } else {
            MetricNameFilter::allow_all()
                .name_must_be_equal_to(names.iter().cloned())
                .and(self.filter.clone())
        };
        if filter.is_allow_all() {
            self.registry.scrape()
        } else {
            self.registry.scrape_filtered(&filter)
        }
    }

    fn debug(&self, format: &str, snapshots: &MetricSnapshots, scheme: EscapingScheme) -> ScrapeResponse {
        let writer: &dyn ExpositionFormatWriter = match format {
            "openmetrics" => self.formats.openmetrics(),
            "text" => self.formats.text(),
            "prometheus-protobuf" => self.formats.protobuf(),
            other => {
                debug!(format = %other, "Unsupported debug format");
                return ScrapeResponse::error(500, Error::UnsupportedDebugFormat(other.to_string()).to_string());
            }
        };
        match writer.to_debug_string(snapshots, scheme) {
            Ok(text) => ScrapeResponse::ok(DEBUG_CONTENT_TYPE, text),
            Err(e) => ScrapeResponse::error(500, e.to_string()),
        }
    }
}

/// The query parameters a scrape understands
#[derive(Debug, Default, PartialEq)]
struct QueryParams {
    debug: Option<String>,
    names: Vec<String>,
}

impl QueryParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Ok(key), Ok(value)) = (urlencoding::decode(key), urlencoding::decode(value)) else {
                debug!(param = %pair, "Ignoring undecodable query parameter");
                continue;
            };
            match key.as_ref() {
                "debug" => params.debug = Some(value.into_owned()),
                "name[]" => params.names.push(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::{OpenMetricsTextFormatWriter, PrometheusTextFormatWriter};
    use crate::metrics::{Counter, Gauge};

    fn handler(config: &ExporterConfig) -> ScrapeHandler {
        let registry = Arc::new(Registry::new());
        let requests = Counter::builder("requests")
            .label_names(["path"])
            .register(&registry)
            .unwrap();
        requests.labels(&["/a"]).unwrap().inc_by(5.0).unwrap();
        Gauge::builder("temperature")
            .register(&registry)
            .unwrap()
            .set(21.0);
        ScrapeHandler::new(registry, config)
    }

    fn body(response: &ScrapeResponse) -> String {
        String::from_utf8(response.body.to_vec()).unwrap()
    }

    #[test]
    fn test_query_parsing() {
        let params = QueryParams::parse("debug=text&name%5B%5D=requests&name[]=temp%20c&x");
        assert_eq!(params.debug.as_deref(), Some("text"));
        assert_eq!(params.names, vec!["requests", "temp c"]);
    }

    #[test]
    fn test_content_negotiation() {
        let handler = handler(&ExporterConfig::default());
        let text = handler.handle(None, None);
        assert_eq!(text.status, 200);
        assert_eq!(text.content_type, PrometheusTextFormatWriter::CONTENT_TYPE);
        assert!(body(&text).contains("requests_total{path=\"/a\"} 5.0\n"));

        let om = handler.handle(None, Some("application/openmetrics-text; version=1.0.0"));
        assert_eq!(om.content_type, OpenMetricsTextFormatWriter::CONTENT_TYPE);
        assert!(body(&om).ends_with("# EOF\n"));
    }

    #[test]
    fn test_name_parameter_restricts_families() {
        let handler = handler(&ExporterConfig::default());
        let response = handler.handle(Some("name[]=temperature"), None);
        let text = body(&response);
        assert!(text.contains("temperature 21.0"));
        assert!(!text.contains("requests"));
    }

    #[test]
    fn test_name_parameter_and_config_filter() {
        let config = ExporterConfig {
            excluded_names: vec!["temperature".to_string()],
            ..Default::default()
        };
        let handler = handler(&config);
        let response = handler.handle(Some("name[]=temperature"), None);
        assert_eq!(body(&response), "");
    }

    #[test]
    fn test_debug_formats() {
        let handler = handler(&ExporterConfig::default());
        let om = handler.handle(Some("debug=openmetrics"), None);
        assert_eq!(om.status, 200);
        assert_eq!(om.content_type, DEBUG_CONTENT_TYPE);
        assert!(body(&om).ends_with("# EOF\n"));

        let proto = handler.handle(Some("debug=prometheus-protobuf"), None);
        assert!(body(&proto).contains("name: \"requests_total\"\ntype: COUNTER\n"));

        let bad = handler.handle(Some("debug=json"), None);
        assert_eq!(bad.status, 500);
        assert!(body(&bad).starts_with("debug=json: Unsupported query parameter"));
    }
}
