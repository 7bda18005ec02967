//! OpenMetrics text format 1.0
//!
//! Differs from the Prometheus text format in metadata order (TYPE, UNIT,
//! HELP), exemplars after `#`, inline `_created` series, timestamps in
//! seconds and the mandatory `# EOF` terminator.

use std::io::Write;

use super::util::{
    escape_label_value, exposed_name, format_double, format_timestamp_seconds, push_labels,
    push_metadata_name, push_name_and_labels,
};
use super::{ExpositionConfig, ExpositionFormatWriter};
use crate::error::Result;
use crate::model::{
    EscapingScheme, Exemplar, HistogramDataPoint, HistogramSnapshot, Labels, MetricMetadata,
    MetricSnapshot, MetricSnapshots, SummarySnapshot,
};

#[derive(Debug, Clone)]
pub struct OpenMetricsTextFormatWriter {
    include_created_timestamps: bool,
    exemplars_on_all_metric_types: bool,
}

impl OpenMetricsTextFormatWriter {
    pub const CONTENT_TYPE: &'static str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

    pub fn new(config: &ExpositionConfig) -> Self {
        Self {
            include_created_timestamps: config.include_created_timestamps,
            exemplars_on_all_metric_types: config.exemplars_on_all_metric_types,
        }
    }
}

impl ExpositionFormatWriter for OpenMetricsTextFormatWriter {
    fn accepts(&self, accept: Option<&str>) -> bool {
        accept.is_some_and(|a| a.contains("application/openmetrics-text"))
    }

    fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }

    fn write(
        &self,
        out: &mut dyn Write,
        snapshots: &MetricSnapshots,
        scheme: EscapingScheme,
    ) -> Result<()> {
        let mut om = OpenMetricsOutput {
            buf: String::new(),
            scheme,
            created: self.include_created_timestamps,
            all_exemplars: self.exemplars_on_all_metric_types,
        };
        for snapshot in snapshots.iter().filter(|s| !s.is_empty()) {
            om.snapshot(snapshot);
        }
        om.buf.push_str("# EOF\n");

        out.write_all(om.buf.as_bytes())?;
        Ok(())
    }
}

struct OpenMetricsOutput {
    buf: String,
    scheme: EscapingScheme,
    created: bool,
    all_exemplars: bool,
}

impl OpenMetricsOutput {
    fn snapshot(&mut self, snapshot: &MetricSnapshot) {
        let meta = snapshot.metadata();
        let name = exposed_name(meta.name(), self.scheme).into_owned();
        match snapshot {
            MetricSnapshot::Counter(s) => {
                self.metadata(&name, "counter", meta);
                for p in s.data_points() {
                    self.name_and_labels(&name, "_total", &p.labels, None);
                    self.buf.push_str(&format_double(p.value));
                    self.finish(p.scrape_timestamp_millis, p.exemplar.as_ref());
                    self.created(&name, &p.labels, p.created_timestamp_millis, p.scrape_timestamp_millis);
                }
            }
            MetricSnapshot::Gauge(s) => {
                self.metadata(&name, "gauge", meta);
                for p in s.data_points() {
                    self.name_and_labels(&name, "", &p.labels, None);
                    self.buf.push_str(&format_double(p.value));
                    let exemplar = p.exemplar.as_ref().filter(|_| self.all_exemplars);
                    self.finish(p.scrape_timestamp_millis, exemplar);
                }
            }
            MetricSnapshot::Histogram(s) => self.histogram(&name, s, false),
            MetricSnapshot::GaugeHistogram(s) => self.histogram(&name, s, true),
            MetricSnapshot::Summary(s) => self.summary(&name, s),
            MetricSnapshot::Info(s) => {
                self.metadata(&name, "info", meta);
                for p in s.data_points() {
                    self.name_and_labels(&name, "_info", &p.labels, None);
                    self.buf.push('1');
                    self.finish(p.scrape_timestamp_millis, None);
                }
            }
            MetricSnapshot::StateSet(s) => {
                self.metadata(&name, "stateset", meta);
                for p in s.data_points() {
                    for state in &p.states {
                        self.name_and_labels(&name, "", &p.labels, Some((meta.name(), state.name.as_str())));
                        self.buf.push(if state.value { '1' } else { '0' });
                        self.finish(p.scrape_timestamp_millis, None);
                    }
                }
            }
            MetricSnapshot::Unknown(s) => {
                self.metadata(&name, "unknown", meta);
                for p in s.data_points() {
                    self.name_and_labels(&name, "", &p.labels, None);
                    self.buf.push_str(&format_double(p.value));
                    let exemplar = p.exemplar.as_ref().filter(|_| self.all_exemplars);
                    self.finish(p.scrape_timestamp_millis, exemplar);
                }
            }
        }
    }

    fn histogram(&mut self, name: &str, snapshot: &HistogramSnapshot, gauge: bool) {
        let (type_name, count_suffix, sum_suffix) = if gauge {
            ("gaugehistogram", "_gcount", "_gsum")
        } else {
            ("histogram", "_count", "_sum")
        };
        self.metadata(name, type_name, snapshot.metadata());
        for p in snapshot.data_points() {
            self.buckets(name, p);
            // _count and _sum come as a pair or not at all
            if let (Some(count), Some(sum)) = (p.count, p.sum) {
                self.name_and_labels(name, count_suffix, &p.labels, None);
                self.buf.push_str(&count.to_string());
                let latest = p.exemplars.latest().filter(|_| self.all_exemplars);
                self.finish(p.scrape_timestamp_millis, latest);

                self.name_and_labels(name, sum_suffix, &p.labels, None);
                self.buf.push_str(&format_double(sum));
                self.finish(p.scrape_timestamp_millis, None);
            }
            if !gauge {
                self.created(name, &p.labels, p.created_timestamp_millis, p.scrape_timestamp_millis);
            }
        }
    }

    fn buckets(&mut self, name: &str, p: &HistogramDataPoint) {
        if p.classic_buckets.is_empty() {
            if let Some(count) = p.count {
                self.name_and_labels(name, "_bucket", &p.labels, Some(("le", "+Inf")));
                self.buf.push_str(&count.to_string());
                self.finish(p.scrape_timestamp_millis, p.exemplars.latest());
            }
            return;
        }
        let mut cumulative = 0u64;
        let mut lower = f64::NEG_INFINITY;
        for (upper, count) in p.classic_buckets.iter() {
            cumulative += count;
            let le = format_double(upper);
            self.name_and_labels(name, "_bucket", &p.labels, Some(("le", le.as_str())));
            self.buf.push_str(&cumulative.to_string());
            self.finish(p.scrape_timestamp_millis, p.exemplars.get(lower, upper));
            lower = upper;
        }
    }

    fn summary(&mut self, name: &str, snapshot: &SummarySnapshot) {
        let meta = snapshot.metadata();
        let mut metadata_written = false;
        for p in snapshot.data_points() {
            if p.quantiles.is_empty() && p.count.is_none() && p.sum.is_none() {
                continue;
            }
            if !metadata_written {
                self.metadata(name, "summary", meta);
                metadata_written = true;
            }
            // quantiles rotate through the stored exemplars
            let mut exemplar_index = 1;
            for q in p.quantiles.iter() {
                let quantile = format_double(q.quantile);
                self.name_and_labels(name, "", &p.labels, Some(("quantile", quantile.as_str())));
                self.buf.push_str(&format_double(q.value));
                let exemplar = if self.all_exemplars && !p.exemplars.is_empty() {
                    exemplar_index = (exemplar_index + 1) % p.exemplars.len();
                    p.exemplars.get_index(exemplar_index)
                } else {
                    None
                };
                self.finish(p.scrape_timestamp_millis, exemplar);
            }
            if let Some(count) = p.count {
                self.name_and_labels(name, "_count", &p.labels, None);
                self.buf.push_str(&count.to_string());
                let latest = p.exemplars.latest().filter(|_| self.all_exemplars);
                self.finish(p.scrape_timestamp_millis, latest);
            }
            if let Some(sum) = p.sum {
                self.name_and_labels(name, "_sum", &p.labels, None);
                self.buf.push_str(&format_double(sum));
                self.finish(p.scrape_timestamp_millis, None);
            }
            self.created(name, &p.labels, p.created_timestamp_millis, p.scrape_timestamp_millis);
        }
    }

    fn created(&mut self, name: &str, labels: &Labels, created: Option<i64>, scrape: Option<i64>) {
        let Some(created) = created.filter(|_| self.created) else {
            return;
        };
        self.name_and_labels(name, "_created", labels, None);
        self.buf.push_str(&format_timestamp_seconds(created));
        self.finish(scrape, None);
    }

    fn metadata(&mut self, name: &str, type_name: &str, meta: &MetricMetadata) {
        self.buf.push_str("# TYPE ");
        push_metadata_name(&mut self.buf, name, "");
        self.buf.push(' ');
        self.buf.push_str(type_name);
        self.buf.push('\n');
        if let Some(unit) = meta.unit() {
            self.buf.push_str("# UNIT ");
            push_metadata_name(&mut self.buf, name, "");
            self.buf.push(' ');
            escape_label_value(unit.as_str(), &mut self.buf);
            self.buf.push('\n');
        }
        if let Some(help) = meta.help().filter(|h| !h.is_empty()) {
            self.buf.push_str("# HELP ");
            push_metadata_name(&mut self.buf, name, "");
            self.buf.push(' ');
            escape_label_value(help, &mut self.buf);
            self.buf.push('\n');
        }
    }

    fn name_and_labels(&mut self, name: &str, suffix: &str, labels: &Labels, extra: Option<(&str, &str)>) {
        push_name_and_labels(&mut self.buf, name, suffix, labels, extra, self.scheme);
    }

    /// Scrape timestamp, exemplar and newline
    fn finish(&mut self, scrape_timestamp_millis: Option<i64>, exemplar: Option<&Exemplar>) {
        if let Some(ts) = scrape_timestamp_millis {
            self.buf.push(' ');
            self.buf.push_str(&format_timestamp_seconds(ts));
        }
        if let Some(exemplar) = exemplar {
            self.buf.push_str(" # ");
            push_labels(&mut self.buf, exemplar.labels(), self.scheme);
            self.buf.push(' ');
            self.buf.push_str(&format_double(exemplar.value()));
            if let Some(ts) = exemplar.timestamp_millis() {
                self.buf.push(' ');
                self.buf.push_str(&format_timestamp_seconds(ts));
            }
        }
        self.buf.push('\n');
    }
}

// =============================================================================
// Tests
// =============================================================================
