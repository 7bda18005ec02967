//! Prometheus text format 0.0.4

use std::io::Write;

use super::util::{
    escape_help, exposed_name, format_double, format_timestamp_seconds, push_metadata_name,
    push_name_and_labels,
};
use super::{ExpositionConfig, ExpositionFormatWriter};
use crate::error::Result;
use crate::model::{
    EscapingScheme, HistogramSnapshot, Labels, MetricMetadata, MetricSnapshot, MetricSnapshots,
    SummarySnapshot,
};

#[derive(Debug, Clone)]
pub struct PrometheusTextFormatWriter {
    include_created_timestamps: bool,
    timestamps_in_ms: bool,
}

impl PrometheusTextFormatWriter {
    pub const CONTENT_TYPE: &'static str = "text/plain; version=0.0.4; charset=utf-8";

    pub fn new(config: &ExpositionConfig) -> Self {
        Self {
            include_created_timestamps: config.include_created_timestamps,
            timestamps_in_ms: config.timestamps_in_ms,
        }
    }
}

impl ExpositionFormatWriter for PrometheusTextFormatWriter {
    fn accepts(&self, accept: Option<&str>) -> bool {
        accept.is_some_and(|a| a.contains("text/plain"))
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
        let mut text = TextOutput {
            buf: String::new(),
            scheme,
            timestamps_in_ms: self.timestamps_in_ms,
        };

        for snapshot in snapshots.iter().filter(|s| !s.is_empty()) {
            text.snapshot(snapshot);
        }
        // created series go last so they do not split the families above
        if self.include_created_timestamps {
            for snapshot in snapshots.iter().filter(|s| !s.is_empty()) {
                text.created(snapshot);
            }
        }

        out.write_all(text.buf.as_bytes())?;
        Ok(())
    }
}

struct TextOutput {
    buf: String,
    scheme: EscapingScheme,
    timestamps_in_ms: bool,
}

impl TextOutput {
    fn snapshot(&mut self, snapshot: &MetricSnapshot) {
        let meta = snapshot.metadata();
        let name = exposed_name(meta.name(), self.scheme).into_owned();
        match snapshot {
            MetricSnapshot::Counter(s) => {
                self.metadata(&name, "_total", "counter", meta);
                for p in s.data_points() {
                    self.sample(&name, "_total", &p.labels, None, &format_double(p.value), p.scrape_timestamp_millis);
                }
            }
            MetricSnapshot::Gauge(s) => {
                self.metadata(&name, "", "gauge", meta);
                for p in s.data_points() {
                    self.sample(&name, "", &p.labels, None, &format_double(p.value), p.scrape_timestamp_millis);
                }
            }
            MetricSnapshot::Histogram(s) => self.histogram(&name, s, false),
            MetricSnapshot::GaugeHistogram(s) => self.histogram(&name, s, true),
            MetricSnapshot::Summary(s) => self.summary(&name, s),
            MetricSnapshot::Info(s) => {
                self.metadata(&name, "_info", "gauge", meta);
                for p in s.data_points() {
                    self.sample(&name, "_info", &p.labels, None, "1", p.scrape_timestamp_millis);
                }
            }
            MetricSnapshot::StateSet(s) => {
                self.metadata(&name, "", "gauge", meta);
                for p in s.data_points() {
                    for state in &p.states {
                        let value = if state.value { "1" } else { "0" };
                        self.sample(
                            &name,
                            "",
                            &p.labels,
                            Some((meta.name(), state.name.as_str())),
                            value,
                            p.scrape_timestamp_millis,
                        );
                    }
                }
            }
            MetricSnapshot::Unknown(s) => {
                self.metadata(&name, "", "untyped", meta);
                for p in s.data_points() {
                    self.sample(&name, "", &p.labels, None, &format_double(p.value), p.scrape_timestamp_millis);
                }
            }
        }
    }

    fn histogram(&mut self, name: &str, snapshot: &HistogramSnapshot, gauge: bool) {
        let meta = snapshot.metadata();
        self.metadata(name, "", "histogram", meta);
        for p in snapshot.data_points() {
            if p.classic_buckets.is_empty() {
                // native-only: a single +Inf bucket keeps classic parsers happy
                if let Some(count) = p.count {
                    self.sample(
                        name,
                        "_bucket",
                        &p.labels,
                        Some(("le", "+Inf")),
                        &count.to_string(),
                        p.scrape_timestamp_millis,
                    );
                }
            } else {
                let mut cumulative = 0u64;
                for (upper_bound, count) in p.classic_buckets.iter() {
                    cumulative += count;
                    let le = format_double(upper_bound);
                    self.sample(
                        name,
                        "_bucket",
                        &p.labels,
                        Some(("le", le.as_str())),
                        &cumulative.to_string(),
                        p.scrape_timestamp_millis,
                    );
                }
            }
            if !gauge {
                if let Some(count) = p.count {
                    self.sample(name, "_count", &p.labels, None, &count.to_string(), p.scrape_timestamp_millis);
                }
                if let Some(sum) = p.sum {
                    self.sample(name, "_sum", &p.labels, None, &format_double(sum), p.scrape_timestamp_millis);
                }
            }
        }
        if gauge {
            self.gauge_histogram_totals(name, snapshot);
        }
    }

    fn gauge_histogram_totals(&mut self, name: &str, snapshot: &HistogramSnapshot) {
        let meta = snapshot.metadata();
        let points = snapshot.data_points();
        if points.iter().any(|p| p.count.is_some()) {
            self.metadata(name, "_gcount", "gauge", meta);
            for p in points {
                if let Some(count) = p.count {
                    self.sample(name, "_gcount", &p.labels, None, &count.to_string(), p.scrape_timestamp_millis);
                }
            }
        }
        if points.iter().any(|p| p.sum.is_some()) {
            self.metadata(name, "_gsum", "gauge", meta);
            for p in points {
                if let Some(sum) = p.sum {
                    self.sample(name, "_gsum", &p.labels, None, &format_double(sum), p.scrape_timestamp_millis);
                }
            }
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
                self.metadata(name, "", "summary", meta);
                metadata_written = true;
            }
            for q in p.quantiles.iter() {
                let quantile = format_double(q.quantile);
                self.sample(
                    name,
                    "",
                    &p.labels,
                    Some(("quantile", quantile.as_str())),
                    &format_double(q.value),
                    p.scrape_timestamp_millis,
                );
            }
            if let Some(count) = p.count {
                self.sample(name, "_count", &p.labels, None, &count.to_string(), p.scrape_timestamp_millis);
            }
            if let Some(sum) = p.sum {
                self.sample(name, "_sum", &p.labels, None, &format_double(sum), p.scrape_timestamp_millis);
            }
        }
    }

    fn created(&mut self, snapshot: &MetricSnapshot) {
        let meta = snapshot.metadata();
        let name = exposed_name(meta.name(), self.scheme).into_owned();
        let points: Vec<(&Labels, i64, Option<i64>)> = match snapshot {
            MetricSnapshot::Counter(s) => s
                .data_points()
                .iter()
                .filter_map(|p| Some((&p.labels, p.created_timestamp_millis?, p.scrape_timestamp_millis)))
                .collect(),
            MetricSnapshot::Histogram(s) => s
                .data_points()
                .iter()
                .filter_map(|p| Some((&p.labels, p.created_timestamp_millis?, p.scrape_timestamp_millis)))
                .collect(),
            MetricSnapshot::Summary(s) => s
                .data_points()
                .iter()
                .filter_map(|p| Some((&p.labels, p.created_timestamp_millis?, p.scrape_timestamp_millis)))
                .collect(),
            _ => return,
        };
        if points.is_empty() {
            return;
        }
        self.metadata(&name, "_created", "gauge", meta);
        for (labels, created, scrape) in points {
            push_name_and_labels(&mut self.buf, &name, "_created", labels, None, self.scheme);
            self.buf.push_str(&format_timestamp_seconds(created));
            self.timestamp(scrape);
            self.buf.push('\n');
        }
    }

    fn metadata(&mut self, name: &str, suffix: &str, type_name: &str, meta: &MetricMetadata) {
        if let Some(help) = meta.help().filter(|h| !h.is_empty()) {
            self.buf.push_str("# HELP ");
            push_metadata_name(&mut self.buf, name, suffix);
            self.buf.push(' ');
            escape_help(help, &mut self.buf);
            self.buf.push('\n');
        }
        self.buf.push_str("# TYPE ");
        push_metadata_name(&mut self.buf, name, suffix);
        self.buf.push(' ');
        self.buf.push_str(type_name);
        self.buf.push('\n');
    }

    fn sample(
        &mut self,
        name: &str,
        suffix: &str,
        labels: &Labels,
        extra: Option<(&str, &str)>,
        value: &str,
        scrape_timestamp_millis: Option<i64>,
    ) {
        push_name_and_labels(&mut self.buf, name, suffix, labels, extra, self.scheme);
        self.buf.push_str(value);
        self.timestamp(scrape_timestamp_millis);
        self.buf.push('\n');
    }

    fn timestamp(&mut self, scrape_timestamp_millis: Option<i64>) {
        if let Some(ts) = scrape_timestamp_millis {
            self.buf.push(' ');
            if self.timestamps_in_ms {
                self.buf.push_str(&ts.to_string());
            } else {
                self.buf.push_str(&format_timestamp_seconds(ts));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ClassicHistogramBuckets, CounterDataPoint, CounterSnapshot, HistogramDataPoint,
        InfoDataPoint, InfoSnapshot, QuantileValue, Quantiles, StateSetDataPoint,
        StateSetSnapshot, SummaryDataPoint, UnknownDataPoint, UnknownSnapshot,
    };

    fn write(snapshots: MetricSnapshots, config: &ExpositionConfig) -> String {
        PrometheusTextFormatWriter::new(config)
            .to_debug_string(&snapshots, EscapingScheme::UnderscoreEscaping)
            .unwrap()
    }

    fn counter() -> MetricSnapshot {
        MetricSnapshot::Counter(
            CounterSnapshot::builder("requests")
                .help("Total requests.\nSecond line")
                .data_point(CounterDataPoint {
                    labels: Labels::of([("path", "/a")]).unwrap(),
                    value: 5.0,
                    created_timestamp_millis: Some(1_672_850_385_800),
                    ..Default::default()
                })
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_counter() {
        let output = write(MetricSnapshots::of([counter()]).unwrap(), &ExpositionConfig::default());
        assert_eq!(
            output,
            "# HELP requests_total Total requests.\\nSecond line\n\
             # TYPE requests_total counter\n\
             requests_total{path=\"/a\"} 5.0\n"
        );
    }

    #[test]
    fn test_created_families_last() {
        let config = ExpositionConfig {
            include_created_timestamps: true,
            ..Default::default()
        };
        let output = write(MetricSnapshots::of([counter()]).unwrap(), &config);
        assert!(output.ends_with(
            "# HELP requests_created Total requests.\\nSecond line\n\
             # TYPE requests_created gauge\n\
             requests_created{path=\"/a\"} 1672850385.800\n"
        ));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let snapshot = MetricSnapshot::Histogram(
            HistogramSnapshot::builder("latency_seconds")
                .data_point(HistogramDataPoint {
                    classic_buckets: ClassicHistogramBuckets::new(
                        vec![0.5, 1.0, f64::INFINITY],
                        vec![2, 3, 1],
                    )
                    .unwrap(),
                    count: Some(6),
                    sum: Some(4.5),
                    scrape_timestamp_millis: Some(1_000),
                    ..Default::default()
                })
                .build()
                .unwrap(),
        );
        let output = write(MetricSnapshots::of([snapshot]).unwrap(), &ExpositionConfig::default());
        assert_eq!(
            output,
            "# TYPE latency_seconds histogram\n\
             latency_seconds_bucket{le=\"0.5\"} 2 1000\n\
             latency_seconds_bucket{le=\"1.0\"} 5 1000\n\
             latency_seconds_bucket{le=\"+Inf\"} 6 1000\n\
             latency_seconds_count 6 1000\n\
             latency_seconds_sum 4.5 1000\n"
        );
    }

    #[test]
    fn test_gauge_histogram_totals() {
        let snapshot = MetricSnapshot::GaugeHistogram(
            HistogramSnapshot::builder("queue_size")
                .data_point(HistogramDataPoint {
                    classic_buckets: ClassicHistogramBuckets::new(vec![f64::INFINITY], vec![3]).unwrap(),
                    count: Some(3),
                    sum: Some(7.0),
                    ..Default::default()
                })
                .build()
                .unwrap(),
        );
        let output = write(MetricSnapshots::of([snapshot]).unwrap(), &ExpositionConfig::default());
        assert_eq!(
            output,
            "# TYPE queue_size histogram\n\
             queue_size_bucket{le=\"+Inf\"} 3\n\
             # TYPE queue_size_gcount gauge\n\
             queue_size_gcount 3\n\
             # TYPE queue_size_gsum gauge\n\
             queue_size_gsum 7.0\n"
        );
    }

    #[test]
    fn test_summary_info_stateset_unknown() {
        let summary = MetricSnapshot::Summary(
            SummarySnapshot::builder("rpc_seconds")
                .data_point(SummaryDataPoint {
                    quantiles: Quantiles::new(vec![QuantileValue {
                        quantile: 0.5,
                        value: 0.25,
                    }])
                    .unwrap(),
                    count: Some(4),
                    sum: Some(1.0),
                    ..Default::default()
                })
                .build()
                .unwrap(),
        );
        let info = MetricSnapshot::Info(
            InfoSnapshot::builder("build")
                .data_point(InfoDataPoint {
                    labels: Labels::of([("version", "1.0")]).unwrap(),
                    ..Default::default()
                })
                .build()
                .unwrap(),
        );
        let state = MetricSnapshot::StateSet(
            StateSetSnapshot::builder("mode")
                .data_point(
                    StateSetDataPoint::new(
                        Labels::empty(),
                        [("a".to_string(), true), ("b".to_string(), false)],
                    )
                    .unwrap(),
                )
                .build()
                .unwrap(),
        );
        let unknown = MetricSnapshot::Unknown(
            UnknownSnapshot::builder("legacy")
                .data_point(UnknownDataPoint {
                    value: 3.0,
                    ..Default::default()
                })
                .build()
                .unwrap(),
        );
        let output = write(
            MetricSnapshots::of([summary, info, state, unknown]).unwrap(),
            &ExpositionConfig::default(),
        );
        assert_eq!(
            output,
            "# TYPE build_info gauge\n\
             build_info{version=\"1.0\"} 1\n\
             # TYPE legacy untyped\n\
             legacy 3.0\n\
             # TYPE mode gauge\n\
             mode{mode=\"a\"} 1\n\
             mode{mode=\"b\"} 0\n\
             # TYPE rpc_seconds summary\n\
             rpc_seconds{quantile=\"0.5\"} 0.25\n\
             rpc_seconds_count 4\n\
             rpc_seconds_sum 1.0\n"
        );
    }

    #[test]
    fn test_quoted_names_without_escaping() {
        let snapshot = MetricSnapshot::Counter(
            CounterSnapshot::builder("my.requests")
                .data_point(CounterDataPoint {
                    value: 1.0,
                    ..Default::default()
                })
                .build()
                .unwrap(),
        );
        let output = PrometheusTextFormatWriter::new(&ExpositionConfig::default())
            .to_debug_string(&MetricSnapshots::of([snapshot]).unwrap(), EscapingScheme::NoEscaping)
            .unwrap();
        assert_eq!(
            output,
            "# TYPE \"my.requests_total\" counter\n{\"my.requests_total\"} 1.0\n"
        );
    }

    #[test]
    fn test_empty_snapshot_skipped() {
        let snapshot = MetricSnapshot::Counter(CounterSnapshot::builder("idle").build().unwrap());
        let output = write(MetricSnapshots::of([snapshot]).unwrap(), &ExpositionConfig::default());
        assert!(output.is_empty());
    }
}
