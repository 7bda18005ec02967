//! Prometheus protobuf format
//!
//! Length-delimited `io.prometheus.client.MetricFamily` messages, encoded
//! by hand. Each family is first built as a small `Message` tree, which
//! is then either serialized to the wire format or rendered as protobuf
//! text for the debug endpoint.
//!
//! ```text
//!   MetricFamily { name=1 help=2 type=3 metric=4* }
//!     Metric { label=1* gauge=2 counter=3 summary=4 untyped=5
//!              timestamp_ms=6 histogram=7 }
//! ```

use std::fmt::Write as _;
use std::io::Write;

use bytes::{BufMut, BytesMut};

use super::util::{escape_label_value, exposed_label_name, exposed_name, format_double};
use super::ExpositionFormatWriter;
use crate::error::Result;
use crate::model::{
    EscapingScheme, Exemplar, HistogramDataPoint, Labels, MetricSnapshot, MetricSnapshots,
    NativeHistogramBuckets,
};

// Wire types
const VARINT: u8 = 0;
const FIXED64: u8 = 1;
const LENGTH_DELIMITED: u8 = 2;

/// `io.prometheus.client.MetricType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ProtoMetricType {
    Counter = 0,
    Gauge = 1,
    Summary = 2,
    Untyped = 3,
    Histogram = 4,
    GaugeHistogram = 5,
}

impl ProtoMetricType {
    fn as_str(&self) -> &'static str {
        match self {
            ProtoMetricType::Counter => "COUNTER",
            ProtoMetricType::Gauge => "GAUGE",
            ProtoMetricType::Summary => "SUMMARY",
            ProtoMetricType::Untyped => "UNTYPED",
            ProtoMetricType::Histogram => "HISTOGRAM",
            ProtoMetricType::GaugeHistogram => "GAUGE_HISTOGRAM",
        }
    }
}

// =============================================================================
// Message tree
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Value {
    /// uint32 / uint64
    Unsigned(u64),
    /// int64, two's complement varint
    Signed(i64),
    /// sint32 / sint64, zigzag varint
    ZigZag(i64),
    Double(f64),
    Enum(ProtoMetricType),
    Str(String),
    Message(Message),
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: &'static str,
    number: u32,
    value: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Message {
    fields: Vec<Field>,
}

impl Message {
    fn push(&mut self, name: &'static str, number: u32, value: Value) -> &mut Self {
        self.fields.push(Field { name, number, value });
        self
    }

    fn unsigned(&mut self, name: &'static str, number: u32, value: u64) -> &mut Self {
        self.push(name, number, Value::Unsigned(value))
    }

    fn signed(&mut self, name: &'static str, number: u32, value: i64) -> &mut Self {
        self.push(name, number, Value::Signed(value))
    }

    fn zigzag(&mut self, name: &'static str, number: u32, value: i64) -> &mut Self {
        self.push(name, number, Value::ZigZag(value))
    }

    fn double(&mut self, name: &'static str, number: u32, value: f64) -> &mut Self {
        self.push(name, number, Value::Double(value))
    }

    fn string(&mut self, name: &'static str, number: u32, value: impl Into<String>) -> &mut Self {
        self.push(name, number, Value::Str(value.into()))
    }

    fn message(&mut self, name: &'static str, number: u32, value: Message) -> &mut Self {
        self.push(name, number, Value::Message(value))
    }

    fn encode(&self, buf: &mut BytesMut) {
        for field in &self.fields {
            match &field.value {
                Value::Unsigned(v) => {
                    put_key(buf, field.number, VARINT);
                    put_varint(buf, *v);
                }
                Value::Signed(v) => {
                    put_key(buf, field.number, VARINT);
                    put_varint(buf, *v as u64);
                }
                Value::ZigZag(v) => {
                    put_key(buf, field.number, VARINT);
                    put_varint(buf, zigzag(*v));
                }
                Value::Enum(t) => {
                    put_key(buf, field.number, VARINT);
                    put_varint(buf, *t as u64);
                }
                Value::Double(v) => {
                    put_key(buf, field.number, FIXED64);
                    buf.put_f64_le(*v);
                }
                Value::Str(s) => {
                    put_key(buf, field.number, LENGTH_DELIMITED);
                    put_varint(buf, s.len() as u64);
                    buf.put_slice(s.as_bytes());
                }
                Value::Message(m) => {
                    let mut nested = BytesMut::new();
                    m.encode(&mut nested);
                    put_key(buf, field.number, LENGTH_DELIMITED);
                    put_varint(buf, nested.len() as u64);
                    buf.put_slice(&nested);
                }
            }
        }
    }

    /// Protobuf text format, two spaces per nesting level
    fn render(&self, out: &mut String, indent: usize) {
        for field in &self.fields {
            let pad = "  ".repeat(indent);
            match &field.value {
                Value::Message(m) => {
                    let _ = writeln!(out, "{}{} {{", pad, field.name);
                    m.render(out, indent + 1);
                    let _ = writeln!(out, "{}}}", pad);
                }
                Value::Str(s) => {
                    let mut escaped = String::with_capacity(s.len());
                    escape_label_value(s, &mut escaped);
                    let _ = writeln!(out, "{}{}: \"{}\"", pad, field.name, escaped);
                }
                Value::Unsigned(v) => {
                    let _ = writeln!(out, "{}{}: {}", pad, field.name, v);
                }
                Value::Signed(v) | Value::ZigZag(v) => {
                    let _ = writeln!(out, "{}{}: {}", pad, field.name, v);
                }
                Value::Double(v) => {
                    let _ = writeln!(out, "{}{}: {}", pad, field.name, format_double(*v));
                }
                Value::Enum(t) => {
                    let _ = writeln!(out, "{}{}: {}", pad, field.name, t.as_str());
                }
            }
        }
    }
}

fn put_key(buf: &mut BytesMut, number: u32, wire_type: u8) {
    put_varint(buf, (u64::from(number) << 3) | u64::from(wire_type));
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

// =============================================================================
// Native bucket spans
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpan {
    /// Gap to the previous span, or the first index for the first span
    pub offset: i32,
    pub length: u32,
}

/// Spans and count deltas for sparse native buckets.
///
/// Gaps of one or two empty buckets are filled with zero-count buckets
/// instead of opening a new span. Deltas run across span boundaries.
pub fn native_spans(buckets: &NativeHistogramBuckets) -> (Vec<BucketSpan>, Vec<i64>) {
    let mut spans = Vec::new();
    let mut deltas = Vec::new();
    let mut iter = buckets.iter().peekable();
    let Some(&(first, _)) = iter.peek() else {
        return (spans, deltas);
    };

    let mut current = BucketSpan {
        offset: first,
        length: 0,
    };
    let mut previous_index = first;
    let mut previous_count = 0i64;
    for (index, count) in iter {
        let count = count as i64;
        if index > previous_index + 1 {
            if index <= previous_index + 3 {
                while index > previous_index + 1 {
                    current.length += 1;
                    previous_index += 1;
                    deltas.push(-previous_count);
                    previous_count = 0;
                }
            } else {
                spans.push(current);
                current = BucketSpan {
                    offset: index - (previous_index + 1),
                    length: 0,
                };
            }
        }
        current.length += 1;
        previous_index = index;
        deltas.push(count - previous_count);
        previous_count = count;
    }
    spans.push(current);
    (spans, deltas)
}

// =============================================================================
// Writer
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PrometheusProtobufFormatWriter;

impl PrometheusProtobufFormatWriter {
    pub const CONTENT_TYPE: &'static str =
        "application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited";

    pub fn new() -> Self {
        Self
    }

    /// Delimited encoding of every non-empty family
    pub fn encode(&self, snapshots: &MetricSnapshots, scheme: EscapingScheme) -> BytesMut {
        let mut buf = BytesMut::new();
        for snapshot in snapshots.iter().filter(|s| !s.is_empty()) {
            let mut family = BytesMut::new();
            metric_family(snapshot, scheme).encode(&mut family);
            put_varint(&mut buf, family.len() as u64);
            buf.put_slice(&family);
        }
        buf
    }
}

impl ExpositionFormatWriter for PrometheusProtobufFormatWriter {
    fn accepts(&self, accept: Option<&str>) -> bool {
        accept.is_some_and(|a| {
            a.contains("application/vnd.google.protobuf")
                && a.contains("proto=io.prometheus.client.MetricFamily")
        })
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
        out.write_all(&self.encode(snapshots, scheme))?;
        Ok(())
    }

    fn to_debug_string(&self, snapshots: &MetricSnapshots, scheme: EscapingScheme) -> Result<String> {
        let mut out = String::new();
        for snapshot in snapshots.iter().filter(|s| !s.is_empty()) {
            metric_family(snapshot, scheme).render(&mut out, 0);
        }
        Ok(out)
    }
}

fn metric_family(snapshot: &MetricSnapshot, scheme: EscapingScheme) -> Message {
    let meta = snapshot.metadata();
    let base = exposed_name(meta.name(), scheme);

    let (suffix, metric_type, metrics): (&str, ProtoMetricType, Vec<Message>) = match snapshot {
        MetricSnapshot::Counter(s) => (
            "_total",
            ProtoMetricType::Counter,
            s.data_points()
                .iter()
                .map(|p| {
                    let mut counter = Message::default();
                    counter.double("value", 1, p.value);
                    if let Some(exemplar) = &p.exemplar {
                        counter.message("exemplar", 2, exemplar_message(exemplar, scheme));
                    }
                    if let Some(created) = p.created_timestamp_millis {
                        counter.message("created_timestamp", 3, timestamp(created));
                    }
                    metric(&p.labels, None, "counter", 3, counter, p.scrape_timestamp_millis, scheme)
                })
                .collect(),
        ),
        MetricSnapshot::Gauge(s) => (
            "",
            ProtoMetricType::Gauge,
            s.data_points()
                .iter()
                .map(|p| metric(&p.labels, None, "gauge", 2, value(p.value), p.scrape_timestamp_millis, scheme))
                .collect(),
        ),
        MetricSnapshot::Histogram(s) | MetricSnapshot::GaugeHistogram(s) => (
            "",
            if matches!(snapshot, MetricSnapshot::GaugeHistogram(_)) {
                ProtoMetricType::GaugeHistogram
            } else {
                ProtoMetricType::Histogram
            },
            s.data_points()
                .iter()
                .map(|p| {
                    metric(&p.labels, None, "histogram", 7, histogram(p, scheme), p.scrape_timestamp_millis, scheme)
                })
                .collect(),
        ),
        MetricSnapshot::Summary(s) => (
            "",
            ProtoMetricType::Summary,
            s.data_points()
                .iter()
                .filter(|p| p.count.is_some() || p.sum.is_some() || !p.quantiles.is_empty())
                .map(|p| {
                    let mut summary = Message::default();
                    if let Some(count) = p.count {
                        summary.unsigned("sample_count", 1, count);
                    }
                    if let Some(sum) = p.sum {
                        summary.double("sample_sum", 2, sum);
                    }
                    for q in p.quantiles.iter() {
                        let mut quantile = Message::default();
                        quantile.double("quantile", 1, q.quantile).double("value", 2, q.value);
                        summary.message("quantile", 3, quantile);
                    }
                    if let Some(created) = p.created_timestamp_millis {
                        summary.message("created_timestamp", 4, timestamp(created));
                    }
                    metric(&p.labels, None, "summary", 4, summary, p.scrape_timestamp_millis, scheme)
                })
                .collect(),
        ),
        MetricSnapshot::Info(s) => (
            "_info",
            ProtoMetricType::Gauge,
            s.data_points()
                .iter()
                .map(|p| metric(&p.labels, None, "gauge", 2, value(1.0), p.scrape_timestamp_millis, scheme))
                .collect(),
        ),
        MetricSnapshot::StateSet(s) => (
            "",
            ProtoMetricType::Gauge,
            s.data_points()
                .iter()
                .flat_map(|p| {
                    p.states.iter().map(move |state| {
                        let v = if state.value { 1.0 } else { 0.0 };
                        metric(
                            &p.labels,
                            Some((meta.name(), state.name.as_str())),
                            "gauge",
                            2,
                            value(v),
                            p.scrape_timestamp_millis,
                            scheme,
                        )
                    })
                })
                .collect(),
        ),
        MetricSnapshot::Unknown(s) => (
            "",
            ProtoMetricType::Untyped,
            s.data_points()
                .iter()
                .map(|p| metric(&p.labels, None, "untyped", 5, value(p.value), p.scrape_timestamp_millis, scheme))
                .collect(),
        ),
    };

    let mut family = Message::default();
    family.string("name", 1, format!("{}{}", base, suffix));
    if let Some(help) = meta.help() {
        family.string("help", 2, help);
    }
    family.push("type", 3, Value::Enum(metric_type));
    for m in metrics {
        family.message("metric", 4, m);
    }
    family
}

fn metric(
    labels: &Labels,
    extra: Option<(&str, &str)>,
    kind: &'static str,
    number: u32,
    body: Message,
    scrape_timestamp_millis: Option<i64>,
    scheme: EscapingScheme,
) -> Message {
    let mut metric = Message::default();
    add_labels(&mut metric, labels, scheme);
    if let Some((name, value)) = extra {
        metric.message("label", 1, label_pair(exposed_label_name(name, scheme), value));
    }
    metric.message(kind, number, body);
    if let Some(ts) = scrape_timestamp_millis {
        metric.signed("timestamp_ms", 6, ts);
    }
    // histogram (7) sorts after timestamp_ms (6)
    metric.fields.sort_by_key(|f| f.number);
    metric
}

fn histogram(p: &HistogramDataPoint, scheme: EscapingScheme) -> Message {
    let mut h = Message::default();
    if let Some(count) = p.count {
        h.unsigned("sample_count", 1, count);
    }
    if let Some(sum) = p.sum {
        h.double("sample_sum", 2, sum);
    }

    if p.has_classic() {
        let mut lower = f64::NEG_INFINITY;
        let mut cumulative = 0u64;
        for (upper, count) in p.classic_buckets.iter() {
            cumulative += count;
            let mut bucket = Message::default();
            bucket
                .unsigned("cumulative_count", 1, cumulative)
                .double("upper_bound", 2, upper);
            if let Some(exemplar) = p.exemplars.get(lower, upper) {
                bucket.message("exemplar", 3, exemplar_message(exemplar, scheme));
            }
            h.message("bucket", 3, bucket);
            lower = upper;
        }
    } else if let (Some(native), Some(exemplar)) = (&p.native, p.exemplars.latest()) {
        // native only: a lone +Inf bucket carries the exemplar
        let mut bucket = Message::default();
        bucket
            .unsigned("cumulative_count", 1, p.count.unwrap_or_else(|| native.total()))
            .double("upper_bound", 2, f64::INFINITY)
            .message("exemplar", 3, exemplar_message(exemplar, scheme));
        h.message("bucket", 3, bucket);
    }

    if let Some(native) = &p.native {
        h.zigzag("schema", 5, i64::from(native.schema))
            .double("zero_threshold", 6, native.zero_threshold)
            .unsigned("zero_count", 7, native.zero_count);
        let (negative_spans, negative_deltas) = native_spans(&native.negative);
        for span in negative_spans {
            h.message("negative_span", 9, span_message(span));
        }
        for delta in negative_deltas {
            h.zigzag("negative_delta", 10, delta);
        }
        let (positive_spans, positive_deltas) = native_spans(&native.positive);
        for span in positive_spans {
            h.message("positive_span", 12, span_message(span));
        }
        for delta in positive_deltas {
            h.zigzag("positive_delta", 13, delta);
        }
    }

    if let Some(created) = p.created_timestamp_millis {
        h.message("created_timestamp", 15, timestamp(created));
    }
    h
}

fn span_message(span: BucketSpan) -> Message {
    let mut m = Message::default();
    m.zigzag("offset", 1, i64::from(span.offset))
        .unsigned("length", 2, u64::from(span.length));
    m
}

fn value(v: f64) -> Message {
    let mut m = Message::default();
    m.double("value", 1, v);
    m
}

fn label_pair(name: String, value: &str) -> Message {
    let mut m = Message::default();
    m.string("name", 1, name).string("value", 2, value);
    m
}

fn add_labels(message: &mut Message, labels: &Labels, scheme: EscapingScheme) {
    for (name, value) in labels.iter() {
        message.message("label", 1, label_pair(exposed_label_name(name, scheme), value));
    }
}

fn exemplar_message(exemplar: &Exemplar, scheme: EscapingScheme) -> Message {
    let mut m = Message::default();
    add_labels(&mut m, exemplar.labels(), scheme);
    m.double("value", 2, exemplar.value());
    if let Some(ts) = exemplar.timestamp_millis() {
        m.message("timestamp", 3, timestamp(ts));
    }
    m
}

fn timestamp(millis: i64) -> Message {
    let mut m = Message::default();
    m.signed("seconds", 1, millis.div_euclid(1000))
        .signed("nanos", 2, millis.rem_euclid(1000) * 1_000_000);
    m
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CounterDataPoint, CounterSnapshot, HistogramSnapshot, NativeHistogramData,
        StateSetDataPoint, StateSetSnapshot,
    };

    fn spans(pairs: &[(i32, u64)]) -> (Vec<(i32, u32)>, Vec<i64>) {
        let (spans, deltas) = native_spans(&NativeHistogramBuckets::new(pairs.iter().copied()));
        (spans.into_iter().map(|s| (s.offset, s.length)).collect(), deltas)
    }

    /// Field number, wire type and payload of each top-level field
    fn decode(mut buf: &[u8]) -> Vec<(u32, u8, Vec<u8>)> {
        fn varint(buf: &mut &[u8]) -> u64 {
            let mut value = 0u64;
            let mut shift = 0;
            loop {
                let byte = buf[0];
                *buf = &buf[1..];
                value |= u64::from(byte & 0x7f) << shift;
                if byte < 0x80 {
                    return value;
                }
                shift += 7;
            }
        }
        let mut fields = Vec::new();
        while !buf.is_empty() {
            let key = varint(&mut buf);
            let (number, wire) = ((key >> 3) as u32, (key & 7) as u8);
            let payload = match wire {
                VARINT => varint(&mut buf).to_le_bytes().to_vec(),
                FIXED64 => {
                    let (head, tail) = buf.split_at(8);
                    buf = tail;
                    head.to_vec()
                }
                _ => {
                    let len = varint(&mut buf) as usize;
                    let (head, tail) = buf.split_at(len);
                    buf = tail;
                    head.to_vec()
                }
            };
            fields.push((number, wire, payload));
        }
        fields
    }

    #[test]
    fn test_varint_and_zigzag() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, 300);
        assert_eq!(&buf[..], &[0xac, 0x02]);
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-3), 5);
    }

    #[test]
    fn test_gap_of_two_is_coalesced() {
        let (spans, deltas) = spans(&[(0, 2), (1, 3), (4, 1)]);
        assert_eq!(spans, vec![(0, 5)]);
        assert_eq!(deltas, vec![2, 1, -3, 0, 1]);
    }

    #[test]
    fn test_gap_of_three_opens_span() {
        let (spans, deltas) = spans(&[(-2, 1), (3, 4)]);
        assert_eq!(spans, vec![(-2, 1), (4, 1)]);
        assert_eq!(deltas, vec![1, 3]);
    }

    #[test]
    fn test_empty_native_buckets() {
        assert_eq!(spans(&[]), (vec![], vec![]));
    }

    #[test]
    fn test_counter_family_encoding() {
        let snapshots = MetricSnapshots::of([MetricSnapshot::Counter(
            CounterSnapshot::builder("requests")
                .help("Total requests")
                .data_point(CounterDataPoint {
                    labels: Labels::of([("path", "/a")]).unwrap(),
                    value: 5.0,
                    ..Default::default()
                })
                .build()
                .unwrap(),
        )])
        .unwrap();
        let bytes = PrometheusProtobufFormatWriter::new().encode(&snapshots, EscapingScheme::UnderscoreEscaping);

        // one delimited family
        let len = bytes[0] as usize;
        assert_eq!(bytes.len(), len + 1);
        let family = decode(&bytes[1..]);
        assert_eq!(family[0], (1, LENGTH_DELIMITED, b"requests_total".to_vec()));
        assert_eq!(family[1], (2, LENGTH_DELIMITED, b"Total requests".to_vec()));
        assert_eq!(family[2].0, 3);
        assert_eq!(family[2].2[0], ProtoMetricType::Counter as u8);

        let metric = decode(&family[3].2);
        let label = decode(&metric[0].2);
        assert_eq!(label[0].2, b"path".to_vec());
        assert_eq!(label[1].2, b"/a".to_vec());
        let counter = decode(&metric[1].2);
        assert_eq!(metric[1].0, 3);
        assert_eq!(counter[0], (1, FIXED64, 5.0f64.to_le_bytes().to_vec()));
    }

    #[test]
    fn test_debug_string() {
        let snapshots = MetricSnapshots::of([MetricSnapshot::StateSet(
            StateSetSnapshot::builder("mode")
                .data_point(StateSetDataPoint::new(Labels::empty(), [("on".to_string(), true)]).unwrap())
                .build()
                .unwrap(),
        )])
        .unwrap();
        let debug = PrometheusProtobufFormatWriter::new()
            .to_debug_string(&snapshots, EscapingScheme::UnderscoreEscaping)
            .unwrap();
        assert_eq!(
            debug,
            "name: \"mode\"\n\
             type: GAUGE\n\
             metric {\n  \
               label {\n    \
                 name: \"mode\"\n    \
                 value: \"on\"\n  \
               }\n  \
               gauge {\n    \
                 value: 1.0\n  \
               }\n\
             }\n"
        );
    }

    #[test]
    fn test_native_only_histogram_gets_inf_bucket() {
        let exemplar = Exemplar::builder().value(3.0).trace_id("t").build().unwrap();
        let point = HistogramDataPoint {
            native: Some(NativeHistogramData {
                schema: 5,
                zero_count: 0,
                zero_threshold: 0.0,
                positive: NativeHistogramBuckets::new([(10, 1)]),
                negative: NativeHistogramBuckets::empty(),
            }),
            count: Some(1),
            sum: Some(3.0),
            exemplars: crate::model::Exemplars::of(vec![exemplar]),
            ..Default::default()
        };
        let snapshots = MetricSnapshots::of([MetricSnapshot::Histogram(
            HistogramSnapshot::builder("size").data_point(point).build().unwrap(),
        )])
        .unwrap();
        let debug = PrometheusProtobufFormatWriter::new()
            .to_debug_string(&snapshots, EscapingScheme::UnderscoreEscaping)
            .unwrap();
        assert!(debug.contains("    bucket {\n      cumulative_count: 1\n      upper_bound: +Inf\n"));
        assert!(debug.contains("    schema: 5\n"));
        assert!(debug.contains("    positive_span {\n      offset: 10\n      length: 1\n    }\n"));
        assert!(debug.contains("    positive_delta: 1\n"));
        assert!(debug.contains("type: HISTOGRAM\n"));
    }

    #[test]
    fn test_accepts() {
        let writer = PrometheusProtobufFormatWriter::new();
        assert!(writer.accepts(Some(
            "application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=delimited"
        )));
        assert!(!writer.accepts(Some("application/vnd.google.protobuf")));
        assert!(!writer.accepts(None));
    }
}
