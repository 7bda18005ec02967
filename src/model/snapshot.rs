//! Immutable metric snapshots
//!
//! A scrape turns every collector into a [`MetricSnapshot`]: metadata plus
//! data points sorted by labels. Snapshots sharing a prometheus name are
//! merged into one family in [`MetricSnapshots`].
//!
//! ```text
//!   MetricSnapshots (sorted by prometheus name)
//!     └── MetricSnapshot::Counter(Snapshot<CounterDataPoint>)
//!           ├── metadata: name, help, unit
//!           └── data points (sorted by labels, no duplicates)
//! ```

use std::collections::BTreeMap;

use super::exemplar::{Exemplar, Exemplars};
use super::labels::Labels;
use super::metadata::{MetricMetadata, MetricType, Unit};
use crate::error::{Error, Result};

/// Common view over the data point flavours
pub trait DataPoint: Clone + std::fmt::Debug {
    fn labels(&self) -> &Labels;

    fn scrape_timestamp_millis(&self) -> Option<i64>;

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Data points
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CounterDataPoint {
    pub labels: Labels,
    pub value: f64,
    pub exemplar: Option<Exemplar>,
    pub created_timestamp_millis: Option<i64>,
    pub scrape_timestamp_millis: Option<i64>,
}

impl DataPoint for CounterDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }

    fn validate(&self) -> Result<()> {
        if self.value < 0.0 {
            return Err(Error::invalid(format!(
                "counter value must not be negative, got {}",
                self.value
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GaugeDataPoint {
    pub labels: Labels,
    pub value: f64,
    pub exemplar: Option<Exemplar>,
    pub scrape_timestamp_millis: Option<i64>,
}

impl DataPoint for GaugeDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }
}

/// Untyped value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnknownDataPoint {
    pub labels: Labels,
    pub value: f64,
    pub exemplar: Option<Exemplar>,
    pub scrape_timestamp_millis: Option<i64>,
}

impl DataPoint for UnknownDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }
}

/// Classic buckets: upper bounds ending with +Inf, non-cumulative counts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassicHistogramBuckets {
    upper_bounds: Vec<f64>,
    counts: Vec<u64>,
}

impl ClassicHistogramBuckets {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(upper_bounds: Vec<f64>, counts: Vec<u64>) -> Result<Self> {
        if upper_bounds.len() != counts.len() {
            return Err(Error::invalid(format!(
                "{} upper bounds but {} bucket counts",
                upper_bounds.len(),
                counts.len()
            )));
        }
        if upper_bounds.iter().any(|b| b.is_nan()) {
            return Err(Error::invalid("histogram bucket upper bound must not be NaN"));
        }
        let mut pairs: Vec<(f64, u64)> = upper_bounds.into_iter().zip(counts).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(Error::invalid("duplicate histogram bucket upper bound"));
        }
        if let Some(last) = pairs.last() {
            if last.0 != f64::INFINITY {
                return Err(Error::invalid("the last histogram bucket must be +Inf"));
            }
        }
        let (upper_bounds, counts) = pairs.into_iter().unzip();
        Ok(Self {
            upper_bounds,
            counts,
        })
    }

    pub fn len(&self) -> usize {
        self.upper_bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upper_bounds.is_empty()
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    /// `(upper_bound, count)` pairs, counts not cumulative
    pub fn iter(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.upper_bounds
            .iter()
            .copied()
            .zip(self.counts.iter().copied())
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Sparse native buckets, sorted by index
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NativeHistogramBuckets {
    indexes: Vec<i32>,
    counts: Vec<u64>,
}

impl NativeHistogramBuckets {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(pairs: impl IntoIterator<Item = (i32, u64)>) -> Self {
        let mut pairs: Vec<(i32, u64)> = pairs.into_iter().collect();
        pairs.sort_by_key(|p| p.0);
        let (indexes, counts) = pairs.into_iter().unzip();
        Self { indexes, counts }
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// `(bucket_index, count)` pairs in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.indexes.iter().copied().zip(self.counts.iter().copied())
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Native (sparse exponential) representation of a histogram
#[derive(Debug, Clone, PartialEq)]
pub struct NativeHistogramData {
    pub schema: i32,
    pub zero_count: u64,
    pub zero_threshold: f64,
    pub positive: NativeHistogramBuckets,
    pub negative: NativeHistogramBuckets,
}

impl NativeHistogramData {
    pub fn total(&self) -> u64 {
        self.zero_count + self.positive.total() + self.negative.total()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramDataPoint {
    pub labels: Labels,
    pub classic_buckets: ClassicHistogramBuckets,
    pub native: Option<NativeHistogramData>,
    pub count: Option<u64>,
    pub sum: Option<f64>,
    pub exemplars: Exemplars,
    pub created_timestamp_millis: Option<i64>,
    pub scrape_timestamp_millis: Option<i64>,
}

impl HistogramDataPoint {
    pub fn has_classic(&self) -> bool {
        !self.classic_buckets.is_empty()
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }
}

impl DataPoint for HistogramDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }

    fn validate(&self) -> Result<()> {
        if let Some(native) = &self.native {
            if !(-4..=8).contains(&native.schema) {
                return Err(Error::invalid(format!(
                    "native histogram schema {} not in [-4, 8]",
                    native.schema
                )));
            }
            if native.zero_threshold < 0.0 || native.zero_threshold.is_nan() {
                return Err(Error::invalid("native zero threshold must be >= 0"));
            }
        }
        if let (Some(count), true) = (self.count, self.has_classic()) {
            if count != self.classic_buckets.total() {
                return Err(Error::invalid(format!(
                    "histogram count {} differs from bucket total {}",
                    count,
                    self.classic_buckets.total()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileValue {
    pub quantile: f64,
    pub value: f64,
}

/// Summary quantiles, sorted by quantile
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Quantiles(Vec<QuantileValue>);

impl Quantiles {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(values: Vec<QuantileValue>) -> Result<Self> {
        let mut values = values;
        if let Some(bad) = values.iter().find(|q| !(0.0..=1.0).contains(&q.quantile)) {
            return Err(Error::InvalidQuantile(bad.quantile));
        }
        values.sort_by(|a, b| a.quantile.total_cmp(&b.quantile));
        if values.windows(2).any(|w| w[0].quantile == w[1].quantile) {
            return Err(Error::invalid("duplicate summary quantile"));
        }
        Ok(Quantiles(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QuantileValue> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryDataPoint {
    pub labels: Labels,
    pub quantiles: Quantiles,
    pub count: Option<u64>,
    pub sum: Option<f64>,
    pub exemplars: Exemplars,
    pub created_timestamp_millis: Option<i64>,
    pub scrape_timestamp_millis: Option<i64>,
}

impl DataPoint for SummaryDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }
}

/// Info metric: labels only, value is always 1
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InfoDataPoint {
    pub labels: Labels,
    pub scrape_timestamp_millis: Option<i64>,
}

impl DataPoint for InfoDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub name: String,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateSetDataPoint {
    pub labels: Labels,
    pub states: Vec<State>,
    pub scrape_timestamp_millis: Option<i64>,
}

impl StateSetDataPoint {
    pub fn new(labels: Labels, states: impl IntoIterator<Item = (String, bool)>) -> Result<Self> {
        let mut states: Vec<State> = states
            .into_iter()
            .map(|(name, value)| State { name, value })
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        let point = Self {
            labels,
            states,
            scrape_timestamp_millis: None,
        };
        point.validate()?;
        Ok(point)
    }
}

impl DataPoint for StateSetDataPoint {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn scrape_timestamp_millis(&self) -> Option<i64> {
        self.scrape_timestamp_millis
    }

    fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(Error::invalid("state set needs at least one state"));
        }
        let mut names: Vec<&str> = self.states.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::invalid(format!("duplicate state name '{}'", w[0])));
        }
        Ok(())
    }
}

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<D> {
    metadata: MetricMetadata,
    data_points: Vec<D>,
}

impl<D: DataPoint> Snapshot<D> {
    /// Sorts data points by labels and rejects duplicate label sets
    pub fn new(metadata: MetricMetadata, mut data_points: Vec<D>) -> Result<Self> {
        for point in &data_points {
            point.validate()?;
        }
        data_points.sort_by(|a, b| a.labels().cmp(b.labels()));
        if let Some(w) = data_points
            .windows(2)
            .find(|w| w[0].labels() == w[1].labels())
        {
            return Err(Error::DuplicateLabels {
                name: metadata.prometheus_name().to_string(),
                labels: w[0].labels().to_string(),
            });
        }
        Ok(Self {
            metadata,
            data_points,
        })
    }

    pub fn builder(name: impl Into<String>) -> SnapshotBuilder<D> {
        SnapshotBuilder {
            name: name.into(),
            help: None,
            unit: None,
            data_points: Vec::new(),
        }
    }

    pub fn metadata(&self) -> &MetricMetadata {
        &self.metadata
    }

    pub fn data_points(&self) -> &[D] {
        &self.data_points
    }

    fn merge(self, other: Snapshot<D>) -> Result<Self> {
        let mut data_points = self.data_points;
        data_points.extend(other.data_points);
        Self::new(self.metadata, data_points)
    }
}

#[derive(Debug)]
pub struct SnapshotBuilder<D> {
    name: String,
    help: Option<String>,
    unit: Option<Unit>,
    data_points: Vec<D>,
}

impl<D: DataPoint> SnapshotBuilder<D> {
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn data_point(mut self, point: D) -> Self {
        self.data_points.push(point);
        self
    }

    pub fn build(self) -> Result<Snapshot<D>> {
        let metadata = MetricMetadata::with(self.name, self.help, self.unit)?;
        Snapshot::new(metadata, self.data_points)
    }
}

pub type CounterSnapshot = Snapshot<CounterDataPoint>;
pub type GaugeSnapshot = Snapshot<GaugeDataPoint>;
pub type HistogramSnapshot = Snapshot<HistogramDataPoint>;
pub type SummarySnapshot = Snapshot<SummaryDataPoint>;
pub type InfoSnapshot = Snapshot<InfoDataPoint>;
pub type StateSetSnapshot = Snapshot<StateSetDataPoint>;
pub type UnknownSnapshot = Snapshot<UnknownDataPoint>;

#[derive(Debug, Clone, PartialEq)]
pub enum MetricSnapshot {
    Counter(CounterSnapshot),
    Gauge(GaugeSnapshot),
    Histogram(HistogramSnapshot),
    GaugeHistogram(HistogramSnapshot),
    Summary(SummarySnapshot),
    Info(InfoSnapshot),
    StateSet(StateSetSnapshot),
    Unknown(UnknownSnapshot),
}

macro_rules! each_variant {
    ($snapshot:expr, $s:ident => $body:expr) => {
        match $snapshot {
            MetricSnapshot::Counter($s) => $body,
            MetricSnapshot::Gauge($s) => $body,
            MetricSnapshot::Histogram($s) => $body,
            MetricSnapshot::GaugeHistogram($s) => $body,
            MetricSnapshot::Summary($s) => $body,
            MetricSnapshot::Info($s) => $body,
            MetricSnapshot::StateSet($s) => $body,
            MetricSnapshot::Unknown($s) => $body,
        }
    };
}

impl MetricSnapshot {
    pub fn metadata(&self) -> &MetricMetadata {
        each_variant!(self, s => s.metadata())
    }

    pub fn prometheus_name(&self) -> &str {
        self.metadata().prometheus_name()
    }

    /// Gauge histograms report as histograms for conflict checks
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricSnapshot::Counter(_) => MetricType::Counter,
            MetricSnapshot::Gauge(_) => MetricType::Gauge,
            MetricSnapshot::Histogram(_) | MetricSnapshot::GaugeHistogram(_) => {
                MetricType::Histogram
            }
            MetricSnapshot::Summary(_) => MetricType::Summary,
            MetricSnapshot::Info(_) => MetricType::Info,
            MetricSnapshot::StateSet(_) => MetricType::StateSet,
            MetricSnapshot::Unknown(_) => MetricType::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, s => s.data_points().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label sets of all data points, in order
    pub fn label_sets(&self) -> Vec<&Labels> {
        each_variant!(self, s => s.data_points().iter().map(DataPoint::labels).collect())
    }

    fn kind(&self) -> &'static str {
        match self {
            MetricSnapshot::GaugeHistogram(_) => "gaugehistogram",
            other => other.metric_type().as_str(),
        }
    }

    /// Combine two snapshots of one family
    pub fn merge(self, other: MetricSnapshot) -> Result<MetricSnapshot> {
        use MetricSnapshot::*;
        Ok(match (self, other) {
            (Counter(a), Counter(b)) => Counter(a.merge(b)?),
            (Gauge(a), Gauge(b)) => Gauge(a.merge(b)?),
            (Histogram(a), Histogram(b)) => Histogram(a.merge(b)?),
            (GaugeHistogram(a), GaugeHistogram(b)) => GaugeHistogram(a.merge(b)?),
            (Summary(a), Summary(b)) => Summary(a.merge(b)?),
            (Info(a), Info(b)) => Info(a.merge(b)?),
            (StateSet(a), StateSet(b)) => StateSet(a.merge(b)?),
            (Unknown(a), Unknown(b)) => Unknown(a.merge(b)?),
            (a, b) => {
                return Err(Error::TypeConflict {
                    name: a.prometheus_name().to_string(),
                    existing: a.kind().to_string(),
                    new: b.kind().to_string(),
                })
            }
        })
    }
}

// =============================================================================
// Collection
// =============================================================================

/// Result of a scrape: one snapshot per prometheus name, sorted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshots(Vec<MetricSnapshot>);

impl MetricSnapshots {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> MetricSnapshotsBuilder {
        MetricSnapshotsBuilder::default()
    }

    pub fn of(snapshots: impl IntoIterator<Item = MetricSnapshot>) -> Result<Self> {
        let mut builder = Self::builder();
        for snapshot in snapshots {
            builder = builder.metric_snapshot(snapshot)?;
        }
        Ok(builder.build())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricSnapshot> {
        self.0.iter()
    }

    pub fn get(&self, prometheus_name: &str) -> Option<&MetricSnapshot> {
        self.0
            .binary_search_by(|s| s.prometheus_name().cmp(prometheus_name))
            .ok()
            .map(|i| &self.0[i])
    }
}

impl<'a> IntoIterator for &'a MetricSnapshots {
    type Item = &'a MetricSnapshot;
    type IntoIter = std::slice::Iter<'a, MetricSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for MetricSnapshots {
    type Item = MetricSnapshot;
    type IntoIter = std::vec::IntoIter<MetricSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Merges snapshots by prometheus name as they are added
#[derive(Debug, Default)]
pub struct MetricSnapshotsBuilder {
    by_name: BTreeMap<String, MetricSnapshot>,
}

impl MetricSnapshotsBuilder {
    pub fn metric_snapshot(mut self, snapshot: MetricSnapshot) -> Result<Self> {
        self.add(snapshot)?;
        Ok(self)
    }

    pub fn add(&mut self, snapshot: MetricSnapshot) -> Result<()> {
        let name = snapshot.prometheus_name().to_string();
        let merged = match self.by_name.remove(&name) {
            Some(existing) => existing.merge(snapshot)?,
            None => snapshot,
        };
        self.by_name.insert(name, merged);
        Ok(())
    }

    pub fn build(self) -> MetricSnapshots {
        MetricSnapshots(self.by_name.into_values().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn counter(name: &str, path: &str, value: f64) -> MetricSnapshot {
        MetricSnapshot::Counter(
            CounterSnapshot::builder(name)
                .data_point(CounterDataPoint {
                    labels: Labels::of([("path", path)]).unwrap(),
                    value,
                    ..Default::default()
                })
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_data_points_sorted_by_labels() {
        let snapshot = GaugeSnapshot::builder("temp")
            .data_point(GaugeDataPoint {
                labels: Labels::of([("room", "b")]).unwrap(),
                value: 2.0,
                ..Default::default()
            })
            .data_point(GaugeDataPoint {
                labels: Labels::of([("room", "a")]).unwrap(),
                value: 1.0,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(snapshot.data_points()[0].labels.get("room"), Some("a"));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let result = CounterSnapshot::builder("requests")
            .data_point(CounterDataPoint::default())
            .data_point(CounterDataPoint::default())
            .build();
        assert_matches!(result, Err(Error::DuplicateLabels { name, .. }) if name == "requests");
    }

    #[test]
    fn test_negative_counter_rejected() {
        let result = CounterSnapshot::builder("requests")
            .data_point(CounterDataPoint {
                value: -1.0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_classic_buckets_validation() {
        assert!(ClassicHistogramBuckets::new(vec![1.0, 2.0], vec![1, 1]).is_err());
        assert!(ClassicHistogramBuckets::new(vec![1.0, f64::NAN], vec![1, 1]).is_err());
        assert!(ClassicHistogramBuckets::new(vec![1.0], vec![1, 2]).is_err());

        let buckets =
            ClassicHistogramBuckets::new(vec![f64::INFINITY, 1.0], vec![3, 2]).unwrap();
        assert_eq!(buckets.upper_bounds(), &[1.0, f64::INFINITY]);
        assert_eq!(buckets.total(), 5);
    }

    #[test]
    fn test_histogram_count_must_match_buckets() {
        let point = HistogramDataPoint {
            classic_buckets: ClassicHistogramBuckets::new(vec![f64::INFINITY], vec![2]).unwrap(),
            count: Some(3),
            ..Default::default()
        };
        assert!(point.validate().is_err());
    }

    #[test]
    fn test_native_buckets_sorted() {
        let buckets = NativeHistogramBuckets::new([(3, 1), (-2, 4), (0, 2)]);
        let indexes: Vec<i32> = buckets.iter().map(|(i, _)| i).collect();
        assert_eq!(indexes, vec![-2, 0, 3]);
        assert_eq!(buckets.total(), 7);
    }

    #[test]
    fn test_state_set_validation() {
        assert!(StateSetDataPoint::new(Labels::empty(), vec![]).is_err());
        assert!(StateSetDataPoint::new(
            Labels::empty(),
            vec![("a".to_string(), true), ("a".to_string(), false)]
        )
        .is_err());
    }

    #[test]
    fn test_quantiles_validation() {
        assert_matches!(
            Quantiles::new(vec![QuantileValue { quantile: 1.2, value: 0.0 }]),
            Err(Error::InvalidQuantile(_))
        );
    }

    #[test]
    fn test_merge_disjoint_labels() {
        let snapshots =
            MetricSnapshots::of(vec![counter("requests", "/a", 1.0), counter("requests", "/b", 2.0)])
                .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots.get("requests").map(MetricSnapshot::len), Some(2));
    }

    #[test]
    fn test_merge_duplicate_labels_fails() {
        let result =
            MetricSnapshots::of(vec![counter("requests", "/a", 1.0), counter("requests", "/a", 2.0)]);
        assert_matches!(result, Err(Error::DuplicateLabels { .. }));
    }

    #[test]
    fn test_merge_type_conflict() {
        let gauge = MetricSnapshot::Gauge(
            GaugeSnapshot::builder("requests")
                .data_point(GaugeDataPoint::default())
                .build()
                .unwrap(),
        );
        let result = MetricSnapshots::of(vec![counter("requests", "/a", 1.0), gauge]);
        assert_matches!(result, Err(Error::TypeConflict { .. }));
    }

    #[test]
    fn test_sorted_by_prometheus_name() {
        let snapshots = MetricSnapshots::of(vec![
            counter("zeta", "/", 1.0),
            counter("alpha.beta", "/", 1.0),
            counter("alpha", "/", 1.0),
        ])
        .unwrap();
        let names: Vec<_> = snapshots.iter().map(|s| s.prometheus_name()).collect();
        assert_eq!(names, vec!["alpha", "alpha_beta", "zeta"]);
    }
}
