//! Histogram
//!
//! Classic and native (sparse exponential) buckets, by default both:
//!
//! ```text
//!   observe(v) ──▶ read lock ──┬──▶ sum += v
//!                              ├──▶ classic[first bound >= v] += 1
//!                              └──▶ native bucket(schema, v) += 1
//!                                        │
//!                          too many buckets? ──▶ write lock ──▶ widen zero
//!                                                               bucket or
//!                                                               halve schema
//! ```
//!
//! Native bucket `i` at schema `s` covers `(base^(i-1), base^i]` with
//! `base = 2^(2^-s)`. Observers share the read lock; rescaling and collect
//! take the write lock, so a scrape sees count, sum and buckets from the
//! same instant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use super::family::Family;
use super::{metric_builder, MetricConfig};
use crate::accumulator::AtomicF64;
use crate::error::{Error, Result};
use crate::exemplars::{ExemplarSampler, ExemplarSamplerConfig};
use crate::model::{
    ClassicHistogramBuckets, Exemplars, HistogramDataPoint, Labels, MetricMetadata, MetricSnapshot,
    MetricType, NativeHistogramBuckets, NativeHistogramData, Snapshot,
};
use crate::registry::{Collector, Registry};

pub const DEFAULT_CLASSIC_UPPER_BOUNDS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// `count` bounds starting at `start`, `width` apart
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Result<Vec<f64>> {
    if count == 0 || !(width > 0.0) || !start.is_finite() {
        return Err(Error::invalid(format!(
            "linear buckets need count > 0 and width > 0, got count={} width={}",
            count, width
        )));
    }
    Ok((0..count).map(|i| start + width * i as f64).collect())
}

/// `count` bounds starting at `start`, each `factor` times the previous
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Result<Vec<f64>> {
    if count == 0 || !(start > 0.0) || !(factor > 1.0) {
        return Err(Error::invalid(format!(
            "exponential buckets need count > 0, start > 0 and factor > 1, got count={} start={} factor={}",
            count, start, factor
        )));
    }
    Ok((0..count).map(|i| start * factor.powi(i as i32)).collect())
}

// =============================================================================
// Native Histogram Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NativeHistogramConfig {
    /// Resolution to start with, in [-4, 8]; scale-down lowers it
    pub initial_schema: i32,
    /// Initial width of the zero bucket
    pub min_zero_threshold: f64,
    /// The zero bucket may grow up to this width instead of lowering the schema
    pub max_zero_threshold: f64,
    /// 0 disables scale-down
    pub max_number_of_buckets: usize,
}

impl Default for NativeHistogramConfig {
    fn default() -> Self {
        let threshold = 2f64.powi(-128);
        Self {
            initial_schema: 5,
            min_zero_threshold: threshold,
            max_zero_threshold: threshold,
            max_number_of_buckets: 160,
        }
    }
}

impl NativeHistogramConfig {
    pub fn with_max_buckets(max_number_of_buckets: usize) -> Self {
        Self {
            max_number_of_buckets,
            ..Default::default()
        }
    }

    /// Never scale down; bucket count grows with the value range
    pub fn unlimited() -> Self {
        Self::with_max_buckets(0)
    }

    pub fn validate(&self) -> Result<()> {
        if !(-4..=8).contains(&self.initial_schema) {
            return Err(Error::invalid(format!(
                "native schema {} not in [-4, 8]",
                self.initial_schema
            )));
        }
        if !(self.min_zero_threshold >= 0.0) || !(self.max_zero_threshold >= 0.0) {
            return Err(Error::invalid("native zero thresholds must be >= 0"));
        }
        if self.min_zero_threshold > self.max_zero_threshold {
            return Err(Error::invalid(format!(
                "min zero threshold {} exceeds max zero threshold {}",
                self.min_zero_threshold, self.max_zero_threshold
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Native Bucket Index Math
// =============================================================================

/// Bucket boundaries within one power of two, for schemas 1..=8.
/// Entry `s - 1` holds `2^s` fractions in [0.5, 1).
static NATIVE_BOUNDS: Lazy<Vec<Vec<f64>>> = Lazy::new(|| {
    let mut tables: Vec<Vec<f64>> = Vec::with_capacity(8);
    for schema in 1..=8i32 {
        let len = 1usize << schema;
        let base = 2f64.powf(2f64.powi(-schema));
        let mut bounds = vec![0.0; len];
        bounds[0] = 0.5;
        for i in 1..len {
            bounds[i] = if i % 2 == 0 && schema > 1 {
                // every second boundary is shared with the coarser schema
                tables[schema as usize - 2][i / 2]
            } else {
                bounds[i - 1] * base
            };
        }
        tables.push(bounds);
    }
    tables
});

/// Split a positive finite value into a fraction in [0.5, 1) and a power
/// of two
fn frexp(value: f64) -> (f64, i32) {
    if value == 0.0 || !value.is_finite() {
        return (value, 0);
    }
    let bits = value.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    if exp_bits == 0 {
        // subnormal
        let (frac, exp) = frexp(value * 2f64.powi(64));
        return (frac, exp - 64);
    }
    let frac = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
    (frac, exp_bits - 1022)
}

/// Position of `frac` in `bounds`: the match, or the first larger entry
fn find_index(bounds: &[f64], frac: f64) -> i32 {
    let mut first: i32 = 0;
    let mut last: i32 = bounds.len() as i32 - 1;
    while first <= last {
        let mid = (first + last) / 2;
        let bound = bounds[mid as usize];
        if bound == frac {
            return mid;
        } else if bound < frac {
            first = mid + 1;
        } else {
            last = mid - 1;
        }
    }
    last + 1
}

/// Bucket index for a value > 0
fn find_bucket_index(schema: i32, value: f64) -> i32 {
    if value.is_infinite() {
        return find_bucket_index(schema, f64::MAX) + 1;
    }
    let (frac, exp) = frexp(value);
    if schema >= 1 {
        let bounds = &NATIVE_BOUNDS[schema as usize - 1];
        find_index(bounds, frac) + (exp - 1) * bounds.len() as i32
    } else {
        let mut index = exp;
        if frac == 0.5 {
            index -= 1;
        }
        let offset = (1 << -schema) - 1;
        (index + offset) >> -schema
    }
}

fn calc_upper_bound(mut schema: i32, mut index: i32) -> f64 {
    let mut factor = 1.0;
    while index > 0 {
        if index % 2 == 0 {
            index /= 2;
            schema -= 1;
        } else {
            index -= 1;
            factor *= 2f64.powf(2f64.powi(-schema));
        }
    }
    factor * 2f64.powf(index as f64 * 2f64.powi(-schema))
}

/// Upper bound of native bucket `index`; the last finite bucket reports
/// `f64::MAX` instead of overflowing
pub(crate) fn native_bucket_index_to_upper_bound(schema: i32, index: i32) -> f64 {
    let bound = calc_upper_bound(schema, index);
    if bound.is_infinite() && calc_upper_bound(schema, index - 1).is_finite() {
        return f64::MAX;
    }
    bound
}

// =============================================================================
// Native Buckets
// =============================================================================

#[derive(Debug)]
struct NativeBuckets {
    schema: i32,
    zero_threshold: f64,
    zero_count: AtomicU64,
    positive: DashMap<i32, AtomicU64>,
    negative: DashMap<i32, AtomicU64>,
}

impl NativeBuckets {
    fn new(config: &NativeHistogramConfig) -> Self {
        Self {
            schema: config.initial_schema,
            zero_threshold: config.min_zero_threshold,
            zero_count: AtomicU64::new(0),
            positive: DashMap::new(),
            negative: DashMap::new(),
        }
    }

    /// Count the value; `true` if the histogram should scale down
    fn observe(&self, value: f64, config: &NativeHistogramConfig) -> bool {
        let created = if value > self.zero_threshold {
            add_to_bucket(&self.positive, find_bucket_index(self.schema, value))
        } else if value < -self.zero_threshold {
            add_to_bucket(&self.negative, find_bucket_index(self.schema, -value))
        } else {
            self.zero_count.fetch_add(1, Ordering::Relaxed);
            false
        };
        created && self.needs_scale_down(config)
    }

    fn needs_scale_down(&self, config: &NativeHistogramConfig) -> bool {
        config.max_number_of_buckets > 0
            && self.schema > -4
            && self.positive.len() + self.negative.len() > config.max_number_of_buckets
    }

    fn scale_down(&mut self, config: &NativeHistogramConfig) {
        // another observer may have scaled down already
        if !self.needs_scale_down(config) {
            return;
        }
        if !self.widen_zero_bucket(config.max_zero_threshold) {
            self.double_bucket_width();
        }
        debug!(
            schema = self.schema,
            zero_threshold = self.zero_threshold,
            buckets = self.positive.len() + self.negative.len(),
            "Scaled down native histogram"
        );
    }

    /// Merge the lowest bucket into the zero bucket if the new threshold
    /// stays within `max_zero_threshold`
    fn widen_zero_bucket(&mut self, max_zero_threshold: f64) -> bool {
        if self.zero_threshold >= max_zero_threshold {
            return false;
        }
        let smallest = self
            .positive
            .iter()
            .map(|e| *e.key())
            .chain(self.negative.iter().map(|e| *e.key()))
            .min();
        let Some(smallest) = smallest else {
            return false;
        };
        let threshold = native_bucket_index_to_upper_bound(self.schema, smallest);
        if threshold > max_zero_threshold {
            return false;
        }
        for buckets in [&self.positive, &self.negative] {
            if let Some((_, count)) = buckets.remove(&smallest) {
                self.zero_count.fetch_add(count.into_inner(), Ordering::Relaxed);
            }
        }
        self.zero_threshold = threshold;
        true
    }

    /// Lower the schema by one: bucket pairs `2k-1, 2k` merge into `k`
    fn double_bucket_width(&mut self) {
        for buckets in [&self.positive, &self.negative] {
            let old: Vec<(i32, u64)> = buckets
                .iter()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
                .collect();
            buckets.clear();
            for (index, count) in old {
                buckets
                    .entry((index + 1).div_euclid(2))
                    .or_default()
                    .fetch_add(count, Ordering::Relaxed);
            }
        }
        self.schema -= 1;
    }

    fn data(&self) -> NativeHistogramData {
        let load = |buckets: &DashMap<i32, AtomicU64>| {
            NativeHistogramBuckets::new(
                buckets
                    .iter()
                    .map(|e| (*e.key(), e.value().load(Ordering::Relaxed))),
            )
        };
        NativeHistogramData {
            schema: self.schema,
            zero_count: self.zero_count.load(Ordering::Relaxed),
            zero_threshold: self.zero_threshold,
            positive: load(&self.positive),
            negative: load(&self.negative),
        }
    }
}

/// Increment a bucket, `true` if it did not exist before
fn add_to_bucket(buckets: &DashMap<i32, AtomicU64>, index: i32) -> bool {
    if let Some(count) = buckets.get(&index) {
        count.fetch_add(1, Ordering::Relaxed);
        return false;
    }
    let mut created = false;
    buckets
        .entry(index)
        .or_insert_with(|| {
            created = true;
            AtomicU64::new(0)
        })
        .fetch_add(1, Ordering::Relaxed);
    created
}

// =============================================================================
// Histogram Cell
// =============================================================================

#[derive(Debug)]
struct HistogramState {
    classic: Vec<AtomicU64>,
    native: Option<NativeBuckets>,
    sum: AtomicF64,
}

#[derive(Debug)]
struct CellSettings {
    upper_bounds: Vec<f64>,
    native: Option<NativeHistogramConfig>,
    exemplars: Option<ExemplarSamplerConfig>,
}

#[derive(Debug)]
pub struct HistogramCell {
    settings: Arc<CellSettings>,
    state: RwLock<HistogramState>,
    exemplars: Option<ExemplarSampler>,
    created_ms: i64,
}

impl HistogramCell {
    fn new(settings: Arc<CellSettings>, config: &MetricConfig) -> Result<Self> {
        let exemplars = match &settings.exemplars {
            Some(exemplar_config) => Some(ExemplarSampler::new(
                exemplar_config.clone(),
                config.span_context.clone(),
                config.clock.clone(),
            )?),
            None => None,
        };
        let state = HistogramState {
            classic: settings.upper_bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            native: settings.native.as_ref().map(NativeBuckets::new),
            sum: AtomicF64::new(0.0),
        };
        Ok(Self {
            settings,
            state: RwLock::new(state),
            exemplars,
            created_ms: config.clock.now_millis(),
        })
    }

    /// Record a value; NaN is ignored
    pub fn observe(&self, value: f64) {
        if self.record(value) {
            if let Some(exemplars) = &self.exemplars {
                exemplars.observe(value);
            }
        }
    }

    /// Record a value with caller-supplied exemplar labels
    pub fn observe_with_exemplar(&self, value: f64, labels: Labels) {
        if self.record(value) {
            if let Some(exemplars) = &self.exemplars {
                exemplars.observe_with_exemplar(value, labels);
            }
        }
    }

    /// Run `f` and observe its duration in seconds
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.observe(start.elapsed().as_secs_f64());
        result
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        Self::count_of(&self.state.read())
    }

    pub fn sum(&self) -> f64 {
        self.state.read().sum.get()
    }

    fn count_of(state: &HistogramState) -> u64 {
        if !state.classic.is_empty() {
            state.classic.iter().map(|c| c.load(Ordering::Relaxed)).sum()
        } else {
            state.native.as_ref().map_or(0, |n| n.data().total())
        }
    }

    fn record(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let scale_down = {
            let state = self.state.read();
            state.sum.add(value);
            if !state.classic.is_empty() {
                let index = self.settings.upper_bounds.partition_point(|&b| b < value);
                state.classic[index].fetch_add(1, Ordering::Relaxed);
            }
            match (&state.native, &self.settings.native) {
                (Some(native), Some(config)) => native.observe(value, config),
                _ => false,
            }
        };
        if scale_down {
            self.scale_down();
        }
        true
    }

    fn scale_down(&self) {
        let Some(config) = &self.settings.native else {
            return;
        };
        let mut state = self.state.write();
        if let Some(native) = state.native.as_mut() {
            native.scale_down(config);
        }
    }

    fn data_point(&self, labels: Labels) -> Result<HistogramDataPoint> {
        let (classic, native, count, sum) = {
            let state = self.state.write();
            let counts: Vec<u64> = state.classic.iter().map(|c| c.load(Ordering::Relaxed)).collect();
            (
                counts,
                state.native.as_ref().map(NativeBuckets::data),
                Self::count_of(&state),
                state.sum.get(),
            )
        };
        let classic_buckets = if classic.is_empty() {
            ClassicHistogramBuckets::empty()
        } else {
            ClassicHistogramBuckets::new(self.settings.upper_bounds.clone(), classic)?
        };
        Ok(HistogramDataPoint {
            labels,
            classic_buckets,
            native,
            count: Some(count),
            sum: Some(sum),
            exemplars: self.exemplars.as_ref().map_or_else(Exemplars::empty, ExemplarSampler::collect),
            created_timestamp_millis: Some(self.created_ms),
            scrape_timestamp_millis: None,
        })
    }
}

// =============================================================================
// Histogram
// =============================================================================

#[derive(Debug)]
pub struct Histogram {
    metadata: MetricMetadata,
    family: Family<HistogramCell>,
    gauge: bool,
}

impl Histogram {
    pub fn builder(name: impl Into<String>) -> HistogramBuilder {
        HistogramBuilder {
            config: MetricConfig::new(name),
            upper_bounds: None,
            classic: true,
            native: true,
            native_config: NativeHistogramConfig::default(),
            gauge: false,
        }
    }

    pub fn labels(&self, values: &[&str]) -> Result<Arc<HistogramCell>> {
        self.family.labels(values)
    }

    pub fn remove(&self, values: &[&str]) {
        self.family.remove(values);
    }

    pub fn clear(&self) {
        self.family.clear();
    }

    pub fn observe(&self, value: f64) {
        if let Some(cell) = self.unlabeled() {
            cell.observe(value);
        }
    }

    pub fn observe_with_exemplar(&self, value: f64, labels: Labels) {
        if let Some(cell) = self.unlabeled() {
            cell.observe_with_exemplar(value, labels);
        }
    }

    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        match self.unlabeled() {
            Some(cell) => cell.time(f),
            None => f(),
        }
    }

    pub fn is_gauge_histogram(&self) -> bool {
        self.gauge
    }

    fn unlabeled(&self) -> Option<&Arc<HistogramCell>> {
        let cell = self.family.no_labels();
        if cell.is_none() {
            debug!(metric = %self.metadata.name(), "Unlabeled observation on labeled histogram ignored");
        }
        cell
    }
}

impl Collector for Histogram {
    fn collect(&self) -> Result<MetricSnapshot> {
        let points = self
            .family
            .cells()
            .into_iter()
            .map(|(labels, cell)| cell.data_point(labels))
            .collect::<Result<Vec<_>>>()?;
        let snapshot = Snapshot::new(self.metadata.clone(), points)?;
        Ok(if self.gauge {
            MetricSnapshot::GaugeHistogram(snapshot)
        } else {
            MetricSnapshot::Histogram(snapshot)
        })
    }

    fn prometheus_name(&self) -> Option<String> {
        Some(self.metadata.prometheus_name().to_string())
    }

    fn metric_type(&self) -> Option<MetricType> {
        Some(MetricType::Histogram)
    }

    fn label_names(&self) -> Option<Vec<String>> {
        Some(self.family.label_names().to_vec())
    }
}

// =============================================================================
// Builder
// =============================================================================

pub struct HistogramBuilder {
    config: MetricConfig,
    upper_bounds: Option<Vec<f64>>,
    classic: bool,
    native: bool,
    native_config: NativeHistogramConfig,
    gauge: bool,
}

metric_builder!(HistogramBuilder);

impl HistogramBuilder {
    /// Classic bucket bounds; `+Inf` is appended if missing
    pub fn classic_upper_bounds(mut self, bounds: impl IntoIterator<Item = f64>) -> Self {
        self.upper_bounds = Some(bounds.into_iter().collect());
        self
    }

    /// Only classic buckets
    pub fn classic_only(mut self) -> Self {
        self.classic = true;
        self.native = false;
        self
    }

    /// Only native buckets
    pub fn native_only(mut self) -> Self {
        self.classic = false;
        self.native = true;
        self
    }

    pub fn native_config(mut self, config: NativeHistogramConfig) -> Self {
        self.native_config = config;
        self
    }

    /// Expose as a gauge histogram
    pub fn gauge_histogram(mut self) -> Self {
        self.gauge = true;
        self
    }

    pub fn build(self) -> Result<Histogram> {
        let metadata = self.config.validate(&["le"])?;
        if self.native {
            self.native_config.validate()?;
        }

        let upper_bounds = if self.classic {
            normalize_upper_bounds(
                self.upper_bounds
                    .unwrap_or_else(|| DEFAULT_CLASSIC_UPPER_BOUNDS.to_vec()),
            )?
        } else {
            Vec::new()
        };

        let exemplars = self.config.exemplars_enabled.then(|| {
            if upper_bounds.is_empty() {
                ExemplarSamplerConfig::default()
            } else {
                ExemplarSamplerConfig::with_upper_bounds(upper_bounds.clone())
            }
        });
        let settings = Arc::new(CellSettings {
            upper_bounds,
            native: self.native.then_some(self.native_config),
            exemplars,
        });

        let config = self.config;
        let family = Family::new(
            config.label_names.clone(),
            config.const_labels.clone(),
            move || HistogramCell::new(settings.clone(), &config),
        )?;
        Ok(Histogram {
            metadata,
            family,
            gauge: self.gauge,
        })
    }

    pub fn register(self, registry: &Registry) -> Result<Arc<Histogram>> {
        let histogram = Arc::new(self.build()?);
        registry.register(histogram.clone())?;
        Ok(histogram)
    }
}

/// Sort, drop duplicates, append `+Inf`
fn normalize_upper_bounds(mut bounds: Vec<f64>) -> Result<Vec<f64>> {
    if bounds.iter().any(|b| b.is_nan()) {
        return Err(Error::invalid("histogram bucket upper bound must not be NaN"));
    }
    bounds.sort_by(f64::total_cmp);
    bounds.dedup();
    if bounds.last() != Some(&f64::INFINITY) {
        bounds.push(f64::INFINITY);
    }
    Ok(bounds)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::exemplars::StaticSpanContext;

    fn collect_point(histogram: &Histogram) -> HistogramDataPoint {
        match histogram.collect().unwrap() {
            MetricSnapshot::Histogram(s) | MetricSnapshot::GaugeHistogram(s) => s.data_points()[0].clone(),
            other => panic!("unexpected snapshot {:?}", other.metric_type()),
        }
    }

    #[test]
    fn test_bucket_helpers() {
        assert_eq!(linear_buckets(1.0, 2.0, 3).unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(exponential_buckets(1.0, 10.0, 3).unwrap(), vec![1.0, 10.0, 100.0]);
        assert!(linear_buckets(1.0, 0.0, 3).is_err());
        assert!(exponential_buckets(0.0, 2.0, 3).is_err());
    }

    #[test]
    fn test_normalize_upper_bounds() {
        assert_eq!(
            normalize_upper_bounds(vec![5.0, 1.0, 5.0]).unwrap(),
            vec![1.0, 5.0, f64::INFINITY]
        );
        assert!(normalize_upper_bounds(vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_classic_observe() {
        let histogram = Histogram::builder("latency_seconds")
            .classic_only()
            .classic_upper_bounds([1.0, 2.0])
            .build()
            .unwrap();
        for v in [0.5, 1.0, 1.5, 3.0, f64::NAN] {
            histogram.observe(v);
        }
        let point = collect_point(&histogram);
        let counts: Vec<u64> = point.classic_buckets.iter().map(|(_, c)| c).collect();
        assert_eq!(counts, vec![2, 1, 1]);
        assert_eq!(point.count, Some(4));
        assert_eq!(point.sum, Some(6.0));
        assert!(point.native.is_none());
    }

    #[test]
    fn test_default_bounds() {
        let histogram = Histogram::builder("latency_seconds").build().unwrap();
        histogram.observe(0.3);
        let point = collect_point(&histogram);
        assert_eq!(point.classic_buckets.len(), 12);
        assert!(point.has_native());
        assert_eq!(point.native.as_ref().unwrap().schema, 5);
    }

    #[test]
    fn test_reserved_le_label() {
        assert!(Histogram::builder("latency").label_names(["le"]).build().is_err());
    }

    #[test]
    fn test_native_bounds_table() {
        assert_eq!(NATIVE_BOUNDS.len(), 8);
        assert_eq!(NATIVE_BOUNDS[0].len(), 2);
        assert_eq!(NATIVE_BOUNDS[7].len(), 256);
        assert_eq!(NATIVE_BOUNDS[0][0], 0.5);
        assert!((NATIVE_BOUNDS[0][1] - 0.5 * 2f64.sqrt()).abs() < 1e-15);
        assert_eq!(NATIVE_BOUNDS[1][2], NATIVE_BOUNDS[0][1]);
    }

    #[test]
    fn test_frexp() {
        assert_eq!(frexp(1.0), (0.5, 1));
        assert_eq!(frexp(3.0), (0.75, 2));
        assert_eq!(frexp(0.1).1, -3);
        let (frac, exp) = frexp(f64::MIN_POSITIVE / 4.0);
        assert_eq!(frac, 0.5);
        assert_eq!(exp, -1023);
    }

    #[test]
    fn test_find_bucket_index() {
        assert_eq!(find_bucket_index(0, 1.0), 0);
        assert_eq!(find_bucket_index(0, 2.0), 1);
        assert_eq!(find_bucket_index(0, 3.0), 2);
        assert_eq!(find_bucket_index(0, 0.1), -3);
        assert_eq!(find_bucket_index(1, 1.0), 0);
        assert_eq!(find_bucket_index(1, 1.2), 1);
        assert_eq!(find_bucket_index(1, 1.5), 2);
        assert_eq!(find_bucket_index(-1, 1.0), 0);
        assert_eq!(find_bucket_index(-1, 3.0), 1);
        assert_eq!(
            find_bucket_index(0, f64::INFINITY),
            find_bucket_index(0, f64::MAX) + 1
        );
    }

    #[test]
    fn test_bucket_upper_bounds() {
        assert_eq!(native_bucket_index_to_upper_bound(0, 0), 1.0);
        assert_eq!(native_bucket_index_to_upper_bound(0, 2), 4.0);
        assert_eq!(native_bucket_index_to_upper_bound(0, -3), 0.125);
        assert_eq!(native_bucket_index_to_upper_bound(-1, 1), 4.0);
        assert!((native_bucket_index_to_upper_bound(1, 1) - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(native_bucket_index_to_upper_bound(0, 1024), f64::MAX);
    }

    #[test]
    fn test_value_lands_in_bucket_range() {
        for schema in -4..=8 {
            for v in [1e-9, 0.3, 1.0, 7.5, 1234.5, 1e12] {
                let index = find_bucket_index(schema, v);
                let upper = native_bucket_index_to_upper_bound(schema, index);
                let lower = native_bucket_index_to_upper_bound(schema, index - 1);
                assert!(v <= upper * (1.0 + 1e-12), "schema {} value {}", schema, v);
                assert!(v > lower * (1.0 - 1e-12), "schema {} value {}", schema, v);
            }
        }
    }

    #[test]
    fn test_native_observe() {
        let histogram = Histogram::builder("sizes")
            .native_only()
            .native_config(NativeHistogramConfig {
                initial_schema: 0,
                ..Default::default()
            })
            .build()
            .unwrap();
        for v in [0.0, 1.0, 3.0, 3.5, -2.0] {
            histogram.observe(v);
        }
        let point = collect_point(&histogram);
        let native = point.native.unwrap();
        assert_eq!(native.zero_count, 1);
        assert_eq!(native.positive.iter().collect::<Vec<_>>(), vec![(0, 1), (2, 2)]);
        assert_eq!(native.negative.iter().collect::<Vec<_>>(), vec![(1, 1)]);
        assert_eq!(point.count, Some(5));
        assert!(point.classic_buckets.is_empty());
    }

    #[test]
    fn test_scale_down_doubles_bucket_width() {
        let histogram = Histogram::builder("sizes")
            .native_only()
            .native_config(NativeHistogramConfig {
                initial_schema: 0,
                max_number_of_buckets: 2,
                ..Default::default()
            })
            .build()
            .unwrap();
        // indexes 0, 1, 2 at schema 0 become 0, 1 at schema -1
        for v in [1.0, 2.0, 4.0] {
            histogram.observe(v);
        }
        let native = collect_point(&histogram).native.unwrap();
        assert_eq!(native.schema, -1);
        assert_eq!(native.positive.iter().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_scale_down_widens_zero_bucket() {
        let histogram = Histogram::builder("sizes")
            .native_only()
            .native_config(NativeHistogramConfig {
                initial_schema: 0,
                min_zero_threshold: 0.0,
                max_zero_threshold: 0.5,
                max_number_of_buckets: 2,
            })
            .build()
            .unwrap();
        for v in [0.1, 10.0, 100.0] {
            histogram.observe(v);
        }
        let native = collect_point(&histogram).native.unwrap();
        assert_eq!(native.schema, 0);
        assert_eq!(native.zero_threshold, 0.125);
        assert_eq!(native.zero_count, 1);
        assert_eq!(native.positive.len(), 2);
    }

    #[test]
    fn test_negative_buckets_scale_down() {
        let mut buckets = NativeBuckets::new(&NativeHistogramConfig {
            initial_schema: 0,
            ..Default::default()
        });
        add_to_bucket(&buckets.negative, -2);
        add_to_bucket(&buckets.negative, -1);
        buckets.double_bucket_width();
        let data = buckets.data();
        assert_eq!(data.negative.iter().collect::<Vec<_>>(), vec![(-1, 1), (0, 1)]);
    }

    #[test]
    fn test_gauge_histogram_and_exemplars() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let histogram = Histogram::builder("queue_wait_seconds")
            .classic_upper_bounds([1.0])
            .gauge_histogram()
            .clock(clock)
            .span_context(Arc::new(StaticSpanContext::sampled("t", "s")))
            .build()
            .unwrap();
        histogram.observe(0.5);
        assert!(matches!(histogram.collect().unwrap(), MetricSnapshot::GaugeHistogram(_)));
        let point = collect_point(&histogram);
        assert_eq!(point.exemplars.len(), 1);
        assert_eq!(point.created_timestamp_millis, Some(1_000_000));
    }

    #[test]
    fn test_time() {
        let histogram = Histogram::builder("job_seconds").build().unwrap();
        let answer = histogram.time(|| 42);
        assert_eq!(answer, 42);
        assert_eq!(histogram.family.no_labels().unwrap().count(), 1);
    }
}
