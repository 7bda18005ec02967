//! Metric Snapshot Model
//!
//! Immutable values produced by collectors at scrape time and consumed by
//! the exposition writers. Nothing here is shared with the hot path; every
//! scrape builds fresh snapshots.

pub mod exemplar;
pub mod labels;
pub mod metadata;
pub mod naming;
pub mod snapshot;

pub use exemplar::{Exemplar, ExemplarBuilder, Exemplars, SPAN_ID, TRACE_ID};
pub use labels::Labels;
pub use metadata::{MetricMetadata, MetricType, Unit};
pub use naming::EscapingScheme;
pub use snapshot::{
    ClassicHistogramBuckets, CounterDataPoint, CounterSnapshot, DataPoint, GaugeDataPoint,
    GaugeSnapshot, HistogramDataPoint, HistogramSnapshot, InfoDataPoint, InfoSnapshot,
    MetricSnapshot, MetricSnapshots, MetricSnapshotsBuilder, NativeHistogramBuckets,
    NativeHistogramData, QuantileValue, Quantiles, Snapshot, SnapshotBuilder, State,
    StateSetDataPoint, StateSetSnapshot, SummaryDataPoint, SummarySnapshot, UnknownDataPoint,
    UnknownSnapshot,
};
