//! promcore - Prometheus Client Instrumentation Core
//!
//! Instruments, quantile estimation, exemplar sampling, a scrape registry
//! and the three Prometheus exposition formats.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  application threads            │  scrape (HTTP exporter)          │
//! ├─────────────────────────────────┼──────────────────────────────────┤
//! │  Counter / Gauge / Histogram    │  Registry::scrape()              │
//! │  Summary / Info / StateSet      │     │ collect + merge by name    │
//! │     │ observe / inc / set       │     ▼                            │
//! │     ▼                           │  MetricSnapshots                 │
//! │  atomics, CKMS windows,         │     │ ExpositionFormats          │
//! │  exemplar sampler               │     ▼                            │
//! │                                 │  text / OpenMetrics / protobuf   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`accumulator`] - Lock-free numeric cells
//! - [`reservoir`] - Bucketed fixed-capacity sample reservoirs
//! - [`window`] - Sliding time-window quantiles (CKMS)
//! - [`exemplars`] - Exemplar sampling and retention
//! - [`model`] - Immutable snapshot model and naming rules
//! - [`metrics`] - Instruments and labeled families
//! - [`registry`] - Collector registration and scraping
//! - [`exposition`] - Wire formats
//! - [`exporter`] - HTTP scrape endpoint
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::new();
//! let requests = Counter::builder("requests")
//!     .help("Total requests")
//!     .label_names(["path"])
//!     .register(&registry)?;
//! requests.labels(&["/a"])?.inc();
//!
//! let snapshots = registry.scrape()?;
//! let text = ExpositionFormats::default()
//!     .text()
//!     .to_debug_string(&snapshots, EscapingScheme::default())?;
//! ```

pub mod accumulator;
pub mod clock;
pub mod error;
pub mod exemplars;
pub mod exporter;
pub mod exposition;
pub mod fence;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod reservoir;
pub mod window;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use exemplars::{SpanContext, StaticSpanContext};
pub use exporter::{ExporterConfig, ScrapeHandler};
pub use exposition::{ExpositionConfig, ExpositionFormatWriter, ExpositionFormats};
pub use metrics::{Counter, Gauge, Histogram, Info, StateSet, Summary};
pub use model::{EscapingScheme, Labels, MetricSnapshot, MetricSnapshots, Unit};
pub use registry::{Collector, MetricNameFilter, MultiCollector, Registry};
