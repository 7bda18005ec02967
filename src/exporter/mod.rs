//! Scrape Exporter
//!
//! Serves a [`Registry`](crate::registry::Registry) over HTTP with content
//! negotiation, a `debug` query parameter for human-readable output and
//! `name[]` parameters to restrict the exposed families.

pub mod config;
pub mod handler;
pub mod server;

pub use config::ExporterConfig;
pub use handler::{ScrapeHandler, ScrapeResponse, DEBUG_CONTENT_TYPE};
pub use server::{route, run_metrics_server, serve};
