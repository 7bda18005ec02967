//! Access to the active tracing span

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Source of trace and span ids for exemplar labels
pub trait SpanContext: Send + Sync + std::fmt::Debug {
    fn current_trace_id(&self) -> Option<String>;

    fn current_span_id(&self) -> Option<String>;

    fn is_current_span_sampled(&self) -> bool;

    /// Called when the current span was attached to an exemplar
    fn mark_current_span_as_exemplar(&self) {}
}

/// No tracer: never produces exemplars from observations
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpanContext;

impl SpanContext for NoopSpanContext {
    fn current_trace_id(&self) -> Option<String> {
        None
    }

    fn current_span_id(&self) -> Option<String> {
        None
    }

    fn is_current_span_sampled(&self) -> bool {
        false
    }
}

/// Span context with explicitly set ids.
///
/// Stands in for a tracer bridge in tests and in the exporter's demo load.
#[derive(Debug, Default)]
pub struct StaticSpanContext {
    current: RwLock<Option<(String, String)>>,
    sampled: RwLock<bool>,
    marked: AtomicU64,
}

impl StaticSpanContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sampled span with the given ids
    pub fn sampled(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        let ctx = Self::new();
        ctx.set(trace_id, span_id, true);
        ctx
    }

    pub fn set(&self, trace_id: impl Into<String>, span_id: impl Into<String>, sampled: bool) {
        *self.current.write() = Some((trace_id.into(), span_id.into()));
        *self.sampled.write() = sampled;
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }

    /// How often the current span was used for an exemplar
    pub fn marked_count(&self) -> u64 {
        self.marked.load(Ordering::Relaxed)
    }
}

impl SpanContext for StaticSpanContext {
    fn current_trace_id(&self) -> Option<String> {
        self.current.read().as_ref().map(|(t, _)| t.clone())
    }

    fn current_span_id(&self) -> Option<String> {
        self.current.read().as_ref().map(|(_, s)| s.clone())
    }

    fn is_current_span_sampled(&self) -> bool {
        self.current.read().is_some() && *self.sampled.read()
    }

    fn mark_current_span_as_exemplar(&self) {
        self.marked.fetch_add(1, Ordering::Relaxed);
    }
}
