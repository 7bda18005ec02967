//! Single-exemplar retention for counters
//!
//! A counter keeps at most one exemplar. It is replaced when the previous
//! one is missing, has no timestamp, or is older than the retention
//! interval, and only if a sampled span provides trace and span ids.

use std::sync::Arc;

use super::span::SpanContext;
use crate::clock::Clock;
use crate::model::exemplar::Exemplar;

/// Prime, so retention rarely lines up with a scrape interval
pub const MIN_RETENTION_INTERVAL_MS: i64 = 7109;

#[derive(Debug, Clone)]
pub struct DefaultExemplarSampler {
    span_context: Arc<dyn SpanContext>,
    clock: Arc<dyn Clock>,
}

impl DefaultExemplarSampler {
    pub fn new(span_context: Arc<dyn SpanContext>, clock: Arc<dyn Clock>) -> Self {
        Self {
            span_context,
            clock,
        }
    }

    /// `true` if `previous` may be replaced at `now_ms`. No allocation.
    pub fn may_replace(previous: Option<&Exemplar>, now_ms: i64) -> bool {
        match previous.and_then(Exemplar::timestamp_millis) {
            None => true,
            Some(ts) => now_ms - ts > MIN_RETENTION_INTERVAL_MS,
        }
    }

    /// New exemplar for a counter or gauge value, `None` keeps `previous`
    pub fn sample(&self, value: f64, previous: Option<&Exemplar>) -> Option<Exemplar> {
        let now = self.clock.now_millis();
        if !Self::may_replace(previous, now) {
            return None;
        }
        self.exemplar_at(value, now)
    }

    /// Same rule for histogram buckets; the bucket range is not used
    pub fn sample_in_bucket(
        &self,
        value: f64,
        _bucket_from: f64,
        _bucket_to: f64,
        previous: Option<&Exemplar>,
    ) -> Option<Exemplar> {
        self.sample(value, previous)
    }

    fn exemplar_at(&self, value: f64, now: i64) -> Option<Exemplar> {
        let ctx = &self.span_context;
        if !ctx.is_current_span_sampled() {
            return None;
        }
        let trace_id = ctx.current_trace_id().filter(|t| !t.is_empty())?;
        let span_id = ctx.current_span_id().filter(|s| !s.is_empty())?;
        let exemplar = Exemplar::builder()
            .value(value)
            .trace_id(trace_id)
            .span_id(span_id)
            .timestamp_millis(now)
            .build()
            .ok()?;
        ctx.mark_current_span_as_exemplar();
        Some(exemplar)
    }
}

// =============================================================================
// Tests
// =============================================================================
