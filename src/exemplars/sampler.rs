//! Slot-based exemplar sampler used by histograms and summaries
//!
//! ```text
//!   observe(v) ──▶ NaN? ──▶ before next_accept? ──▶ claim ──▶ pick slot
//!                   │              │                              │
//!                  drop           drop               store exemplar, set
//!                                                    next_accept = now + wait
//! ```
//!
//! The hot path is one clock read and one atomic load. A successful claim
//! parks further sampling until `next_accept`, which replaces a scheduler.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::span::SpanContext;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::exemplar::{Exemplar, Exemplars, SPAN_ID, TRACE_ID};
use crate::model::labels::Labels;

/// Slots for histograms without classic buckets and for summaries
pub const DEFAULT_NUMBER_OF_EXEMPLARS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ExemplarSamplerConfig {
    /// An exemplar is never replaced before it is this old
    pub min_retention_period: Duration,
    /// Exemplars older than this are dropped
    pub max_retention_period: Duration,
    /// Pause after a sampling attempt that did not store anything
    pub sample_interval: Duration,
    pub number_of_exemplars: usize,
    /// Classic bucket bounds, one slot per bucket
    pub histogram_upper_bounds: Option<Vec<f64>>,
}

impl Default for ExemplarSamplerConfig {
    fn default() -> Self {
        Self {
            min_retention_period: Duration::from_secs(7),
            max_retention_period: Duration::from_secs(70),
            sample_interval: Duration::from_millis(90),
            number_of_exemplars: DEFAULT_NUMBER_OF_EXEMPLARS,
            histogram_upper_bounds: None,
        }
    }
}

impl ExemplarSamplerConfig {
    /// One slot, as used by counters
    pub fn single() -> Self {
        Self {
            number_of_exemplars: 1,
            ..Default::default()
        }
    }

    pub fn with_slots(number_of_exemplars: usize) -> Self {
        Self {
            number_of_exemplars,
            ..Default::default()
        }
    }

    /// One slot per classic bucket
    pub fn with_upper_bounds(upper_bounds: Vec<f64>) -> Self {
        Self {
            number_of_exemplars: upper_bounds.len(),
            histogram_upper_bounds: Some(upper_bounds),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_retention_period > self.max_retention_period {
            return Err(Error::invalid(format!(
                "min retention {:?} exceeds max retention {:?}",
                self.min_retention_period, self.max_retention_period
            )));
        }
        if self.number_of_exemplars == 0 {
            return Err(Error::invalid("number of exemplars must be > 0"));
        }
        if let Some(bounds) = &self.histogram_upper_bounds {
            if bounds.last() != Some(&f64::INFINITY) {
                return Err(Error::invalid("histogram upper bounds must end with +Inf"));
            }
            if bounds.len() != self.number_of_exemplars {
                return Err(Error::invalid(
                    "number of exemplars must equal the number of histogram buckets",
                ));
            }
        }
        Ok(())
    }
}

/// Slot array plus its rate limit
#[derive(Debug)]
struct Slots {
    exemplars: Mutex<Vec<Option<Exemplar>>>,
    next_accept_ms: AtomicI64,
}

impl Slots {
    fn new(len: usize) -> Self {
        Self {
            exemplars: Mutex::new(vec![None; len]),
            next_accept_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Claim the right to sample. Losers and early callers get false.
    fn try_claim(&self, now: i64) -> bool {
        let next = self.next_accept_ms.load(Ordering::Acquire);
        if now < next {
            return false;
        }
        self.next_accept_ms
            .compare_exchange(next, i64::MAX, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    fn release(&self, next_accept_ms: i64) {
        self.next_accept_ms.store(next_accept_ms, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct ExemplarSampler {
    config: ExemplarSamplerConfig,
    sampled: Slots,
    custom: Slots,
    span_context: Arc<dyn SpanContext>,
    clock: Arc<dyn Clock>,
    min_retention_ms: i64,
    max_retention_ms: i64,
    sample_interval_ms: i64,
}

impl ExemplarSampler {
    pub fn new(
        config: ExemplarSamplerConfig,
        span_context: Arc<dyn SpanContext>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let slots = config.number_of_exemplars;
        Ok(Self {
            min_retention_ms: config.min_retention_period.as_millis() as i64,
            max_retention_ms: config.max_retention_period.as_millis() as i64,
            sample_interval_ms: config.sample_interval.as_millis() as i64,
            config,
            sampled: Slots::new(slots),
            custom: Slots::new(slots),
            span_context,
            clock,
        })
    }

    pub fn config(&self) -> &ExemplarSamplerConfig {
        &self.config
    }

    /// Offer an observation; keeps it if the current span is sampled
    pub fn observe(&self, value: f64) {
        if value.is_nan() || !self.span_context.is_current_span_sampled() {
            return;
        }
        let now = self.clock.now_millis();
        if !self.sampled.try_claim(now) {
            return;
        }
        let stored = {
            let mut slots = self.sampled.exemplars.lock();
            match self.select_slot(&mut slots, value, now) {
                Some(index) => self.store_traced(&mut slots, index, value, now),
                None => false,
            }
        };
        self.sampled.release(self.next_accept(&self.sampled, stored, now));
    }

    /// Offer an observation with caller-supplied exemplar labels
    pub fn observe_with_exemplar(&self, value: f64, labels: Labels) {
        if value.is_nan() {
            return;
        }
        let now = self.clock.now_millis();
        if !self.custom.try_claim(now) {
            return;
        }
        let stored = {
            let mut slots = self.custom.exemplars.lock();
            match self.select_custom_slot(&mut slots, value, now) {
                Some(index) => self.store_custom(&mut slots, index, value, labels, now),
                None => false,
            }
        };
        self.custom.release(self.next_accept(&self.custom, stored, now));
    }

    /// Exemplars still within max retention; custom ones come first
    pub fn collect(&self) -> Exemplars {
        let now = self.clock.now_millis();
        let limit = self.config.number_of_exemplars;
        let mut result = Vec::with_capacity(limit);

        for slots in [&self.custom, &self.sampled] {
            let mut exemplars = slots.exemplars.lock();
            for slot in exemplars.iter_mut() {
                if result.len() >= limit {
                    break;
                }
                if let Some(exemplar) = slot {
                    if self.age(exemplar, now) > self.max_retention_ms {
                        *slot = None;
                    } else {
                        result.push(exemplar.clone());
                    }
                }
            }
        }
        Exemplars::of(result)
    }

    pub fn reset(&self) {
        for slots in [&self.custom, &self.sampled] {
            slots.exemplars.lock().iter_mut().for_each(|s| *s = None);
        }
    }

    fn age(&self, exemplar: &Exemplar, now: i64) -> i64 {
        now - exemplar.timestamp_millis().unwrap_or(i64::MIN / 2)
    }

    fn replaceable(&self, slot: &Option<Exemplar>, now: i64) -> bool {
        match slot {
            None => true,
            Some(e) => self.age(e, now) > self.min_retention_ms,
        }
    }

    fn bucket_slot(&self, slots: &[Option<Exemplar>], value: f64, now: i64) -> Option<usize> {
        let bounds = self.config.histogram_upper_bounds.as_ref()?;
        let index = bounds.iter().position(|&upper| value <= upper)?;
        self.replaceable(&slots[index], now).then_some(index)
    }

    fn select_slot(&self, slots: &mut [Option<Exemplar>], value: f64, now: i64) -> Option<usize> {
        if slots.len() == 1 {
            return self.replaceable(&slots[0], now).then_some(0);
        }
        if self.config.histogram_upper_bounds.is_some() {
            return self.bucket_slot(slots, value, now);
        }

        let mut empty = None;
        let mut smallest: Option<usize> = None;
        let mut largest: Option<usize> = None;
        for i in (0..slots.len()).rev() {
            let expired = match &slots[i] {
                None => true,
                Some(e) => self.age(e, now) > self.max_retention_ms,
            };
            if expired {
                slots[i] = None;
                empty = Some(i);
                continue;
            }
            let v = slots[i].as_ref().map_or(f64::NAN, Exemplar::value);
            if smallest.map_or(true, |s| v < slot_value(slots, s)) {
                smallest = Some(i);
            }
            if largest.map_or(true, |l| v > slot_value(slots, l)) {
                largest = Some(i);
            }
        }
        if empty.is_some() {
            return empty;
        }

        let (smallest, largest) = (smallest?, largest?);
        if self.replaceable(&slots[smallest], now) && value < slot_value(slots, smallest) {
            return Some(smallest);
        }
        if self.replaceable(&slots[largest], now) && value > slot_value(slots, largest) {
            return Some(largest);
        }

        // otherwise the oldest slot that holds neither extreme
        let oldest = (0..slots.len())
            .filter(|&i| i != smallest && i != largest)
            .min_by_key(|&i| slots[i].as_ref().and_then(Exemplar::timestamp_millis))?;
        self.replaceable(&slots[oldest], now).then_some(oldest)
    }

    fn select_custom_slot(&self, slots: &mut [Option<Exemplar>], value: f64, now: i64) -> Option<usize> {
        if slots.len() == 1 {
            return self.replaceable(&slots[0], now).then_some(0);
        }
        if self.config.histogram_upper_bounds.is_some() {
            return self.bucket_slot(slots, value, now);
        }

        let mut empty = None;
        let mut oldest: Option<usize> = None;
        for i in (0..slots.len()).rev() {
            let expired = match &slots[i] {
                None => true,
                Some(e) => self.age(e, now) > self.max_retention_ms,
            };
            if expired {
                slots[i] = None;
                empty = Some(i);
            } else if oldest.map_or(true, |o| slot_timestamp(slots, i) < slot_timestamp(slots, o)) {
                oldest = Some(i);
            }
        }
        if empty.is_some() {
            return empty;
        }
        oldest.filter(|&o| self.replaceable(&slots[o], now))
    }

    fn trace_labels(&self) -> Option<Labels> {
        let ctx = &self.span_context;
        if !ctx.is_current_span_sampled() {
            return None;
        }
        let trace_id = ctx.current_trace_id().filter(|t| !t.is_empty())?;
        let span_id = ctx.current_span_id().filter(|s| !s.is_empty())?;
        let labels = Labels::of([(TRACE_ID, trace_id), (SPAN_ID, span_id)]).ok()?;
        ctx.mark_current_span_as_exemplar();
        Some(labels)
    }

    fn store_traced(&self, slots: &mut [Option<Exemplar>], index: usize, value: f64, now: i64) -> bool {
        let Some(labels) = self.trace_labels() else {
            return false;
        };
        match Exemplar::new(value, labels, Some(now)) {
            Ok(exemplar) => {
                slots[index] = Some(exemplar);
                true
            }
            Err(e) => {
                trace!(error = %e, "Dropping exemplar");
                false
            }
        }
    }

    fn store_custom(
        &self,
        slots: &mut [Option<Exemplar>],
        index: usize,
        value: f64,
        labels: Labels,
        now: i64,
    ) -> bool {
        let labels = if labels.contains(TRACE_ID) || labels.contains(SPAN_ID) {
            labels
        } else {
            match self.trace_labels() {
                Some(trace) => labels.merge(&trace).unwrap_or(labels),
                None => labels,
            }
        };
        match Exemplar::new(value, labels, Some(now)) {
            Ok(exemplar) => {
                slots[index] = Some(exemplar);
                true
            }
            Err(e) => {
                trace!(error = %e, "Dropping custom exemplar");
                false
            }
        }
    }

    /// Earliest time the next sampling attempt is useful
    fn next_accept(&self, slots: &Slots, stored: bool, now: i64) -> i64 {
        if !stored {
            return now + self.sample_interval_ms;
        }
        let exemplars = slots.exemplars.lock();
        let mut oldest = now;
        for slot in exemplars.iter() {
            match slot.as_ref().and_then(Exemplar::timestamp_millis) {
                None => return now + self.sample_interval_ms,
                Some(ts) => oldest = oldest.min(ts),
            }
        }
        let oldest_age = now - oldest;
        if oldest_age < self.min_retention_ms {
            now + self.min_retention_ms - oldest_age
        } else {
            now + self.sample_interval_ms
        }
    }
}

fn slot_value(slots: &[Option<Exemplar>], index: usize) -> f64 {
    slots[index].as_ref().map_or(f64::NAN, Exemplar::value)
}

fn slot_timestamp(slots: &[Option<Exemplar>], index: usize) -> Option<i64> {
    slots[index].as_ref().and_then(Exemplar::timestamp_millis)
}

// =============================================================================
// Tests
// =============================================================================
