//! Sliding window of rotating estimators
//!
//! ```text
//!   ring:  [ e0 ][ e1 ][ e2 ][ e3 ][ e4 ]
//!            ▲
//!            └── current: oldest epoch, answers reads, replaced next
//!
//!   insert  ──▶ every slot (each one started at a different time)
//!   rotate  ──▶ new ring with ring[current] fresh, current += 1
//! ```
//!
//! Writers hold a [`PhaseFence`] guard while touching the ring they loaded.
//! Rotation publishes a new ring and flips the fence, so once it returns
//! no writer is still inserting into the retired slot.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::fence::PhaseFence;

struct Ring<T> {
    slots: Vec<Arc<T>>,
    current: usize,
    last_rotate_ms: i64,
}

pub struct SlidingWindow<T> {
    ring: RwLock<Arc<Ring<T>>>,
    fence: PhaseFence,
    clock: Arc<dyn Clock>,
    make: Box<dyn Fn() -> T + Send + Sync>,
    period_ms: i64,
}

impl<T> std::fmt::Debug for SlidingWindow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.read();
        f.debug_struct("SlidingWindow")
            .field("slots", &ring.slots.len())
            .field("current", &ring.current)
            .field("period_ms", &self.period_ms)
            .finish()
    }
}

impl<T: Send + Sync> SlidingWindow<T> {
    /// `age_buckets` slots, each covering `max_age_ms / age_buckets`
    pub fn new<F>(make: F, max_age_ms: i64, age_buckets: usize, clock: Arc<dyn Clock>) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        if max_age_ms <= 0 {
            return Err(Error::invalid(format!(
                "max age must be > 0, got {} ms",
                max_age_ms
            )));
        }
        if age_buckets == 0 {
            return Err(Error::invalid("age buckets must be > 0"));
        }

        let period_ms = (max_age_ms / age_buckets as i64).max(1);
        let slots = (0..age_buckets).map(|_| Arc::new(make())).collect();
        let ring = Ring {
            slots,
            current: 0,
            last_rotate_ms: clock.now_millis(),
        };

        Ok(Self {
            ring: RwLock::new(Arc::new(ring)),
            fence: PhaseFence::new(),
            clock,
            make: Box::new(make),
            period_ms,
        })
    }

    pub fn period_ms(&self) -> i64 {
        self.period_ms
    }

    /// Slot answering reads right now
    pub fn current(&self) -> Arc<T> {
        self.rotate();
        let ring = self.ring.read().clone();
        ring.slots[ring.current].clone()
    }

    /// Apply `insert` to every slot
    pub fn observe<F>(&self, insert: F)
    where
        F: Fn(&T),
    {
        self.rotate();
        let _guard = self.fence.enter();
        let ring = self.ring.read().clone();
        for slot in &ring.slots {
            insert(slot);
        }
    }

    fn rotate(&self) {
        let now = self.clock.now_millis();
        if now - self.ring.read().last_rotate_ms <= self.period_ms {
            return;
        }

        let reader = self.fence.reader_lock();
        let old = self.ring.read().clone();
        let elapsed = now - old.last_rotate_ms;
        if elapsed <= self.period_ms {
            // someone else rotated while we waited
            return;
        }

        let len = old.slots.len();
        let rotations = ((elapsed - 1) / self.period_ms) as usize;
        let mut slots = old.slots.clone();
        let mut current = old.current;
        for _ in 0..rotations.min(len) {
            slots[current] = Arc::new((self.make)());
            current = (current + 1) % len;
        }
        if rotations > len {
            current = (old.current + rotations) % len;
        }

        trace!(rotations, current, "Rotating sliding window");

        *self.ring.write() = Arc::new(Ring {
            slots,
            current,
            last_rotate_ms: old.last_rotate_ms + rotations as i64 * self.period_ms,
        });
        self.fence.flip_phase(&reader);
    }
}

// =============================================================================
// Tests
// =============================================================================
