//! Atomic Accumulators
//!
//! Lock-free numeric cells shared between application threads and the
//! scrape thread. Floating point values are stored as their IEEE-754 bit
//! pattern in an [`AtomicU64`] and updated with compare-and-swap loops.
//!
//! Each cell is linearizable on its own. Reading two cells gives no
//! guarantee that both reflect the same instant.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Lock-free `f64` cell
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AtomicF64 {
    /// Create a new cell holding `value`
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Current value
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Overwrite the value
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Overwrite the value, returning the previous one
    pub fn swap(&self, value: f64) -> f64 {
        f64::from_bits(self.bits.swap(value.to_bits(), Ordering::AcqRel))
    }

    /// Add `delta` and return the new value
    pub fn add(&self, delta: f64) -> f64 {
        self.update(|current| current + delta)
    }

    /// Raise the value to `candidate` if it is larger. NaN never wins.
    pub fn max(&self, candidate: f64) -> f64 {
        self.update(|current| {
            if candidate > current || current.is_nan() {
                candidate
            } else {
                current
            }
        })
    }

    /// Lower the value to `candidate` if it is smaller. NaN never wins.
    pub fn min(&self, candidate: f64) -> f64 {
        self.update(|current| {
            if candidate < current || current.is_nan() {
                candidate
            } else {
                current
            }
        })
    }

    fn update(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = f(f64::from_bits(current));
            match self.bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Monotonic `u64` counter padded to its own cache line
#[derive(Debug, Default)]
pub struct AtomicCount {
    value: CachePadded<AtomicU64>,
}

impl AtomicCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by n
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Reset to zero
    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }
}

// =============================================================================
// Tests
// =============================================================================
