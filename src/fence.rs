//! Writer/Reader Phase Fence
//!
//! A phaser in the style of HdrHistogram's `WriterReaderPhaser`:
//!
//! ```text
//!   writers:   enter() ──▶ critical section ──▶ guard dropped (exit)
//!   reader:    lock() ──▶ swap structure ──▶ flip_phase() ──▶ unlock
//!                                              │
//!                                              └─ waits until every writer
//!                                                 that entered before the
//!                                                 flip has exited
//! ```
//!
//! Writers never block. A flip only waits for writers of the previous
//! phase; writers arriving after the flip proceed immediately against the
//! new structure.

use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam::utils::{Backoff, CachePadded};
use parking_lot::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct PhaseFence {
    start_epoch: CachePadded<AtomicI64>,
    even_end_epoch: CachePadded<AtomicI64>,
    odd_end_epoch: CachePadded<AtomicI64>,
    reader_lock: Mutex<()>,
}

impl Default for PhaseFence {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a writer critical section; exits on drop
#[must_use]
pub struct WriterGuard<'a> {
    fence: &'a PhaseFence,
    epoch: i64,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        if self.epoch < 0 {
            self.fence.odd_end_epoch.fetch_add(1, Ordering::AcqRel);
        } else {
            self.fence.even_end_epoch.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl PhaseFence {
    pub fn new() -> Self {
        Self {
            start_epoch: CachePadded::new(AtomicI64::new(0)),
            even_end_epoch: CachePadded::new(AtomicI64::new(0)),
            odd_end_epoch: CachePadded::new(AtomicI64::new(i64::MIN)),
            reader_lock: Mutex::new(()),
        }
    }

    /// Enter a writer critical section. Wait-free.
    pub fn enter(&self) -> WriterGuard<'_> {
        let epoch = self.start_epoch.fetch_add(1, Ordering::AcqRel);
        WriterGuard { fence: self, epoch }
    }

    /// Serialize readers. A flip must happen while this lock is held.
    pub fn reader_lock(&self) -> MutexGuard<'_, ()> {
        self.reader_lock.lock()
    }

    /// Flip the phase and wait for writers of the previous phase to drain.
    ///
    /// Callers hold the guard returned by [`PhaseFence::reader_lock`].
    pub fn flip_phase(&self, _reader: &MutexGuard<'_, ()>) {
        let next_phase_is_even = self.start_epoch.load(Ordering::Acquire) < 0;

        let initial_start = if next_phase_is_even { 0 } else { i64::MIN };
        if next_phase_is_even {
            self.even_end_epoch.store(initial_start, Ordering::Release);
        } else {
            self.odd_end_epoch.store(initial_start, Ordering::Release);
        }

        let start_at_flip = self.start_epoch.swap(initial_start, Ordering::AcqRel);

        let backoff = Backoff::new();
        loop {
            let end = if next_phase_is_even {
                self.odd_end_epoch.load(Ordering::Acquire)
            } else {
                self.even_end_epoch.load(Ordering::Acquire)
            };
            if end == start_at_flip {
                break;
            }
            backoff.snooze();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_flip_without_writers() {
        let fence = PhaseFence::new();
        let reader = fence.reader_lock();
        fence.flip_phase(&reader);
        fence.flip_phase(&reader);
    }

    #[test]
    fn test_flip_after_writers_exit() {
        let fence = PhaseFence::new();
        {
            let _a = fence.enter();
            let _b = fence.enter();
        }
        let reader = fence.reader_lock();
        fence.flip_phase(&reader);

        // writers in the new phase do not block the next flip once gone
        drop(fence.enter());
        fence.flip_phase(&reader);
    }

    #[test]
    fn test_flip_waits_for_in_flight_writer() {
        let fence = Arc::new(PhaseFence::new());
        let released = Arc::new(AtomicBool::new(false));

        let writer = {
            let fence = fence.clone();
            let released = released.clone();
            let (tx, rx) = std::sync::mpsc::channel();
            let handle = thread::spawn(move || {
                let _guard = fence.enter();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                released.store(true, Ordering::SeqCst);
            });
            rx.recv().unwrap();
            handle
        };

        let reader = fence.reader_lock();
        fence.flip_phase(&reader);
        assert!(released.load(Ordering::SeqCst));
        writer.join().unwrap();
    }
}
