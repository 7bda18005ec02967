//! Targeted-quantile stream estimator
//!
//! Cormode, Korn, Muthukrishnan, Srivastava: "Effective Computation of
//! Biased Quantiles over Data Streams". Each sample keeps `g` (rank gap to
//! its predecessor) and `delta` (rank uncertainty); compression merges
//! neighbours while the error bound for every targeted quantile holds.

use crate::error::{Error, Result};

const COMPRESS_INTERVAL: usize = 128;

/// Quantile with its allowed rank error
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    pub quantile: f64,
    pub epsilon: f64,
    u: f64,
    v: f64,
}

impl Quantile {
    pub fn new(quantile: f64, epsilon: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(Error::InvalidQuantile(quantile));
        }
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(Error::InvalidQuantileError(epsilon));
        }
        Ok(Self {
            quantile,
            epsilon,
            u: 2.0 * epsilon / (1.0 - quantile),
            v: 2.0 * epsilon / quantile,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    g: i64,
    delta: i64,
}

#[derive(Debug, Clone)]
pub struct CkmsQuantiles {
    quantiles: Vec<Quantile>,
    n: i64,
    samples: Vec<Sample>,
    buffer: Vec<f64>,
    inserts_since_compress: usize,
}

impl CkmsQuantiles {
    pub fn new(quantiles: Vec<Quantile>) -> Result<Self> {
        if quantiles.is_empty() {
            return Err(Error::invalid("quantiles cannot be empty"));
        }
        Ok(Self {
            quantiles,
            n: 0,
            samples: Vec::new(),
            buffer: Vec::with_capacity(COMPRESS_INTERVAL),
            inserts_since_compress: 0,
        })
    }

    pub fn quantiles(&self) -> &[Quantile] {
        &self.quantiles
    }

    /// Number of values inserted, including the pending buffer
    pub fn count(&self) -> u64 {
        (self.n as u64) + self.buffer.len() as u64
    }

    pub fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        if self.buffer.len() == COMPRESS_INTERVAL {
            self.flush();
        }

        self.inserts_since_compress += 1;
        if self.inserts_since_compress == COMPRESS_INTERVAL {
            self.compress();
            self.inserts_since_compress = 0;
        }
    }

    /// Current estimate for `q`. NaN when nothing was inserted.
    pub fn get(&mut self, q: f64) -> f64 {
        self.flush();

        let (first, last) = match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => (first.value, last.value),
            _ => return f64::NAN,
        };
        if q == 0.0 {
            return first;
        }
        if q == 1.0 {
            return last;
        }

        let desired_rank = (q * self.n as f64).ceil() as i64;
        let upper_bound = desired_rank + self.f(desired_rank) / 2;

        let mut r = 0i64;
        for (i, sample) in self.samples.iter().enumerate() {
            if r + sample.g + sample.delta > upper_bound {
                return if i > 0 {
                    self.samples[i - 1].value
                } else {
                    sample.value
                };
            }
            r += sample.g;
        }
        last
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut sorted = std::mem::take(&mut self.buffer);
        sorted.sort_by(f64::total_cmp);
        self.insert_batch(&sorted);
        sorted.clear();
        self.buffer = sorted;
    }

    fn insert_batch(&mut self, sorted: &[f64]) {
        let existing = std::mem::take(&mut self.samples);
        let mut merged = Vec::with_capacity(existing.len() + sorted.len());

        let mut i = 0;
        let mut r = 0i64;
        for item in existing {
            while i < sorted.len() && sorted[i] <= item.value {
                // a new minimum is known exactly
                let delta = if merged.is_empty() { 0 } else { self.f(r) - 1 };
                merged.push(Sample {
                    value: sorted[i],
                    g: 1,
                    delta,
                });
                r += 1;
                i += 1;
                self.n += 1;
            }
            r += item.g;
            merged.push(item);
        }
        for &value in &sorted[i..] {
            merged.push(Sample {
                value,
                g: 1,
                delta: 0,
            });
            self.n += 1;
        }
        self.samples = merged;
    }

    /// Allowed rank gap at rank `r`
    fn f(&self, r: i64) -> i64 {
        let n = self.n as f64;
        let r_f = r as f64;
        let mut min_result = i64::MAX;
        for q in &self.quantiles {
            if q.quantile == 0.0 || q.quantile == 1.0 {
                continue;
            }
            // nudge before truncation, 12 must not become 11.999999
            let result = if r_f >= q.quantile * n {
                (q.v * r_f + 0.000_000_000_01) as i64
            } else {
                (q.u * (n - r_f) + 0.000_000_000_01) as i64
            };
            min_result = min_result.min(result);
        }
        min_result.max(1)
    }

    fn compress(&mut self) {
        if self.samples.len() < 3 {
            return;
        }

        // walk right to left, merging into the last kept sample
        let samples = std::mem::take(&mut self.samples);
        let mut kept: Vec<Sample> = Vec::with_capacity(samples.len());
        let (rest, last) = samples.split_at(samples.len() - 1);
        let mut r = self.n - last[0].g;
        kept.push(last[0]);

        for (left, &l) in rest.iter().enumerate().rev() {
            r -= l.g;
            // the minimum is never merged
            if left == 0 {
                kept.push(l);
                break;
            }
            let threshold = self.f(r);
            match kept.last_mut() {
                Some(right) if l.g.saturating_add(right.g).saturating_add(right.delta) < threshold => {
                    right.g += l.g;
                }
                _ => kept.push(l),
            }
        }

        kept.reverse();
        self.samples = kept;
    }
}

// =============================================================================
// Tests
// =============================================================================
