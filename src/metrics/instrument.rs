//! Call decorators
//!
//! Wrap a fallible operation and record it against a labeled instrument.
//! The instrument's last label must be [`OUTCOME_LABEL`]; its value is
//! filled in from the operation's result.
//!
//! ```ignore
//! let latency = Histogram::builder("db_query_seconds")
//!     .label_names(["table", OUTCOME_LABEL])
//!     .register(&registry)?;
//! let rows = instrument::timed(&latency, &["users"], || db.query("..."))?;
//! ```

use std::time::Instant;

use tracing::debug;

use super::counter::Counter;
use super::histogram::Histogram;

pub const OUTCOME_LABEL: &str = "outcome";
pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";

fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        SUCCESS
    } else {
        FAILURE
    }
}

fn with_outcome<'a>(labels: &[&'a str], outcome: &'a str) -> Vec<&'a str> {
    let mut values = labels.to_vec();
    values.push(outcome);
    values
}

/// Run `op` and observe its duration in seconds
pub fn timed<T, E, F>(histogram: &Histogram, labels: &[&str], op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let result = op();
    let elapsed = start.elapsed().as_secs_f64();
    match histogram.labels(&with_outcome(labels, outcome(&result))) {
        Ok(cell) => cell.observe(elapsed),
        Err(e) => debug!(error = %e, "Timed call not recorded"),
    }
    result
}

/// Run `op` and count the call
pub fn counted<T, E, F>(counter: &Counter, labels: &[&str], op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let result = op();
    match counter.labels(&with_outcome(labels, outcome(&result))) {
        Ok(cell) => cell.inc(),
        Err(e) => debug!(error = %e, "Counted call not recorded"),
    }
    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counted_records_outcome() {
        let counter = Counter::builder("calls")
            .label_names(["method", OUTCOME_LABEL])
            .build()
            .unwrap();
        let ok: Result<u32, String> = counted(&counter, &["get"], || Ok(1));
        let err: Result<u32, String> = counted(&counter, &["get"], || Err("boom".to_string()));
        assert_eq!(ok, Ok(1));
        assert!(err.is_err());
        assert_eq!(counter.labels(&["get", SUCCESS]).unwrap().get(), 1.0);
        assert_eq!(counter.labels(&["get", FAILURE]).unwrap().get(), 1.0);
    }

    #[test]
    fn test_timed_records_duration() {
        let histogram = Histogram::builder("call_seconds")
            .label_names([OUTCOME_LABEL])
            .build()
            .unwrap();
        let result: Result<(), ()> = timed(&histogram, &[], || Ok(()));
        assert!(result.is_ok());
        assert_eq!(histogram.labels(&[SUCCESS]).unwrap().count(), 1);
    }

    #[test]
    fn test_wrong_arity_still_returns_result() {
        let counter = Counter::builder("calls").build().unwrap();
        let result: Result<u32, ()> = counted(&counter, &["extra"], || Ok(7));
        assert_eq!(result, Ok(7));
        assert_eq!(counter.get(), 0.0);
    }
}
