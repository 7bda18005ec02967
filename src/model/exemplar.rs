//! Exemplars: sampled observations linked to a trace

use super::labels::Labels;
use crate::error::{Error, Result};

pub const TRACE_ID: &str = "trace_id";
pub const SPAN_ID: &str = "span_id";

/// Combined length of exemplar label names and values
pub const MAX_LABELS_CHARS: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    value: f64,
    labels: Labels,
    timestamp_millis: Option<i64>,
}

impl Exemplar {
    pub fn new(value: f64, labels: Labels, timestamp_millis: Option<i64>) -> Result<Self> {
        let length = labels.char_count();
        if length > MAX_LABELS_CHARS {
            return Err(Error::ExemplarLabelsTooLong {
                length,
                max: MAX_LABELS_CHARS,
            });
        }
        Ok(Self {
            value,
            labels,
            timestamp_millis,
        })
    }

    pub fn builder() -> ExemplarBuilder {
        ExemplarBuilder::default()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn timestamp_millis(&self) -> Option<i64> {
        self.timestamp_millis
    }
}

#[derive(Debug, Default)]
pub struct ExemplarBuilder {
    value: f64,
    trace_id: Option<String>,
    span_id: Option<String>,
    labels: Labels,
    timestamp_millis: Option<i64>,
}

impl ExemplarBuilder {
    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn timestamp_millis(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = Some(timestamp_millis);
        self
    }

    pub fn build(self) -> Result<Exemplar> {
        let mut labels = self.labels;
        if let Some(trace_id) = self.trace_id {
            labels = labels.add(TRACE_ID, trace_id)?;
        }
        if let Some(span_id) = self.span_id {
            labels = labels.add(SPAN_ID, span_id)?;
        }
        Exemplar::new(self.value, labels, self.timestamp_millis)
    }
}

/// Exemplars attached to one data point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exemplars(Vec<Exemplar>);

impl Exemplars {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(exemplars: Vec<Exemplar>) -> Self {
        Exemplars(exemplars)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Exemplar> {
        self.0.iter()
    }

    pub fn get_index(&self, index: usize) -> Option<&Exemplar> {
        self.0.get(index)
    }

    /// Latest exemplar with `lower < value <= upper`
    pub fn get(&self, lower: f64, upper: f64) -> Option<&Exemplar> {
        latest_of(self.0.iter().filter(|e| e.value > lower && e.value <= upper))
    }

    /// Most recent exemplar; ones without timestamp lose against any timestamp
    pub fn latest(&self) -> Option<&Exemplar> {
        latest_of(self.0.iter())
    }
}

fn latest_of<'a>(exemplars: impl Iterator<Item = &'a Exemplar>) -> Option<&'a Exemplar> {
    let mut result: Option<&Exemplar> = None;
    for candidate in exemplars {
        result = match result {
            Some(current) if current.timestamp_millis >= candidate.timestamp_millis => Some(current),
            _ => Some(candidate),
        };
    }
    result
}

impl<'a> IntoIterator for &'a Exemplars {
    type Item = &'a Exemplar;
    type IntoIter = std::slice::Iter<'a, Exemplar>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn exemplar(value: f64, ts: i64) -> Exemplar {
        Exemplar::builder()
            .value(value)
            .trace_id("abc")
            .span_id("def")
            .timestamp_millis(ts)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_adds_trace_labels() {
        let e = exemplar(1.5, 10);
        assert_eq!(e.labels().get(TRACE_ID), Some("abc"));
        assert_eq!(e.labels().get(SPAN_ID), Some("def"));
        assert_eq!(e.timestamp_millis(), Some(10));
    }

    #[test]
    fn test_label_budget() {
        let ok = "x".repeat(MAX_LABELS_CHARS - 1);
        assert!(Exemplar::new(1.0, Labels::of([("a", ok.as_str())]).unwrap(), None).is_ok());

        let too_long = "x".repeat(MAX_LABELS_CHARS);
        assert_matches!(
            Exemplar::new(1.0, Labels::of([("a", too_long.as_str())]).unwrap(), None),
            Err(Error::ExemplarLabelsTooLong { length: 129, max: 128 })
        );
    }

    #[test]
    fn test_get_by_range_returns_latest() {
        let exemplars = Exemplars::of(vec![exemplar(0.5, 1), exemplar(0.7, 5), exemplar(2.0, 9)]);
        assert_eq!(exemplars.get(0.0, 1.0).map(|e| e.value()), Some(0.7));
        assert_eq!(exemplars.get(1.0, f64::INFINITY).map(|e| e.value()), Some(2.0));
        assert!(exemplars.get(2.0, 3.0).is_none());
        assert_eq!(exemplars.latest().map(|e| e.value()), Some(2.0));
    }

    #[test]
    fn test_upper_bound_inclusive() {
        let exemplars = Exemplars::of(vec![exemplar(1.0, 1)]);
        assert!(exemplars.get(0.5, 1.0).is_some());
        assert!(exemplars.get(1.0, 2.0).is_none());
    }
}
