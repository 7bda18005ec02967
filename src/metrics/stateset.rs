//! StateSet
//!
//! A fixed set of named boolean states, declared when the metric is built.
//! Exposed with one series per state and a label named after the metric.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::family::Family;
use super::{metric_builder, MetricConfig};
use crate::error::{Error, Result};
use crate::model::{Labels, MetricMetadata, MetricSnapshot, MetricType, Snapshot, StateSetDataPoint};
use crate::registry::{Collector, Registry};

#[derive(Debug)]
pub struct StateSetCell {
    names: Arc<Vec<String>>,
    values: Vec<AtomicBool>,
}

impl StateSetCell {
    fn new(names: Arc<Vec<String>>) -> Self {
        let values = names.iter().map(|_| AtomicBool::new(false)).collect();
        Self { names, values }
    }

    pub fn set_true(&self, state: &str) {
        self.set(state, true);
    }

    pub fn set_false(&self, state: &str) {
        self.set(state, false);
    }

    pub fn get(&self, state: &str) -> Option<bool> {
        self.position(state)
            .map(|i| self.values[i].load(Ordering::Relaxed))
    }

    fn set(&self, state: &str, value: bool) {
        match self.position(state) {
            Some(i) => self.values[i].store(value, Ordering::Relaxed),
            None => debug!(state = %state, "Unknown state ignored"),
        }
    }

    fn position(&self, state: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(state)).ok()
    }

    fn data_point(&self, labels: Labels) -> Result<StateSetDataPoint> {
        StateSetDataPoint::new(
            labels,
            self.names
                .iter()
                .zip(&self.values)
                .map(|(name, value)| (name.clone(), value.load(Ordering::Relaxed))),
        )
    }
}

#[derive(Debug)]
pub struct StateSet {
    metadata: MetricMetadata,
    family: Family<StateSetCell>,
}

impl StateSet {
    pub fn builder(name: impl Into<String>) -> StateSetBuilder {
        StateSetBuilder {
            config: MetricConfig::new(name),
            states: Vec::new(),
        }
    }

    pub fn labels(&self, values: &[&str]) -> Result<Arc<StateSetCell>> {
        self.family.labels(values)
    }

    pub fn remove(&self, values: &[&str]) {
        self.family.remove(values);
    }

    pub fn clear(&self) {
        self.family.clear();
    }

    pub fn set_true(&self, state: &str) {
        match self.family.no_labels() {
            Some(cell) => cell.set_true(state),
            None => debug!(metric = %self.metadata.name(), "Unlabeled update on labeled state set ignored"),
        }
    }

    pub fn set_false(&self, state: &str) {
        match self.family.no_labels() {
            Some(cell) => cell.set_false(state),
            None => debug!(metric = %self.metadata.name(), "Unlabeled update on labeled state set ignored"),
        }
    }
}

impl Collector for StateSet {
    fn collect(&self) -> Result<MetricSnapshot> {
        let points = self
            .family
            .cells()
            .into_iter()
            .map(|(labels, cell)| cell.data_point(labels))
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricSnapshot::StateSet(Snapshot::new(self.metadata.clone(), points)?))
    }

    fn prometheus_name(&self) -> Option<String> {
        Some(self.metadata.prometheus_name().to_string())
    }

    fn metric_type(&self) -> Option<MetricType> {
        Some(MetricType::StateSet)
    }

    fn label_names(&self) -> Option<Vec<String>> {
        Some(self.family.label_names().to_vec())
    }
}

pub struct StateSetBuilder {
    config: MetricConfig,
    states: Vec<String>,
}

metric_builder!(StateSetBuilder);

impl StateSetBuilder {
    pub fn states<S: Into<String>>(mut self, states: impl IntoIterator<Item = S>) -> Self {
        self.states.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn build(mut self) -> Result<StateSet> {
        if self.config.unit.is_some() {
            return Err(Error::invalid("state sets have no unit"));
        }
        if self.states.is_empty() {
            return Err(Error::invalid(format!(
                "state set {} needs at least one state",
                self.config.name
            )));
        }
        let metadata = self.config.validate(&[self.config.name.as_str()])?;

        self.states.sort();
        if let Some(w) = self.states.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::invalid(format!("duplicate state name '{}'", w[0])));
        }

        let names = Arc::new(self.states);
        let family = Family::new(
            self.config.label_names,
            self.config.const_labels,
            move || Ok(StateSetCell::new(names.clone())),
        )?;
        Ok(StateSet { metadata, family })
    }

    pub fn register(self, registry: &Registry) -> Result<Arc<StateSet>> {
        let state_set = Arc::new(self.build()?);
        registry.register(state_set.clone())?;
        Ok(state_set)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states() {
        let feature = StateSet::builder("feature_flags")
            .states(["dark_mode", "beta"])
            .build()
            .unwrap();
        feature.set_true("beta");
        feature.set_true("unknown");

        let MetricSnapshot::StateSet(snapshot) = feature.collect().unwrap() else {
            panic!("expected state set snapshot");
        };
        let states = &snapshot.data_points()[0].states;
        assert_eq!(states[0].name, "beta");
        assert!(states[0].value);
        assert!(!states[1].value);
    }

    #[test]
    fn test_labeled_state_set() {
        let state = StateSet::builder("pool_state")
            .label_names(["pool"])
            .states(["up", "draining"])
            .build()
            .unwrap();
        let cell = state.labels(&["a"]).unwrap();
        cell.set_true("draining");
        assert_eq!(cell.get("draining"), Some(true));
        cell.set_false("draining");
        assert_eq!(cell.get("draining"), Some(false));
        assert_eq!(cell.get("gone"), None);
    }

    #[test]
    fn test_builder_validation() {
        assert!(StateSet::builder("empty").build().is_err());
        assert!(StateSet::builder("dup").states(["a", "a"]).build().is_err());
        assert!(StateSet::builder("mode")
            .label_names(["mode"])
            .states(["a"])
            .build()
            .is_err());
    }
}
