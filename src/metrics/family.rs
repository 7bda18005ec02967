//! Labeled data point families
//!
//! A metric with label names holds one cell per distinct label value tuple.
//! Cells are created on first use and live until removed; a metric without
//! label names has exactly one cell, created eagerly.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::model::Labels;

pub struct Family<T> {
    label_names: Vec<String>,
    const_labels: Labels,
    cells: DashMap<Vec<String>, (Labels, Arc<T>)>,
    no_labels: Option<(Labels, Arc<T>)>,
    make: Box<dyn Fn() -> Result<T> + Send + Sync>,
}

impl<T> std::fmt::Debug for Family<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Family")
            .field("label_names", &self.label_names)
            .field("cells", &self.len())
            .finish()
    }
}

impl<T> Family<T> {
    pub fn new<F>(label_names: Vec<String>, const_labels: Labels, make: F) -> Result<Self>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let no_labels = if label_names.is_empty() {
            Some((const_labels.clone(), Arc::new(make()?)))
        } else {
            None
        };
        Ok(Self {
            label_names,
            const_labels,
            cells: DashMap::new(),
            no_labels,
            make: Box::new(make),
        })
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Cell of a metric without label names
    pub fn no_labels(&self) -> Option<&Arc<T>> {
        self.no_labels.as_ref().map(|(_, cell)| cell)
    }

    /// Get or create the cell for these label values
    pub fn labels(&self, values: &[&str]) -> Result<Arc<T>> {
        if values.len() != self.label_names.len() {
            return Err(Error::LabelArity {
                expected: self.label_names.len(),
                actual: values.len(),
            });
        }
        if let Some(cell) = &self.no_labels {
            return Ok(cell.1.clone());
        }

        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        if let Some(entry) = self.cells.get(&key) {
            return Ok(entry.1.clone());
        }

        let labels = Labels::from_names_values(&self.label_names, values)?.merge(&self.const_labels)?;
        // a racing creator may win; its cell is kept and ours dropped
        let cell = Arc::new((self.make)()?);
        let entry = self.cells.entry(key).or_insert((labels, cell));
        Ok(entry.1.clone())
    }

    pub fn remove(&self, values: &[&str]) {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.cells.remove(&key);
    }

    pub fn clear(&self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len() + usize::from(self.no_labels.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cell with its full label set
    pub fn cells(&self) -> Vec<(Labels, Arc<T>)> {
        let mut result: Vec<(Labels, Arc<T>)> = self
            .cells
            .iter()
            .map(|entry| (entry.0.clone(), entry.1.clone()))
            .collect();
        if let Some((labels, cell)) = &self.no_labels {
            result.push((labels.clone(), cell.clone()));
        }
        result
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn family(names: &[&str]) -> Family<AtomicU64> {
        Family::new(
            names.iter().map(|s| s.to_string()).collect(),
            Labels::empty(),
            || Ok(AtomicU64::new(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_same_values_same_cell() {
        let f = family(&["path"]);
        f.labels(&["/a"]).unwrap().fetch_add(1, Ordering::Relaxed);
        f.labels(&["/a"]).unwrap().fetch_add(1, Ordering::Relaxed);
        assert_eq!(f.labels(&["/a"]).unwrap().load(Ordering::Relaxed), 2);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_arity_checked() {
        let f = family(&["path", "method"]);
        assert_matches!(
            f.labels(&["/a"]),
            Err(Error::LabelArity { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_no_labels_cell() {
        let f = family(&[]);
        assert!(f.no_labels().is_some());
        assert_eq!(f.len(), 1);
        assert_eq!(f.cells()[0].0, Labels::empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let f = family(&["path"]);
        f.labels(&["/a"]).unwrap();
        f.labels(&["/b"]).unwrap();
        f.remove(&["/a"]);
        assert_eq!(f.len(), 1);
        f.clear();
        assert!(f.is_empty());
    }

    #[test]
    fn test_const_labels_merged() {
        let f: Family<AtomicU64> = Family::new(
            vec!["path".to_string()],
            Labels::of([("env", "prod")]).unwrap(),
            || Ok(AtomicU64::new(0)),
        )
        .unwrap();
        f.labels(&["/a"]).unwrap();
        let (labels, _) = &f.cells()[0];
        assert_eq!(labels.get("env"), Some("prod"));
        assert_eq!(labels.get("path"), Some("/a"));
    }
}
