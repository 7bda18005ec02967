//! Immutable label sets
//!
//! Labels are kept sorted by prometheus name (dots as underscores), so two
//! sets with the same assignment compare equal and order the same way in
//! every writer.

use std::cmp::Ordering;
use std::fmt;

use super::naming::{is_valid_label_name, prometheus_name};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Labels {
    pairs: Vec<(String, String)>,
}

impl Labels {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs in any order
    pub fn of<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Result<Self>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(n, v)| (n.into(), v.into()))
            .collect();

        for (name, _) in &pairs {
            if !is_valid_label_name(name) {
                return Err(Error::InvalidLabelName(name.clone()));
            }
        }

        pairs.sort_by(|a, b| compare_names(&a.0, &b.0));
        if let Some(w) = pairs
            .windows(2)
            .find(|w| prometheus_name(&w[0].0) == prometheus_name(&w[1].0))
        {
            return Err(Error::DuplicateLabelName(w[1].0.clone()));
        }
        Ok(Self { pairs })
    }

    /// Zip declared label names with values, checking arity
    pub fn from_names_values(names: &[String], values: &[impl AsRef<str>]) -> Result<Self> {
        if names.len() != values.len() {
            return Err(Error::LabelArity {
                expected: names.len(),
                actual: values.len(),
            });
        }
        Self::of(
            names
                .iter()
                .zip(values)
                .map(|(n, v)| (n.clone(), v.as_ref().to_string())),
        )
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Union of both sets. Fails if a name appears in both.
    pub fn merge(&self, other: &Labels) -> Result<Labels> {
        Self::of(self.pairs.iter().chain(other.pairs.iter()).cloned())
    }

    /// Copy with one more label
    pub fn add(&self, name: impl Into<String>, value: impl Into<String>) -> Result<Labels> {
        let mut pairs = self.pairs.clone();
        pairs.push((name.into(), value.into()));
        Self::of(pairs)
    }

    /// Same label names after mapping dots to underscores
    pub fn has_same_prometheus_names(&self, other: &Labels) -> bool {
        self.len() == other.len()
            && self
                .names()
                .zip(other.names())
                .all(|(a, b)| prometheus_name(a) == prometheus_name(b))
    }

    /// Character budget used by exemplar label limits
    pub fn char_count(&self) -> usize {
        self.pairs
            .iter()
            .map(|(n, v)| n.chars().count() + v.chars().count())
            .sum()
    }
}

/// Prometheus name first, raw name to keep the order total
fn compare_names(a: &str, b: &str) -> Ordering {
    prometheus_name(a)
        .cmp(&prometheus_name(b))
        .then_with(|| a.cmp(b))
}

impl Ord for Labels {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((an, av), (bn, bv)) in self.pairs.iter().zip(&other.pairs) {
            let ordering = compare_names(an, bn).then_with(|| av.cmp(bv));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.pairs.len().cmp(&other.pairs.len())
    }
}

impl PartialOrd for Labels {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}=\"{}\"", name, value)?;
        }
        write!(f, "}}")
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_sorted_by_name() {
        let labels = Labels::of([("zone", "a"), ("app", "x")]).unwrap();
        let names: Vec<_> = labels.names().collect();
        assert_eq!(names, vec!["app", "zone"]);
        assert_eq!(labels.to_string(), r#"{app="x",zone="a"}"#);
    }

    #[test]
    fn test_sorted_by_prometheus_name() {
        // raw order would put "a.c" before "a_b"; as prometheus names
        // "a_b" sorts before "a_c"
        let labels = Labels::of([("a.c", "2"), ("a_b", "1")]).unwrap();
        let names: Vec<_> = labels.names().collect();
        assert_eq!(names, vec!["a_b", "a.c"]);
        assert_eq!(labels.get("a.c"), Some("2"));

        let x = Labels::of([("a_b", "1")]).unwrap();
        let y = Labels::of([("a.c", "1")]).unwrap();
        assert!(x < y);
    }

    #[test]
    fn test_same_prometheus_name_is_duplicate() {
        assert_matches!(
            Labels::of([("a.b", "1"), ("a_b", "2")]),
            Err(Error::DuplicateLabelName(_))
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        assert_matches!(
            Labels::of([("a", "1"), ("a", "2")]),
            Err(Error::DuplicateLabelName(name)) if name == "a"
        );
    }

    #[test]
    fn test_invalid_name_rejected() {
        assert_matches!(Labels::of([("__name__", "x")]), Err(Error::InvalidLabelName(_)));
        assert_matches!(Labels::of([("1abc", "x")]), Err(Error::InvalidLabelName(_)));
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = Labels::of([("a", "1"), ("b", "2")]).unwrap();
        let b = Labels::of([("b", "2"), ("a", "1")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_merge_and_get() {
        let a = Labels::of([("a", "1")]).unwrap();
        let b = Labels::of([("b", "2")]).unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.get("b"), Some("2"));
        assert!(merged.contains("a"));
        assert!(a.merge(&a).is_err());
    }

    #[test]
    fn test_arity() {
        let names = vec!["path".to_string()];
        assert_matches!(
            Labels::from_names_values(&names, &["a", "b"]),
            Err(Error::LabelArity { expected: 1, actual: 2 })
        );
        let labels = Labels::from_names_values(&names, &["/a"]).unwrap();
        assert_eq!(labels.get("path"), Some("/a"));
    }
}
