//! Metric name filter
//!
//! All four conditions must hold. Empty lists do not restrict. Equality
//! ignores exposition suffixes: a filter entry `requests_total` matches the
//! metric `requests`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricNameFilter {
    name_equal_to: Vec<String>,
    name_not_equal_to: Vec<String>,
    name_starts_with: Vec<String>,
    name_does_not_start_with: Vec<String>,
    and: Vec<MetricNameFilter>,
}

impl MetricNameFilter {
    /// Filter that accepts every name
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn name_must_be_equal_to<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.name_equal_to.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn name_must_not_be_equal_to<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.name_not_equal_to.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn name_must_start_with<S: Into<String>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.name_starts_with.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn name_must_not_start_with<S: Into<String>>(
        mut self,
        prefixes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.name_does_not_start_with
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Both filters must accept the name
    pub fn and(mut self, other: MetricNameFilter) -> Self {
        if !other.is_allow_all() {
            self.and.push(other);
        }
        self
    }

    pub fn is_allow_all(&self) -> bool {
        self.name_equal_to.is_empty()
            && self.name_not_equal_to.is_empty()
            && self.name_starts_with.is_empty()
            && self.name_does_not_start_with.is_empty()
            && self.and.iter().all(MetricNameFilter::is_allow_all)
    }

    pub fn test(&self, name: &str) -> bool {
        let equal = |candidates: &[String]| candidates.iter().any(|c| matches_name(c, name));
        let prefixed = |prefixes: &[String]| prefixes.iter().any(|p| name.starts_with(p.as_str()));

        (self.name_equal_to.is_empty() || equal(&self.name_equal_to))
            && !equal(&self.name_not_equal_to)
            && (self.name_starts_with.is_empty() || prefixed(&self.name_starts_with))
            && !prefixed(&self.name_does_not_start_with)
            && self.and.iter().all(|f| f.test(name))
    }
}

/// Suffixes a sample name may carry on top of the metric name
const SAMPLE_SUFFIXES: &[&str] = &[
    "_total", "_created", "_bucket", "_count", "_sum", "_gcount", "_gsum", "_info",
];

fn matches_name(candidate: &str, name: &str) -> bool {
    candidate == name
        || candidate
            .strip_prefix(name)
            .is_some_and(|rest| SAMPLE_SUFFIXES.contains(&rest))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let filter = MetricNameFilter::allow_all();
        assert!(filter.is_allow_all());
        assert!(filter.test("anything"));
    }

    #[test]
    fn test_equal_to_ignores_suffix() {
        let filter = MetricNameFilter::default().name_must_be_equal_to(["requests_total"]);
        assert!(filter.test("requests"));
        assert!(filter.test("requests_total"));
        assert!(!filter.test("errors"));
        assert!(!MetricNameFilter::default()
            .name_must_be_equal_to(["requests_extra"])
            .test("requests"));
    }

    #[test]
    fn test_not_equal_to() {
        let filter = MetricNameFilter::default().name_must_not_be_equal_to(["jvm_gc"]);
        assert!(!filter.test("jvm_gc"));
        assert!(filter.test("jvm_memory"));
    }

    #[test]
    fn test_prefixes() {
        let filter = MetricNameFilter::default()
            .name_must_start_with(["http_"])
            .name_must_not_start_with(["http_client_"]);
        assert!(filter.test("http_server_requests"));
        assert!(!filter.test("http_client_requests"));
        assert!(!filter.test("db_queries"));
    }

    #[test]
    fn test_and_combination() {
        let configured = MetricNameFilter::default().name_must_not_start_with(["internal_"]);
        let requested = MetricNameFilter::default().name_must_be_equal_to(["internal_x", "public_y"]);
        let filter = configured.and(requested);
        assert!(!filter.test("internal_x"));
        assert!(filter.test("public_y"));
        assert!(!filter.test("public_z"));
    }
}
