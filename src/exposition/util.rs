//! Formatting shared by the text writers

use std::borrow::Cow;

use crate::model::naming::{escape_name, is_valid_legacy_metric_name, prometheus_name};
use crate::model::{EscapingScheme, Labels};

/// `+Inf`, `-Inf`, `NaN`; integral values keep a `.0`; magnitudes below
/// 1e-3 or from 1e7 up use `E` notation
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d == f64::INFINITY {
        return "+Inf".to_string();
    }
    if d == f64::NEG_INFINITY {
        return "-Inf".to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let magnitude = d.abs();
    if (1e-3..1e7).contains(&magnitude) {
        let plain = d.to_string();
        return if plain.contains('.') { plain } else { plain + ".0" };
    }

    let scientific = format!("{:e}", d);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

/// Milliseconds as `seconds.millis`
pub fn format_timestamp_seconds(timestamp_ms: i64) -> String {
    format!(
        "{}.{:03}",
        timestamp_ms.div_euclid(1000),
        timestamp_ms.rem_euclid(1000)
    )
}

/// Escape `\`, `"` and newline
pub fn escape_label_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

/// Escape `\` and newline, the Prometheus text rule for `# HELP`
pub fn escape_help(help: &str, out: &mut String) {
    for c in help.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

/// Exposition form of a metric or label name.
///
/// Legacy names pass through. Others are escaped with `scheme`, or kept
/// for quoting under [`EscapingScheme::NoEscaping`].
pub fn exposed_name(name: &str, scheme: EscapingScheme) -> Cow<'_, str> {
    if is_valid_legacy_metric_name(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(escape_name(name, scheme))
    }
}

/// Label names lose their dots before anything else happens to them
pub fn exposed_label_name(name: &str, scheme: EscapingScheme) -> String {
    exposed_name(&prometheus_name(name), scheme).into_owned()
}

/// Names that must be quoted to be parseable
pub fn needs_quotes(name: &str) -> bool {
    !is_valid_legacy_metric_name(name)
}

/// Append a name, quoted if it is not a legacy name
pub fn push_name(out: &mut String, name: &str) {
    if needs_quotes(name) {
        out.push('"');
        escape_label_value(name, out);
        out.push('"');
    } else {
        out.push_str(name);
    }
}

/// Append `name{labels} ` with an optional extra label such as `le`.
///
/// `name` is already exposed for the scheme; `suffix` is legacy-safe.
/// Metric names that need quoting move inside the braces.
pub fn push_name_and_labels(
    out: &mut String,
    name: &str,
    suffix: &str,
    labels: &Labels,
    extra: Option<(&str, &str)>,
    scheme: EscapingScheme,
) {
    let mut first = true;
    if needs_quotes(name) {
        out.push_str("{\"");
        escape_label_value(name, out);
        out.push_str(suffix);
        out.push('"');
        first = false;
    } else {
        out.push_str(name);
        out.push_str(suffix);
        if labels.is_empty() && extra.is_none() {
            out.push(' ');
            return;
        }
        out.push('{');
    }
    for (label, value) in labels.iter().chain(extra) {
        if !first {
            out.push(',');
        }
        first = false;
        push_name(out, &exposed_label_name(label, scheme));
        out.push_str("=\"");
        escape_label_value(value, out);
        out.push('"');
    }
    out.push_str("} ");
}

/// Append a metadata name (`# TYPE name ...`), quoted when needed
pub fn push_metadata_name(out: &mut String, name: &str, suffix: &str) {
    if needs_quotes(name) {
        out.push('"');
        escape_label_value(name, out);
        out.push_str(suffix);
        out.push('"');
    } else {
        out.push_str(name);
        out.push_str(suffix);
    }
}

/// Append `{labels}` for an exemplar, no trailing space
pub fn push_labels(out: &mut String, labels: &Labels, scheme: EscapingScheme) {
    out.push('{');
    for (i, (label, value)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_name(out, &exposed_label_name(label, scheme));
        out.push_str("=\"");
        escape_label_value(value, out);
        out.push('"');
    }
    out.push('}');
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(5.0), "5.0");
        assert_eq!(format_double(0.5), "0.5");
        assert_eq!(format_double(-2.25), "-2.25");
        assert_eq!(format_double(0.0), "0.0");
        assert_eq!(format_double(1e7), "1.0E7");
        assert_eq!(format_double(1.5e-4), "1.5E-4");
        assert_eq!(format_double(0.001), "0.001");
        assert_eq!(format_double(f64::INFINITY), "+Inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_double(f64::NAN), "NaN");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp_seconds(1_672_850_685_829), "1672850685.829");
        assert_eq!(format_timestamp_seconds(1_005), "1.005");
        assert_eq!(format_timestamp_seconds(42), "0.042");
    }

    #[test]
    fn test_escaping() {
        let mut out = String::new();
        escape_label_value("a\\b\"c\nd", &mut out);
        assert_eq!(out, "a\\\\b\\\"c\\nd");

        let mut help = String::new();
        escape_help("say \"hi\"\n", &mut help);
        assert_eq!(help, "say \"hi\"\\n");
    }

    #[test]
    fn test_exposed_names() {
        assert_eq!(exposed_name("requests", EscapingScheme::ValueEncodingEscaping), "requests");
        assert_eq!(
            exposed_name("my.metric", EscapingScheme::UnderscoreEscaping),
            "my_metric"
        );
        assert_eq!(exposed_name("my.metric", EscapingScheme::NoEscaping), "my.metric");
        assert_eq!(exposed_label_name("http.method", EscapingScheme::NoEscaping), "http_method");
        assert!(needs_quotes("my.metric"));
        assert!(!needs_quotes("my_metric"));
    }

    #[test]
    fn test_name_and_labels() {
        let labels = Labels::of([("path", "/a"), ("http.method", "GET")]).unwrap();
        let mut out = String::new();
        push_name_and_labels(&mut out, "requests", "_total", &labels, None, EscapingScheme::NoEscaping);
        assert_eq!(out, "requests_total{http_method=\"GET\",path=\"/a\"} ");

        let mut out = String::new();
        push_name_and_labels(&mut out, "up", "", &Labels::empty(), None, EscapingScheme::NoEscaping);
        assert_eq!(out, "up ");

        let mut out = String::new();
        push_name_and_labels(
            &mut out,
            "my.latency",
            "_bucket",
            &Labels::empty(),
            Some(("le", "+Inf")),
            EscapingScheme::NoEscaping,
        );
        assert_eq!(out, "{\"my.latency_bucket\",le=\"+Inf\"} ");
    }
}
