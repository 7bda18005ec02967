//! Metric and label naming
//!
//! Names may contain dots; exposition maps them to underscores. Names that
//! are not legacy Prometheus names at all (arbitrary UTF-8 from custom
//! collectors) are either quoted or escaped, depending on the negotiated
//! [`EscapingScheme`].

use crate::error::{Error, Result};

/// Suffixes a metric name must not carry, the writers append them
pub const RESERVED_METRIC_NAME_SUFFIXES: [&str; 8] = [
    "_total", "_created", "_bucket", "_info", ".total", ".created", ".bucket", ".info",
];

const RESERVED_LABEL_PREFIXES: [&str; 4] = ["__", "._", "..", "_."];

const ESCAPING_KEY: &str = "escaping=";

// =============================================================================
// Validation
// =============================================================================

fn is_metric_start_char(c: char, allow_dots: bool) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (allow_dots && c == '.')
}

fn is_metric_char(c: char, allow_dots: bool) -> bool {
    is_metric_start_char(c, allow_dots) || c.is_ascii_digit()
}

fn matches_metric_chars(name: &str, allow_dots: bool) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_metric_start_char(first, allow_dots) => {
            chars.all(|c| is_metric_char(c, allow_dots))
        }
        _ => false,
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`, what every Prometheus parser accepts unquoted
pub fn is_valid_legacy_metric_name(name: &str) -> bool {
    matches_metric_chars(name, false)
}

/// Same as [`validate_metric_name`] but as a predicate
pub fn is_valid_metric_name(name: &str) -> bool {
    validate_metric_name(name).is_ok()
}

/// Legacy characters plus dots, no reserved suffix
pub fn validate_metric_name(name: &str) -> Result<()> {
    if let Some(suffix) = RESERVED_METRIC_NAME_SUFFIXES
        .iter()
        .find(|s| name.ends_with(*s))
    {
        return Err(Error::InvalidMetricName {
            name: name.to_string(),
            reason: format!("The metric name must not include the '{}' suffix.", suffix),
        });
    }
    if !matches_metric_chars(name, true) {
        return Err(Error::InvalidMetricName {
            name: name.to_string(),
            reason: "The metric name contains unsupported characters".to_string(),
        });
    }
    Ok(())
}

pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let legal = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '.' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        }
        _ => false,
    };
    legal && !RESERVED_LABEL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Exposition name: dots become underscores for legacy-compatible names,
/// anything else is returned unchanged for the writers to escape
pub fn prometheus_name(name: &str) -> String {
    if matches_metric_chars(name, true) {
        name.replace('.', "_")
    } else {
        name.to_string()
    }
}

/// `namespace_subsystem_name`, skipping empty parts
pub fn compose_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

// =============================================================================
// Sanitizing
// =============================================================================

fn replace_illegal_chars(name: &str, allow_colon: bool) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    for (i, c) in name.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            out.push('_');
            out.push(c);
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' || (allow_colon && c == ':') {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Turn an arbitrary string into a valid metric name
pub fn sanitize_metric_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::invalid(
            "Cannot convert an empty string to a valid metric name.",
        ));
    }
    let mut sanitized = replace_illegal_chars(name, true);
    let mut modified = true;
    while modified {
        modified = false;
        for suffix in RESERVED_METRIC_NAME_SUFFIXES {
            if sanitized == suffix {
                // "_total" alone becomes "total"
                return Ok(suffix[1..].to_string());
            }
            if sanitized.ends_with(suffix) {
                sanitized.truncate(sanitized.len() - suffix.len());
                modified = true;
            }
        }
    }
    Ok(sanitized)
}

/// Turn an arbitrary string into a valid label name
pub fn sanitize_label_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::invalid(
            "Cannot convert an empty string to a valid label name.",
        ));
    }
    let mut sanitized = replace_illegal_chars(name, false);
    while RESERVED_LABEL_PREFIXES.iter().any(|p| sanitized.starts_with(p)) {
        sanitized.remove(0);
    }
    Ok(sanitized)
}

// =============================================================================
// Escaping
// =============================================================================

/// How names outside the legacy character set are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapingScheme {
    /// Keep UTF-8 names, quote them where needed
    NoEscaping,
    /// Replace every illegal character with `_`
    UnderscoreEscaping,
    /// `_` becomes `__`, `.` becomes `_dot_`
    DotsEscaping,
    /// `U__` prefix and `_<hex>_` per illegal character
    #[default]
    ValueEncodingEscaping,
}

impl EscapingScheme {
    /// Value of the `escaping` Accept-header parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            EscapingScheme::NoEscaping => "allow-utf-8",
            EscapingScheme::UnderscoreEscaping => "underscores",
            EscapingScheme::DotsEscaping => "dots",
            EscapingScheme::ValueEncodingEscaping => "values",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "allow-utf-8" => Some(EscapingScheme::NoEscaping),
            "underscores" => Some(EscapingScheme::UnderscoreEscaping),
            "dots" => Some(EscapingScheme::DotsEscaping),
            "values" => Some(EscapingScheme::ValueEncodingEscaping),
            _ => None,
        }
    }

    /// Scheme requested by `escaping=...` in an Accept header, default otherwise
    pub fn from_accept_header(accept: Option<&str>) -> Self {
        accept
            .into_iter()
            .flat_map(|h| h.split([';', ',']))
            .filter_map(|param| param.trim().strip_prefix(ESCAPING_KEY))
            .find_map(Self::parse)
            .unwrap_or_default()
    }
}

fn is_legacy_char(c: char, i: usize) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || (c.is_ascii_digit() && i > 0)
}

pub fn escape_name(name: &str, scheme: EscapingScheme) -> String {
    if name.is_empty() {
        return String::new();
    }
    match scheme {
        EscapingScheme::NoEscaping => name.to_string(),
        EscapingScheme::UnderscoreEscaping => {
            if is_valid_legacy_metric_name(name) {
                return name.to_string();
            }
            name.chars()
                .enumerate()
                .map(|(i, c)| if is_legacy_char(c, i) { c } else { '_' })
                .collect()
        }
        EscapingScheme::DotsEscaping => {
            let mut out = String::with_capacity(name.len() + 8);
            for (i, c) in name.chars().enumerate() {
                match c {
                    '_' => out.push_str("__"),
                    '.' => out.push_str("_dot_"),
                    c if is_legacy_char(c, i) => out.push(c),
                    _ => out.push('_'),
                }
            }
            out
        }
        EscapingScheme::ValueEncodingEscaping => {
            if is_valid_legacy_metric_name(name) {
                return name.to_string();
            }
            let mut out = String::with_capacity(name.len() + 8);
            out.push_str("U__");
            for (i, c) in name.chars().enumerate() {
                if c == '_' {
                    out.push_str("__");
                } else if is_legacy_char(c, i) {
                    out.push(c);
                } else {
                    out.push_str(&format!("_{:x}_", c as u32));
                }
            }
            out
        }
    }
}

/// Reverse [`escape_name`]. Underscore escaping is lossy and returns the
/// input; malformed value encodings are returned unchanged.
pub fn unescape_name(name: &str, scheme: EscapingScheme) -> String {
    match scheme {
        EscapingScheme::NoEscaping | EscapingScheme::UnderscoreEscaping => name.to_string(),
        EscapingScheme::DotsEscaping => {
            let mut out = String::with_capacity(name.len());
            let mut rest = name;
            while let Some(c) = rest.chars().next() {
                if let Some(tail) = rest.strip_prefix("_dot_") {
                    out.push('.');
                    rest = tail;
                } else if let Some(tail) = rest.strip_prefix("__") {
                    out.push('_');
                    rest = tail;
                } else {
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
            out
        }
        EscapingScheme::ValueEncodingEscaping => {
            unescape_values(name).unwrap_or_else(|| name.to_string())
        }
    }
}

fn unescape_values(name: &str) -> Option<String> {
    let escaped = name.strip_prefix("U__")?;
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '_' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '_' => out.push('_'),
            first => {
                let mut code = first.to_digit(16)?;
                let mut digits = 1;
                loop {
                    let next = chars.next()?;
                    if next == '_' {
                        break;
                    }
                    digits += 1;
                    if digits > 6 {
                        return None;
                    }
                    code = code * 16 + next.to_digit(16)?;
                }
                out.push(char::from_u32(code)?);
            }
        }
    }
    Some(out)
}

// =============================================================================
// Tests
// =============================================================================
