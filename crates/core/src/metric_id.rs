//! Series identifier codec: `name{k1="v1",k2="v2"}`.
//!
//! This string is the join key between rows fetched from the time-series
//! store and the series the engine writes back. Labels are always encoded in
//! key order so the same series produces the same identifier.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A metric name plus its label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricId {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl MetricId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Builder-style label insertion.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Encode to the canonical `name{...}` form.
    pub fn encode(&self) -> String {
        encode(&self.name, &self.labels)
    }

    /// Decode a series identifier. Never fails: anything without a `{` is a bare name.
    pub fn decode(raw: &str) -> Self {
        let (name, labels) = decode(raw);
        Self { name, labels }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode a name and label map. Label values are quoted; `"`, `\` and newlines
/// inside values are backslash-escaped.
pub fn encode(name: &str, labels: &BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }

    let mut out = String::with_capacity(name.len() + labels.len() * 16);
    out.push_str(name);
    out.push('{');
    for (i, (key, value)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push_str("=\"");
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                c => out.push(c),
            }
        }
        out.push('"');
    }
    out.push('}');
    out
}

/// Decode `name{k="v",...}` into its name and labels.
///
/// Splits on the first `{`, drops the trailing `}`, then splits pairs on
/// commas that are not inside a quoted value and each pair on its first `=`.
pub fn decode(raw: &str) -> (String, BTreeMap<String, String>) {
    let mut labels = BTreeMap::new();

    let Some((name, rest)) = raw.split_once('{') else {
        return (raw.trim().to_string(), labels);
    };
    let body = rest.strip_suffix('}').unwrap_or(rest);

    for pair in split_top_level(body) {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        labels.insert(key.to_string(), unquote(value.trim()));
    }

    (name.trim().to_string(), labels)
}

/// Split on commas outside double quotes, honouring backslash escapes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < body.len() {
        parts.push(&body[start..]);
    }

    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
