//! Core-metadata (`PKG-INFO` / `METADATA`) parsing.
//!
//! The files use RFC 822 style headers: `Key: value` lines, folded continuation lines that
//! start with whitespace, repeated keys for multi-valued fields, and an optional message body
//! after the first blank line that carries the long description.

use std::collections::BTreeMap;

/// Unvalidated field bag read from a distribution.
///
/// Keys are lower-cased with `-` replaced by `_` (`Home-page` becomes `home_page`). Every
/// occurrence of a key is kept, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    fields: BTreeMap<String, Vec<String>>,
    body: Option<String>,
}

/// Canonical key form used by [`RawMetadata`].
pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

impl RawMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for `key`.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .entry(normalize_key(key))
            .or_default()
            .push(value.into());
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(&normalize_key(key))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value recorded for `key`, in file order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.fields
            .get(&normalize_key(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(&normalize_key(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.body.is_none()
    }
}

/// Parses a core-metadata document.
///
/// # Errors
///
/// Returns a description of the first malformed line: a header without a `:` separator, or a
/// continuation line with no header to continue.
pub fn parse(text: &str) -> Result<RawMetadata, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut metadata = RawMetadata::new();
    let mut current: Option<(String, String)> = None;
    let mut lines = text.lines().enumerate();

    for (index, line) in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }

        if line.starts_with([' ', '\t']) {
            let Some((key, value)) = current.as_mut() else {
                return Err(format!(
                    "line {}: continuation line without a preceding header",
                    index + 1
                ));
            };
            fold_continuation(key, value, line);
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(format!("line {}: expected `Key: value`", index + 1));
        };
        if key.trim().is_empty() || key.contains(char::is_whitespace) {
            return Err(format!("line {}: invalid header name `{key}`", index + 1));
        }

        if let Some((key, value)) = current.take() {
            metadata.insert(&key, value);
        }
        current = Some((key.to_string(), value.trim().to_string()));
    }

    if let Some((key, value)) = current.take() {
        metadata.insert(&key, value);
    }

    let body: Vec<&str> = lines.map(|(_, line)| line).collect();
    let body = body.join("\n");
    let body = body.trim_matches('\n');
    if !body.trim().is_empty() {
        metadata.set_body(body);
    }

    Ok(metadata)
}

// Long descriptions are written with an 8-space (optionally `|`-marked) indent per line and
// keep their line breaks; any other folded header is joined with a single space.
fn fold_continuation(key: &str, value: &mut String, line: &str) {
    if normalize_key(key) == "description" {
        let stripped = line
            .strip_prefix("        |")
            .or_else(|| line.strip_prefix("        "))
            .unwrap_or_else(|| line.trim_start());
        value.push('\n');
        value.push_str(stripped);
    } else {
        let stripped = line.trim();
        if !stripped.is_empty() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(stripped);
        }
    }
}
