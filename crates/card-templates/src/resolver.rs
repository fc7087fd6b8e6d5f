//! Placeholder resolution
//!
//! Replaces `{{path}}` tokens in string leaves with values looked up in a
//! JSON context. Paths are dot-separated segments, each optionally followed
//! by `[n]` indices (`tasks[2].title`, `deadline.daysLeft`, `tasks.2.title`).
//! Tokens that cannot be resolved stay in the output verbatim and are
//! reported with the location they were found at.

use std::fmt;

use regex::Captures;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use card_types::Document;

use crate::icons;
use crate::marker::PLACEHOLDER_RE;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Why a placeholder could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    MissingKey { key: String },
    NotAnObject { key: String },
    NotAList { segment: String },
    IndexOutOfRange { index: usize, len: usize },
    MalformedPath,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::MissingKey { key } => write!(f, "missing key '{key}'"),
            UnresolvedReason::NotAnObject { key } => {
                write!(f, "cannot read '{key}' from a non-object")
            }
            UnresolvedReason::NotAList { segment } => {
                write!(f, "'{segment}' is indexed but is not a list")
            }
            UnresolvedReason::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for list of {len}")
            }
            UnresolvedReason::MalformedPath => write!(f, "malformed path"),
        }
    }
}

/// A token left in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedPlaceholder {
    /// Path inside the braces, trimmed
    pub token: String,
    /// JSON pointer of the string leaf containing the token
    pub pointer: String,
    pub reason: UnresolvedReason,
}

/// Resolved document plus the tokens that were left in place
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub document: Document,
    pub warnings: Vec<UnresolvedPlaceholder>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Post-resolution rename of an icon name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconAlias {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct PlaceholderResolver {
    icon_aliases: Vec<IconAlias>,
}

impl Default for PlaceholderResolver {
    /// Includes the legacy `CheckmarkCircle` → `Info` rename
    fn default() -> Self {
        Self::new().with_icon_alias("CheckmarkCircle", "Info")
    }
}

impl PlaceholderResolver {
    /// Resolver with no icon aliases
    pub fn new() -> Self {
        Self {
            icon_aliases: Vec::new(),
        }
    }

    pub fn with_icon_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.icon_aliases.push(IconAlias {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Resolve every placeholder in `document` against `context`.
    ///
    /// Map keys are never rewritten. The input document is not modified.
    pub fn resolve(&self, document: &Document, context: &Value) -> Resolution {
        let mut resolved = document.clone();
        let mut warnings = Vec::new();
        let mut pointer = String::new();

        resolve_value(&mut resolved, context, &mut pointer, &mut warnings);

        for alias in &self.icon_aliases {
            let renamed = icons::rename_icon(&mut resolved, &alias.from, &alias.to);
            if renamed > 0 {
                debug!(from = %alias.from, to = %alias.to, renamed, "Applied icon alias");
            }
        }

        for warning in &warnings {
            warn!(
                token = %warning.token,
                pointer = %warning.pointer,
                reason = %warning.reason,
                "Unresolved placeholder"
            );
        }

        Resolution {
            document: resolved,
            warnings,
        }
    }
}

fn resolve_value(
    value: &mut Value,
    context: &Value,
    pointer: &mut String,
    warnings: &mut Vec<UnresolvedPlaceholder>,
) {
    match value {
        Value::String(s) => {
            if let Some(rendered) = resolve_string(s, context, pointer, warnings) {
                *s = rendered;
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&i.to_string());
                resolve_value(item, context, pointer, warnings);
                pointer.truncate(len);
            }
        }
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&escape_pointer(key));
                resolve_value(child, context, pointer, warnings);
                pointer.truncate(len);
            }
        }
        _ => {}
    }
}

fn resolve_string(
    text: &str,
    context: &Value,
    pointer: &str,
    warnings: &mut Vec<UnresolvedPlaceholder>,
) -> Option<String> {
    if !text.contains("{{") {
        return None;
    }

    let rendered = PLACEHOLDER_RE.replace_all(text, |caps: &Captures| {
        let token = caps[1].trim();
        match lookup_path(context, token) {
            Ok(found) => render(found),
            Err(reason) => {
                warnings.push(UnresolvedPlaceholder {
                    token: token.to_string(),
                    pointer: pointer.to_string(),
                    reason,
                });
                caps[0].to_string()
            }
        }
    });

    (rendered != text).then(|| rendered.into_owned())
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Scalar rendering: strings as-is, null as empty, containers as compact JSON
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// PATH LOOKUP
// ============================================================================

/// Look up a placeholder path in `context`.
///
/// A purely numeric dotted segment indexes into a list (`tasks.2.title`).
pub fn lookup_path<'a>(context: &'a Value, path: &str) -> Result<&'a Value, UnresolvedReason> {
    if path.is_empty() {
        return Err(UnresolvedReason::MalformedPath);
    }

    let mut current = context;
    for raw in path.split('.') {
        let (name, indices) = parse_segment(raw.trim())?;

        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name).ok_or_else(|| UnresolvedReason::MissingKey {
                    key: name.to_string(),
                })?,
                Value::Array(items) if name.bytes().all(|b| b.is_ascii_digit()) => {
                    let index: usize = name.parse().map_err(|_| UnresolvedReason::MalformedPath)?;
                    items.get(index).ok_or(UnresolvedReason::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })?
                }
                _ => {
                    return Err(UnresolvedReason::NotAnObject {
                        key: name.to_string(),
                    })
                }
            };
        }

        for index in indices {
            let Value::Array(items) = current else {
                return Err(UnresolvedReason::NotAList {
                    segment: raw.trim().to_string(),
                });
            };
            current = items.get(index).ok_or(UnresolvedReason::IndexOutOfRange {
                index,
                len: items.len(),
            })?;
        }
    }

    Ok(current)
}

/// Split `name[1][2]` into its name and indices
fn parse_segment(segment: &str) -> Result<(&str, Vec<usize>), UnresolvedReason> {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => (segment[..pos].trim(), &segment[pos..]),
        None => (segment, ""),
    };

    let mut indices = Vec::new();
    while !rest.is_empty() {
        let close = rest.find(']').ok_or(UnresolvedReason::MalformedPath)?;
        if !rest.starts_with('[') {
            return Err(UnresolvedReason::MalformedPath);
        }
        let index = rest[1..close]
            .trim()
            .parse::<usize>()
            .map_err(|_| UnresolvedReason::MalformedPath)?;
        indices.push(index);
        rest = rest[close + 1..].trim_start();
    }

    if name.is_empty() && indices.is_empty() {
        return Err(UnresolvedReason::MalformedPath);
    }
    Ok((name, indices))
}

/// Placeholder tokens still present anywhere in `document`
pub fn unresolved_placeholders(document: &Document) -> Vec<String> {
    let mut found = Vec::new();
    collect_tokens(document, &mut found);
    found
}

fn collect_tokens(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            found.extend(PLACEHOLDER_RE.captures_iter(s).map(|c| c[1].trim().to_string()))
        }
        Value::Array(items) => items.iter().for_each(|v| collect_tokens(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_tokens(v, found)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn context() -> Value {
        json!({
            "meetingTitle": "Sprint Review",
            "deadline": { "daysLeft": 3, "note": null },
            "tasks": [
                { "title": "Sign contract", "tags": ["a", "b"] },
                { "title": "Pick vendor", "done": true }
            ]
        })
    }

    #[test]
    fn test_resolves_paths_and_scalars() {
        let doc = json!({
            "body": [
                { "type": "TextBlock", "text": "{{meetingTitle}}: {{ tasks[1].title }}" },
                { "type": "TextBlock", "text": "{{deadline.daysLeft}} days, done={{tasks.1.done}}" },
                { "type": "TextBlock", "text": "[{{deadline.note}}] {{tasks[0].tags}}" }
            ]
        });

        let resolution = PlaceholderResolver::default().resolve(&doc, &context());

        assert!(resolution.is_complete());
        assert_eq!(resolution.document["body"][0]["text"], json!("Sprint Review: Pick vendor"));
        assert_eq!(resolution.document["body"][1]["text"], json!("3 days, done=true"));
        assert_eq!(resolution.document["body"][2]["text"], json!("[] [\"a\",\"b\"]"));
    }

    #[test]
    fn test_unresolved_stay_and_are_reported() {
        let doc = json!({
            "body": [
                { "type": "TextBlock", "text": "{{tasks[5].title}} / {{missing}}" },
                { "type": "TextBlock", "text": "{{meetingTitle[0]}}" }
            ]
        });

        let resolution = PlaceholderResolver::default().resolve(&doc, &context());

        assert_eq!(
            resolution.document["body"][0]["text"],
            json!("{{tasks[5].title}} / {{missing}}")
        );
        assert_eq!(
            resolution.warnings,
            vec![
                UnresolvedPlaceholder {
                    token: "tasks[5].title".to_string(),
                    pointer: "/body/0/text".to_string(),
                    reason: UnresolvedReason::IndexOutOfRange { index: 5, len: 2 },
                },
                UnresolvedPlaceholder {
                    token: "missing".to_string(),
                    pointer: "/body/0/text".to_string(),
                    reason: UnresolvedReason::MissingKey {
                        key: "missing".to_string()
                    },
                },
                UnresolvedPlaceholder {
                    token: "meetingTitle[0]".to_string(),
                    pointer: "/body/1/text".to_string(),
                    reason: UnresolvedReason::NotAList {
                        segment: "meetingTitle[0]".to_string()
                    },
                },
            ]
        );
        assert_eq!(
            unresolved_placeholders(&resolution.document),
            vec!["tasks[5].title", "missing", "meetingTitle[0]"]
        );
    }

    #[test]
    fn test_keys_are_not_rewritten() {
        let doc = json!({ "{{meetingTitle}}": "x" });
        let resolution = PlaceholderResolver::new().resolve(&doc, &context());
        assert_eq!(resolution.document, doc);
    }

    #[test]
    fn test_icon_alias_applies_after_resolution() {
        let doc = json!({ "body": [ { "type": "Icon", "name": "{{icon}}" } ] });
        let ctx = json!({ "icon": "CheckmarkCircle" });

        let aliased = PlaceholderResolver::default().resolve(&doc, &ctx);
        let plain = PlaceholderResolver::new().resolve(&doc, &ctx);

        assert_eq!(aliased.document["body"][0]["name"], json!("Info"));
        assert_eq!(plain.document["body"][0]["name"], json!("CheckmarkCircle"));
    }

    #[test]
    fn test_malformed_paths() {
        assert_eq!(lookup_path(&context(), ""), Err(UnresolvedReason::MalformedPath));
        assert_eq!(lookup_path(&context(), "tasks[x]"), Err(UnresolvedReason::MalformedPath));
        assert_eq!(lookup_path(&context(), "tasks..title"), Err(UnresolvedReason::MalformedPath));
        assert_eq!(
            lookup_path(&context(), "meetingTitle.length"),
            Err(UnresolvedReason::NotAnObject {
                key: "length".to_string()
            })
        );
    }

    #[test]
    fn test_pointer_escaping() {
        let doc = json!({ "a/b": { "c~d": "{{nope}}" } });
        let resolution = PlaceholderResolver::new().resolve(&doc, &context());
        assert_eq!(resolution.warnings[0].pointer, "/a~1b/c~0d");
    }
}
