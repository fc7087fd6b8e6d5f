//! Index markers
//!
//! The full template is written against the first element of a collection
//! (`tasks[0]`). An [`IndexMarker`] recognises the accepted spellings of that
//! reference and rewrites them to other indices.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `name[0]`, `name[ 0 ]` or `name.0`, capturing the collection name
static INDEX_ZERO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)(\s*\[\s*0\s*\]|\.0\b)").expect("static pattern")
});

/// `{{ ... }}` spans
pub(crate) static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("static pattern"));

/// Recognises references to element zero of one named collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMarker {
    collection: String,
}

impl Default for IndexMarker {
    fn default() -> Self {
        Self::new("tasks")
    }
}

impl IndexMarker {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Canonical spelling, e.g. `tasks[0]`
    pub fn canonical(&self) -> String {
        format!("{}[0]", self.collection)
    }

    /// Number of marker occurrences in `text`
    pub fn count_in(&self, text: &str) -> usize {
        INDEX_ZERO_RE
            .captures_iter(text)
            .filter(|caps| &caps[1] == self.collection)
            .count()
    }

    pub fn is_in(&self, text: &str) -> bool {
        self.count_in(text) > 0
    }

    /// Rewrite every marker inside `{{...}}` spans to `index`.
    ///
    /// Text outside placeholder spans is left alone. Returns `None` when
    /// nothing changed.
    pub fn rewrite_placeholders(&self, text: &str, index: usize) -> Option<String> {
        if !text.contains("{{") || !self.is_in(text) {
            return None;
        }

        let rewritten = PLACEHOLDER_RE.replace_all(text, |span: &Captures| {
            let inner = INDEX_ZERO_RE.replace_all(&span[1], |caps: &Captures| {
                self.reindex(caps, index)
            });
            format!("{{{{{inner}}}}}")
        });

        (rewritten != text).then(|| rewritten.into_owned())
    }

    fn reindex(&self, caps: &Captures, index: usize) -> String {
        if caps[1] != self.collection {
            return caps[0].to_string();
        }
        if caps[2].starts_with('.') {
            format!("{}.{index}", self.collection)
        } else {
            format!("{}[{index}]", self.collection)
        }
    }
}
