//! Card composition
//!
//! Pipeline: extract the sample table from the full template, multiply it per
//! task, wire exclusive disclosure, splice the result into the base template
//! before its footer, then resolve placeholders against the card data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use card_types::{CardData, Document};

use crate::disclosure;
use crate::error::TemplateError;
use crate::extractor::{extract_fragment, FragmentPattern};
use crate::multiplier::{multiply, RewriteStrategy};
use crate::node::{NodeShape, ACTION_SET, CONTAINER};
use crate::resolver::{PlaceholderResolver, UnresolvedPlaceholder};
use crate::source::TemplateSource;

// ============================================================================
// OPTIONS
// ============================================================================

/// Regions that collapse every details panel when activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosingRegions {
    /// Number of leading base-body nodes wired as closers
    pub leading_banners: usize,
    pub table_header: bool,
    pub footer: bool,
}

impl Default for ClosingRegions {
    fn default() -> Self {
        Self {
            leading_banners: 2,
            table_header: true,
            footer: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    pub rewrite: RewriteStrategy,
    pub closing: ClosingRegions,
}

/// Names of the base and full templates used by [`CardComposer::compose_card`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePair {
    pub base: String,
    pub full: String,
}

impl TemplatePair {
    /// Reminder card for items nearing their deadline; the banner reads
    /// `deadline.daysLeft` from the card data.
    pub fn upcoming_deadline() -> Self {
        Self {
            base: "upcoming_deadline_card_template.json".to_string(),
            full: "TasksAssignedToUser.json".to_string(),
        }
    }
}

impl Default for TemplatePair {
    fn default() -> Self {
        Self {
            base: "task_assigning_card_template.json".to_string(),
            full: "TasksAssignedToUser.json".to_string(),
        }
    }
}

/// A composed card and what the caller should know about it
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedCard {
    pub document: Document,
    /// Details panel ids in row order
    pub details_ids: Vec<String>,
    /// Placeholders left unresolved
    pub warnings: Vec<UnresolvedPlaceholder>,
}

impl ComposedCard {
    pub fn has_unresolved(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// COMPOSER
// ============================================================================

pub struct CardComposer<S> {
    source: S,
    pattern: FragmentPattern,
    resolver: PlaceholderResolver,
    options: ComposeOptions,
    templates: TemplatePair,
}

impl<S: TemplateSource> CardComposer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pattern: FragmentPattern::default(),
            resolver: PlaceholderResolver::default(),
            options: ComposeOptions::default(),
            templates: TemplatePair::default(),
        }
    }

    pub fn with_pattern(mut self, pattern: FragmentPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_resolver(mut self, resolver: PlaceholderResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_templates(mut self, templates: TemplatePair) -> Self {
        self.templates = templates;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Compose with the configured template pair
    pub fn compose_card(&self, data: &CardData) -> Result<ComposedCard, TemplateError> {
        self.compose(&self.templates.base, &self.templates.full, data)
    }

    /// Compose a card from the named templates.
    ///
    /// Inputs are never modified. Fails without producing a card when a
    /// template is missing, the base has no `body`, or the sample table
    /// cannot be located.
    pub fn compose(
        &self,
        base_name: &str,
        full_name: &str,
        data: &CardData,
    ) -> Result<ComposedCard, TemplateError> {
        let mut card = self.source.require(base_name)?;
        let full = self.source.require(full_name)?;

        let fragment = extract_fragment(&full, &self.pattern).map_err(|diagnostics| {
            error!(template = full_name, %diagnostics, "Structural extraction failed");
            TemplateError::StructuralExtractionFailed {
                template: full_name.to_string(),
                diagnostics,
            }
        })?;

        let mut instances = multiply(&fragment, &data.tasks, &self.pattern, self.options.rewrite);
        let details_ids = instances.details_ids.clone();

        let body = card
            .get_mut("body")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| TemplateError::InvalidTemplate {
                name: base_name.to_string(),
                reason: "missing `body` list".to_string(),
            })?;
        let insert_at = find_insertion_index(body);

        if !details_ids.is_empty() {
            disclosure::wire_exclusive(instances.rows_mut(), &details_ids);

            let closing = self.options.closing;
            if closing.table_header {
                disclosure::wire_closer(&mut instances.header, &details_ids);
            }
            for banner in body.iter_mut().take(closing.leading_banners.min(insert_at)) {
                disclosure::wire_closer(banner, &details_ids);
            }
            if closing.footer {
                if let Some(footer) = body.get_mut(insert_at) {
                    disclosure::wire_closer(footer, &details_ids);
                }
            }
        }

        let nodes = instances.into_nodes();
        let inserted = nodes.len();
        body.splice(insert_at..insert_at, nodes);

        let context = data.to_context()?;
        let resolution = self.resolver.resolve(&card, &context);

        info!(
            tasks = data.tasks.len(),
            inserted,
            unresolved = resolution.warnings.len(),
            "Composed card from {} + {}",
            base_name,
            full_name
        );

        Ok(ComposedCard {
            document: resolution.document,
            details_ids,
            warnings: resolution.warnings,
        })
    }
}

/// Where the table goes in a base body.
///
/// Before the first footer-marked node: a container holding an action set
/// directly, or any node whose id starts with `footer`. Without a marker the
/// table goes before the last node (or at 0 in an empty body).
pub fn find_insertion_index(body: &[Value]) -> usize {
    body.iter()
        .position(is_footer_marked)
        .unwrap_or_else(|| body.len().saturating_sub(1))
}

pub fn is_footer_marked(node: &Value) -> bool {
    if node.element_id().is_some_and(|id| id.starts_with("footer")) {
        return true;
    }
    node.is_type(CONTAINER)
        && node
            .child_lists()
            .into_iter()
            .flatten()
            .any(|child| child.is_type(ACTION_SET))
}
