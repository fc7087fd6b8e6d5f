//! Notifier configuration: YAML file plus `CARD_*` environment overrides.
//!
//! ```yaml
//! templates:
//!   dir: resources/cards
//!   base: task_assigning_card_template.json
//!   full: TasksAssignedToUser.json
//!   deadline_base: upcoming_deadline_card_template.json
//! delivery:
//!   channel_timeout_secs: 20
//!   context_ttl_secs: 604800
//!   last_resort_enabled: true
//! defaults:
//!   task_type: Agreement
//! log_filter: info,card_notify=debug
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use card_delivery::{DeliveryOptions, InMemoryContinuationStore};
use card_templates::{ClosingRegions, TemplatePair};
use card_types::TaskDefaults;

pub const ENV_TEMPLATE_DIR: &str = "CARD_TEMPLATE_DIR";
pub const ENV_BASE_TEMPLATE: &str = "CARD_BASE_TEMPLATE";
pub const ENV_FULL_TEMPLATE: &str = "CARD_FULL_TEMPLATE";
pub const ENV_DEADLINE_TEMPLATE: &str = "CARD_DEADLINE_TEMPLATE";
pub const ENV_CHANNEL_TIMEOUT_SECS: &str = "CARD_CHANNEL_TIMEOUT_SECS";
pub const ENV_CONTEXT_TTL_SECS: &str = "CARD_CONTEXT_TTL_SECS";
pub const ENV_LAST_RESORT_ENABLED: &str = "CARD_LAST_RESORT_ENABLED";
pub const ENV_LOG_FILTER: &str = "CARD_LOG_FILTER";

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub dir: PathBuf,
    pub base: String,
    pub full: String,
    /// Base of the deadline reminder; shares `full` for its table
    pub deadline_base: String,
    pub closing: ClosingRegions,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        let pair = TemplatePair::default();
        Self {
            dir: PathBuf::from("resources/cards"),
            base: pair.base,
            full: pair.full,
            deadline_base: TemplatePair::upcoming_deadline().base,
            closing: ClosingRegions::default(),
        }
    }
}

impl TemplatesConfig {
    pub fn pair(&self) -> TemplatePair {
        TemplatePair {
            base: self.base.clone(),
            full: self.full.clone(),
        }
    }

    pub fn deadline_pair(&self) -> TemplatePair {
        TemplatePair {
            base: self.deadline_base.clone(),
            full: self.full.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Per-channel call limit; unset means no limit
    pub channel_timeout_secs: Option<u64>,
    /// Age after which a stored continuation context reads as absent
    pub context_ttl_secs: Option<u64>,
    pub last_resort_enabled: bool,
    /// Summary text sent with fallback cards and used as preview title
    pub summary: String,
    /// Recipients notified concurrently by one run
    pub max_concurrent_recipients: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            channel_timeout_secs: None,
            context_ttl_secs: Some(7 * 24 * 60 * 60),
            last_resort_enabled: true,
            summary: DeliveryOptions::default().summary,
            max_concurrent_recipients: 4,
        }
    }
}

impl DeliveryConfig {
    pub fn channel_timeout(&self) -> Option<Duration> {
        self.channel_timeout_secs.map(Duration::from_secs)
    }

    pub fn context_ttl(&self) -> Option<Duration> {
        self.context_ttl_secs.map(Duration::from_secs)
    }

    /// Continuation store honouring the configured TTL
    pub fn context_store(&self) -> InMemoryContinuationStore {
        InMemoryContinuationStore::new(self.context_ttl())
    }

    pub fn options(&self) -> DeliveryOptions {
        DeliveryOptions {
            channel_timeout: self.channel_timeout(),
            last_resort_enabled: self.last_resort_enabled,
            summary: self.summary.clone(),
        }
    }
}

// ============================================================================
// ROOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub templates: TemplatesConfig,
    pub delivery: DeliveryConfig,
    pub defaults: TaskDefaults,
    pub log_filter: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            templates: TemplatesConfig::default(),
            delivery: DeliveryConfig::default(),
            defaults: TaskDefaults::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl NotifierConfig {
    /// Load from a YAML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        let mut config =
            Self::from_yaml(&content).with_context(|| format!("Parsing {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document is a valid, all-defaults config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Defaults plus environment overrides, reading `.env` first if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_TEMPLATE_DIR) {
            self.templates.dir = PathBuf::from(dir);
        }
        if let Some(base) = lookup(ENV_BASE_TEMPLATE) {
            self.templates.base = base;
        }
        if let Some(full) = lookup(ENV_FULL_TEMPLATE) {
            self.templates.full = full;
        }
        if let Some(base) = lookup(ENV_DEADLINE_TEMPLATE) {
            self.templates.deadline_base = base;
        }
        if let Some(secs) = parsed::<u64>(&lookup, ENV_CHANNEL_TIMEOUT_SECS) {
            self.delivery.channel_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, ENV_CONTEXT_TTL_SECS) {
            self.delivery.context_ttl_secs = (secs > 0).then_some(secs);
        }
        if let Some(raw) = lookup(ENV_LAST_RESORT_ENABLED) {
            match parse_flag(&raw) {
                Some(enabled) => self.delivery.last_resort_enabled = enabled,
                None => warn!("Ignoring {}={:?}: not a boolean", ENV_LAST_RESORT_ENABLED, raw),
            }
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            self.log_filter = filter;
        }
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
