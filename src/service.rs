//! Notification service: compose a card, deliver it, refresh it later.

use std::collections::HashMap;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use card_delivery::{DeliveryOrchestrator, DeliveryReceipt, ReplaceTarget, UpdateReceipt};
use card_templates::{
    CardComposer, ComposeOptions, ComposedCard, TemplatePair, TemplateRegistry, TemplateSource,
    UnresolvedPlaceholder,
};
use card_types::{CardData, TaskDefaults};

use crate::config::NotifierConfig;
use crate::error::{NotifyError, Result};
use crate::progress::{group_by_assignee, ProgressItem};

/// Outcome of one successful notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub receipt: DeliveryReceipt,
    pub details_ids: Vec<String>,
    pub warnings: Vec<UnresolvedPlaceholder>,
}

/// Per-assignee result of a notification run
#[derive(Debug)]
pub struct AssigneeOutcome {
    pub assignee_id: String,
    pub address: Option<String>,
    pub task_count: usize,
    pub result: Result<Notification>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<AssigneeOutcome>,
}

impl RunSummary {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &NotifyError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.assignee_id.as_str(), e)))
    }
}

pub struct NotificationService<S> {
    composer: CardComposer<S>,
    orchestrator: DeliveryOrchestrator,
    defaults: TaskDefaults,
    /// Templates for assignee runs; the composer's own pair when unset
    deadline: Option<TemplatePair>,
    max_concurrent: usize,
}

impl NotificationService<TemplateRegistry> {
    /// Wire a service from configuration.
    ///
    /// Templates are indexed from the configured directory; delivery options
    /// replace whatever `orchestrator` carried.
    pub fn from_config(
        config: &NotifierConfig,
        orchestrator: DeliveryOrchestrator,
    ) -> Result<Self> {
        let registry = TemplateRegistry::load_from_dir(&config.templates.dir)?;
        let composer = CardComposer::new(registry)
            .with_templates(config.templates.pair())
            .with_options(ComposeOptions {
                closing: config.templates.closing,
                ..Default::default()
            });

        Ok(Self::new(
            composer,
            orchestrator.with_options(config.delivery.options()),
        )
        .with_defaults(config.defaults.clone())
        .with_deadline_templates(config.templates.deadline_pair())
        .with_concurrency(config.delivery.max_concurrent_recipients))
    }
}

impl<S: TemplateSource> NotificationService<S> {
    pub fn new(composer: CardComposer<S>, orchestrator: DeliveryOrchestrator) -> Self {
        Self {
            composer,
            orchestrator,
            defaults: TaskDefaults::default(),
            deadline: None,
            max_concurrent: 4,
        }
    }

    pub fn with_defaults(mut self, defaults: TaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Compose assignee runs with `templates` instead of the default pair
    pub fn with_deadline_templates(mut self, templates: TemplatePair) -> Self {
        self.deadline = Some(templates);
        self
    }

    /// Recipients notified at once by [`Self::notify_assignees`]; at least 1
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn orchestrator(&self) -> &DeliveryOrchestrator {
        &self.orchestrator
    }

    /// Compose the default card over `data`, gaps filled from the defaults
    pub fn compose(&self, data: &CardData) -> Result<ComposedCard> {
        self.compose_with(None, data)
    }

    fn compose_with(
        &self,
        templates: Option<&TemplatePair>,
        data: &CardData,
    ) -> Result<ComposedCard> {
        let filled = data.with_task_defaults(&self.defaults);
        let card = match templates {
            Some(pair) => self.composer.compose(&pair.base, &pair.full, &filled)?,
            None => self.composer.compose_card(&filled)?,
        };
        if card.has_unresolved() {
            warn!(
                unresolved = card.warnings.len(),
                "Composed card still contains placeholders"
            );
        }
        Ok(card)
    }

    /// Compose and deliver one card
    pub async fn notify(&self, address: &str, data: &CardData) -> Result<Notification> {
        self.notify_with(None, address, data).await
    }

    async fn notify_with(
        &self,
        templates: Option<&TemplatePair>,
        address: &str,
        data: &CardData,
    ) -> Result<Notification> {
        let card = self.compose_with(templates, data)?;
        let receipt = self.orchestrator.deliver(address, &card.document).await?;
        Ok(Notification {
            receipt,
            details_ids: card.details_ids,
            warnings: card.warnings,
        })
    }

    /// Notify every assignee about their items.
    ///
    /// `addresses` maps assignee ids to delivery addresses. Cards use the
    /// deadline templates and show the days left to the earliest due item.
    /// One assignee's failure is recorded in the summary and never stops the
    /// others.
    pub async fn notify_assignees(
        &self,
        items: Vec<ProgressItem>,
        addresses: &HashMap<String, String>,
        today: NaiveDate,
    ) -> RunSummary {
        let groups = group_by_assignee(items);
        info!(assignees = groups.len(), "Starting notification run");

        let outcomes: Vec<AssigneeOutcome> = stream::iter(groups)
            .map(|group| async move {
                let address = addresses.get(&group.assignee_id).cloned();
                let result = match &address {
                    Some(address) => {
                        let data = group.card_data(Some(address), today);
                        self.notify_with(self.deadline.as_ref(), address, &data)
                            .await
                    }
                    None => Err(NotifyError::MissingAddress {
                        assignee: group.assignee_id.clone(),
                    }),
                };
                if let Err(e) = &result {
                    warn!(assignee = %group.assignee_id, error = %e, "Notification failed");
                }
                AssigneeOutcome {
                    task_count: group.items.len(),
                    assignee_id: group.assignee_id,
                    address,
                    result,
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let summary = RunSummary { outcomes };
        info!(
            delivered = summary.delivered(),
            failed = summary.failed(),
            "Notification run finished"
        );
        summary
    }

    /// Recompose over `data` and update a previously delivered card
    pub async fn refresh(&self, target: &ReplaceTarget, data: &CardData) -> Result<UpdateReceipt> {
        let card = self.compose(data)?;
        Ok(self.orchestrator.update_target(target, &card.document).await?)
    }
}
