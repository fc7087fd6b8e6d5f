//! Delivery state machine
//!
//! ```text
//! NotStarted → TryingPrimary → TryingFallback → TryingLastResort → Delivered | Failed
//! ```
//!
//! Every channel failure moves to the next state and is kept for the final
//! report. The last-resort state is skipped when that channel is disabled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use card_types::{ContinuationContext, Document, Recipient};

use crate::channel::{
    ChannelKind, ContinuationChannel, ConversationParams, Directory, FallbackChannel,
    LastResortChannel,
};
use crate::error::{ChannelError, DeliveryError};
use crate::preview::Preview;
use crate::store::{ContinuationStore, INSTALLATION_KEY};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    NotStarted,
    TryingPrimary,
    TryingFallback,
    TryingLastResort,
    Delivered(ChannelKind),
    Failed,
}

impl DeliveryState {
    /// Channel tried in this state
    pub fn channel(&self) -> Option<ChannelKind> {
        match self {
            DeliveryState::TryingPrimary => Some(ChannelKind::Primary),
            DeliveryState::TryingFallback => Some(ChannelKind::Fallback),
            DeliveryState::TryingLastResort => Some(ChannelKind::LastResort),
            _ => None,
        }
    }

    pub fn start(self) -> Self {
        match self {
            DeliveryState::NotStarted => DeliveryState::TryingPrimary,
            other => other,
        }
    }

    pub fn on_success(self) -> Self {
        match self.channel() {
            Some(kind) => DeliveryState::Delivered(kind),
            None => self,
        }
    }

    pub fn on_failure(self, last_resort_available: bool) -> Self {
        match self {
            DeliveryState::TryingPrimary => DeliveryState::TryingFallback,
            DeliveryState::TryingFallback if last_resort_available => {
                DeliveryState::TryingLastResort
            }
            DeliveryState::TryingFallback | DeliveryState::TryingLastResort => {
                DeliveryState::Failed
            }
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered(_) | DeliveryState::Failed)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of one channel call, kept for the final report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub channel: ChannelKind,
    pub succeeded: bool,
    pub error: Option<ChannelError>,
}

impl DeliveryAttempt {
    fn success(channel: ChannelKind) -> Self {
        Self {
            channel,
            succeeded: true,
            error: None,
        }
    }

    fn failure(channel: ChannelKind, error: ChannelError) -> Self {
        Self {
            channel,
            succeeded: false,
            error: Some(error),
        }
    }
}

/// What a channel handed back, tagged by what it can later do
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    /// Sent through the continuation channel; replaceable in place
    Sent {
        activity_id: String,
        context: ContinuationContext,
    },
    /// Sent through the fallback channel; can only be re-sent
    SentNoReplace {
        message_id: String,
        conversation_id: String,
    },
    /// Preview only, no message id
    Preview,
}

impl SentMessage {
    pub fn message_id(&self) -> Option<&str> {
        match self {
            SentMessage::Sent { activity_id, .. } => Some(activity_id),
            SentMessage::SentNoReplace { message_id, .. } => Some(message_id),
            SentMessage::Preview => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub delivery_id: Uuid,
    pub recipient: Recipient,
    pub method: ChannelKind,
    pub sent: SentMessage,
    /// Every channel tried, in order, ending with the successful one
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReceipt {
    pub fn state(&self) -> DeliveryState {
        DeliveryState::Delivered(self.method)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.sent.message_id()
    }

    pub fn continuation_context(&self) -> Option<&ContinuationContext> {
        match &self.sent {
            SentMessage::Sent { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Errors of the channels tried before the successful one
    pub fn errors(&self) -> impl Iterator<Item = (ChannelKind, &ChannelError)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (a.channel, e)))
    }

    /// Delivered as a preview only
    pub fn is_reduced_fidelity(&self) -> bool {
        self.method == ChannelKind::LastResort
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    /// Per-channel call limit; expiry counts as a channel failure
    pub channel_timeout: Option<Duration>,
    pub last_resort_enabled: bool,
    /// Text accompanying fallback cards and titling previews
    pub summary: String,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            channel_timeout: None,
            last_resort_enabled: true,
            summary: "New progress items assigned to you".to_string(),
        }
    }
}

pub struct DeliveryOrchestrator {
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) store: Arc<dyn ContinuationStore>,
    pub(crate) primary: Option<Arc<dyn ContinuationChannel>>,
    pub(crate) fallback: Option<Arc<dyn FallbackChannel>>,
    pub(crate) last_resort: Option<Arc<dyn LastResortChannel>>,
    pub(crate) options: DeliveryOptions,
}

impl DeliveryOrchestrator {
    pub fn new(directory: Arc<dyn Directory>, store: Arc<dyn ContinuationStore>) -> Self {
        Self {
            directory,
            store,
            primary: None,
            fallback: None,
            last_resort: None,
            options: DeliveryOptions::default(),
        }
    }

    pub fn with_primary(mut self, channel: Arc<dyn ContinuationChannel>) -> Self {
        self.primary = Some(channel);
        self
    }

    pub fn with_fallback(mut self, channel: Arc<dyn FallbackChannel>) -> Self {
        self.fallback = Some(channel);
        self
    }

    pub fn with_last_resort(mut self, channel: Arc<dyn LastResortChannel>) -> Self {
        self.last_resort = Some(channel);
        self
    }

    pub fn with_options(mut self, options: DeliveryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContinuationStore> {
        &self.store
    }

    fn last_resort_available(&self) -> bool {
        self.options.last_resort_enabled && self.last_resort.is_some()
    }

    /// Deliver `document` to the recipient behind `address`.
    ///
    /// Channels are tried strictly one after another. The receipt names the
    /// channel that succeeded and carries the errors of those that did not.
    pub async fn deliver(
        &self,
        address: &str,
        document: &Document,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let delivery_id = Uuid::new_v4();
        let span = info_span!("deliver", %delivery_id, address);
        self.run(delivery_id, address, document)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        delivery_id: Uuid,
        address: &str,
        document: &Document,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let recipient = self.resolve_recipient(address).await?;
        let mut attempts = Vec::new();
        let mut state = DeliveryState::NotStarted.start();

        while let Some(channel) = state.channel() {
            debug!(?state, recipient = %recipient.id, "Trying channel");

            match self.bounded(self.attempt(channel, &recipient, document)).await {
                Ok(sent) => {
                    attempts.push(DeliveryAttempt::success(channel));
                    info!(
                        method = %channel,
                        message_id = sent.message_id().unwrap_or_default(),
                        "Delivered card to {}",
                        recipient.label()
                    );
                    return Ok(DeliveryReceipt {
                        delivery_id,
                        recipient,
                        method: channel,
                        sent,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Channel failed, moving on");
                    attempts.push(DeliveryAttempt::failure(channel, e));
                    state = state.on_failure(self.last_resort_available());
                }
            }
        }

        error!(attempts = attempts.len(), "All channels failed for {}", address);
        Err(DeliveryError::Exhausted {
            address: address.to_string(),
            attempts,
        })
    }

    async fn resolve_recipient(&self, address: &str) -> Result<Recipient, DeliveryError> {
        let found = self
            .bounded(self.directory.find_recipient(address))
            .await
            .map_err(|source| DeliveryError::Directory {
                address: address.to_string(),
                source,
            })?;

        found.ok_or_else(|| {
            warn!("Recipient not found: {}", address);
            DeliveryError::RecipientNotFound {
                address: address.to_string(),
            }
        })
    }

    async fn attempt(
        &self,
        channel: ChannelKind,
        recipient: &Recipient,
        document: &Document,
    ) -> Result<SentMessage, ChannelError> {
        match channel {
            ChannelKind::Primary => self.send_primary(recipient, document).await,
            ChannelKind::Fallback => self.send_fallback(recipient, document).await,
            ChannelKind::LastResort => self.send_last_resort(recipient, document).await,
        }
    }

    /// Apply the configured per-channel timeout
    pub(crate) async fn bounded<T, F>(&self, call: F) -> Result<T, ChannelError>
    where
        F: Future<Output = Result<T, ChannelError>>,
    {
        match self.options.channel_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ChannelError::TimedOut(limit))?,
            None => call.await,
        }
    }

    async fn send_primary(
        &self,
        recipient: &Recipient,
        document: &Document,
    ) -> Result<SentMessage, ChannelError> {
        let channel = self
            .primary
            .as_ref()
            .ok_or_else(|| ChannelError::unavailable("continuation channel not configured"))?;

        let conversation = match self.store.get(&recipient.id).await {
            Some(personal) => personal,
            None => {
                let installation = self
                    .store
                    .get(INSTALLATION_KEY)
                    .await
                    .ok_or_else(|| ChannelError::unavailable("no stored continuation context"))?;
                let tenant = installation
                    .as_value()
                    .pointer("/conversation/tenantId")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let params = ConversationParams::for_member(&recipient.id).with_tenant(tenant);
                channel.create_conversation(&installation, &params).await?
            }
        };

        let activity_id = channel.send_activity(&conversation, document).await?;
        let context = conversation.with_activity_id(&activity_id);
        self.store.put(&recipient.id, conversation).await;

        Ok(SentMessage::Sent {
            activity_id,
            context,
        })
    }

    async fn send_fallback(
        &self,
        recipient: &Recipient,
        document: &Document,
    ) -> Result<SentMessage, ChannelError> {
        let channel = self
            .fallback
            .as_ref()
            .ok_or_else(|| ChannelError::unavailable("fallback channel not configured"))?;

        let conversation_id = channel.find_or_create_conversation(&recipient.id).await?;
        let message_id = channel
            .send_document(&conversation_id, &self.options.summary, document)
            .await?;

        Ok(SentMessage::SentNoReplace {
            message_id,
            conversation_id,
        })
    }

    async fn send_last_resort(
        &self,
        recipient: &Recipient,
        document: &Document,
    ) -> Result<SentMessage, ChannelError> {
        let channel = self
            .last_resort
            .as_ref()
            .ok_or_else(|| ChannelError::unavailable("last-resort channel not configured"))?;

        let preview = Preview::from_document(document, &self.options.summary);
        channel.send_preview(&recipient.id, &preview).await?;
        Ok(SentMessage::Preview)
    }
}
