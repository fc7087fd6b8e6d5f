//! Update/replace of previously delivered cards
//!
//! In-place replacement is only possible through the continuation channel.
//! Messages sent by the fallback channel are re-sent as a new message into
//! the same conversation, and the receipt flags the degradation. An
//! in-place target that also knows a fallback conversation degrades the same
//! way when the continuation channel cannot replace it.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use card_types::{ContinuationContext, Document};

use crate::channel::ChannelKind;
use crate::error::{ChannelError, DeliveryError};
use crate::orchestrator::{DeliveryOrchestrator, DeliveryReceipt, SentMessage};
use crate::store::INSTALLATION_KEY;

/// How a delivered card can be updated later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplaceTarget {
    InPlace {
        message_id: Option<String>,
        context: Option<ContinuationContext>,
        /// Where to re-send when in-place replacement is impossible
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_conversation_id: Option<String>,
    },
    Resend {
        conversation_id: String,
        previous_message_id: String,
    },
}

impl SentMessage {
    /// Update path for this message; previews have none
    pub fn replace_target(&self) -> Option<ReplaceTarget> {
        match self {
            SentMessage::Sent {
                activity_id,
                context,
            } => Some(ReplaceTarget::InPlace {
                message_id: Some(activity_id.clone()),
                context: Some(context.clone()),
                fallback_conversation_id: None,
            }),
            SentMessage::SentNoReplace {
                message_id,
                conversation_id,
            } => Some(ReplaceTarget::Resend {
                conversation_id: conversation_id.clone(),
                previous_message_id: message_id.clone(),
            }),
            SentMessage::Preview => None,
        }
    }
}

impl ReplaceTarget {
    /// Let an in-place target re-send into `conversation_id` when it cannot
    /// be replaced. Resend targets are returned unchanged.
    pub fn with_fallback_conversation(self, conversation_id: impl Into<String>) -> Self {
        match self {
            ReplaceTarget::InPlace {
                message_id,
                context,
                ..
            } => ReplaceTarget::InPlace {
                message_id,
                context,
                fallback_conversation_id: Some(conversation_id.into()),
            },
            resend => resend,
        }
    }
}

impl DeliveryReceipt {
    pub fn replace_target(&self) -> Option<ReplaceTarget> {
        self.sent.replace_target()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Replaced,
    /// A new message was sent; the old one is still there
    SentAsNew,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReceipt {
    pub status: UpdateStatus,
    pub method: ChannelKind,
    /// Id that was replaced, or the id of the new message
    pub used_id: String,
    /// Message the new one stands in for, when degraded
    pub degraded_from: Option<String>,
}

impl DeliveryOrchestrator {
    /// Replace a delivered card in place.
    ///
    /// Candidate ids are the explicit `message_id` followed by the id embedded
    /// in `context` when it differs; the first that the channel accepts wins.
    /// Routing fields missing from `context` are filled from the stored
    /// installation context.
    pub async fn update(
        &self,
        message_id: Option<&str>,
        context: Option<&ContinuationContext>,
        document: &Document,
    ) -> Result<UpdateReceipt, DeliveryError> {
        let mut candidates: Vec<String> = Vec::new();
        if let Some(id) = message_id.filter(|id| !id.is_empty()) {
            candidates.push(id.to_string());
        }
        if let Some(id) = context.and_then(ContinuationContext::activity_id) {
            if !candidates.iter().any(|c| c == id) {
                candidates.push(id.to_string());
            }
        }
        if candidates.is_empty() {
            return Err(DeliveryError::ReplacementTargetUnknown);
        }

        let unusable = |reason: &str| DeliveryError::ReplacementFailed {
            tried: Vec::new(),
            source: ChannelError::unavailable(reason),
        };

        let channel = self
            .primary
            .as_ref()
            .ok_or_else(|| unusable("continuation channel not configured"))?;

        let installation = self.store.get(INSTALLATION_KEY).await;
        let routing = match (context, installation) {
            (Some(own), Some(stored)) => own.merge_missing_from(&stored),
            (Some(own), None) => own.clone(),
            (None, Some(stored)) => stored,
            (None, None) => return Err(unusable("no continuation context")),
        };
        if routing.service_url().is_none() {
            return Err(unusable("continuation context has no serviceUrl"));
        }

        let mut last_error = None;
        for id in &candidates {
            let pointed = routing.with_activity_id(id);
            match self
                .bounded(channel.update_activity(&pointed, id, document))
                .await
            {
                Ok(()) => {
                    info!(activity_id = %id, "Replaced card in place");
                    return Ok(UpdateReceipt {
                        status: UpdateStatus::Replaced,
                        method: ChannelKind::Primary,
                        used_id: id.clone(),
                        degraded_from: None,
                    });
                }
                Err(e) => {
                    warn!(activity_id = %id, error = %e, "In-place update failed");
                    last_error = Some(e);
                }
            }
        }

        Err(DeliveryError::ReplacementFailed {
            tried: candidates,
            source: last_error
                .unwrap_or_else(|| ChannelError::unavailable("no candidate id was tried")),
        })
    }

    /// Replace in place, or re-send into `fallback_conversation_id` when the
    /// continuation channel is missing, the routing is unusable, or every
    /// candidate id was rejected.
    ///
    /// An unknown target is never re-sent; there is no message to stand in
    /// for.
    pub async fn update_or_resend(
        &self,
        message_id: Option<&str>,
        context: Option<&ContinuationContext>,
        fallback_conversation_id: Option<&str>,
        document: &Document,
    ) -> Result<UpdateReceipt, DeliveryError> {
        let err = match self.update(message_id, context, document).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) => e,
        };
        if !matches!(err, DeliveryError::ReplacementFailed { .. }) || self.fallback.is_none() {
            return Err(err);
        }
        let Some(conversation_id) = fallback_conversation_id else {
            return Err(err);
        };
        let previous = message_id
            .filter(|id| !id.is_empty())
            .or_else(|| context.and_then(ContinuationContext::activity_id));
        let Some(previous) = previous else {
            return Err(err);
        };

        warn!(
            activity_id = previous,
            error = %err,
            "In-place replacement impossible, re-sending through fallback"
        );
        self.resend(conversation_id, previous, document).await
    }

    /// Update through whatever path the original delivery allows
    pub async fn update_target(
        &self,
        target: &ReplaceTarget,
        document: &Document,
    ) -> Result<UpdateReceipt, DeliveryError> {
        match target {
            ReplaceTarget::InPlace {
                message_id,
                context,
                fallback_conversation_id,
            } => {
                self.update_or_resend(
                    message_id.as_deref(),
                    context.as_ref(),
                    fallback_conversation_id.as_deref(),
                    document,
                )
                .await
            }
            ReplaceTarget::Resend {
                conversation_id,
                previous_message_id,
            } => {
                self.resend(conversation_id, previous_message_id, document)
                    .await
            }
        }
    }

    async fn resend(
        &self,
        conversation_id: &str,
        previous_message_id: &str,
        document: &Document,
    ) -> Result<UpdateReceipt, DeliveryError> {
        let failed = |source| DeliveryError::ReplacementFailed {
            tried: vec![previous_message_id.to_string()],
            source,
        };

        let channel = self
            .fallback
            .as_ref()
            .ok_or_else(|| failed(ChannelError::unavailable("fallback channel not configured")))?;

        let message_id = self
            .bounded(channel.send_document(conversation_id, &self.options.summary, document))
            .await
            .map_err(failed)?;

        warn!(
            previous = previous_message_id,
            new = %message_id,
            "Card could not be replaced in place, sent as a new message"
        );

        Ok(UpdateReceipt {
            status: UpdateStatus::SentAsNew,
            method: ChannelKind::Fallback,
            used_id: message_id,
            degraded_from: Some(previous_message_id.to_string()),
        })
    }
}
