//! Channel abstractions
//!
//! Each delivery path is an external collaborator behind an async trait, so
//! transports (bot connector, directory API, mail) plug in without the
//! orchestrator knowing about HTTP or credentials.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use card_types::{ContinuationContext, Document, Recipient};

use crate::error::ChannelError;
use crate::preview::Preview;

/// Which channel of the chain produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Primary,
    Fallback,
    LastResort,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Primary => "primary",
            ChannelKind::Fallback => "fallback",
            ChannelKind::LastResort => "last_resort",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a recipient address to a directory identity
#[async_trait]
pub trait Directory: Send + Sync {
    /// `Ok(None)` when the address is unknown
    async fn find_recipient(&self, address: &str) -> Result<Option<Recipient>, ChannelError>;
}

/// Parameters for opening a one-to-one conversation from an
/// installation-wide context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParams {
    pub members: Vec<String>,
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl ConversationParams {
    pub fn for_member(member_id: impl Into<String>) -> Self {
        Self {
            members: vec![member_id.into()],
            is_group: false,
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }
}

/// Conversational channel able to address a conversation proactively and
/// edit messages it sent
#[async_trait]
pub trait ContinuationChannel: Send + Sync {
    /// Open a conversation with the params' members; returns a context for it
    async fn create_conversation(
        &self,
        context: &ContinuationContext,
        params: &ConversationParams,
    ) -> Result<ContinuationContext, ChannelError>;

    /// Send a card into the conversation; returns the message id
    async fn send_activity(
        &self,
        context: &ContinuationContext,
        document: &Document,
    ) -> Result<String, ChannelError>;

    /// Replace a previously sent message
    async fn update_activity(
        &self,
        context: &ContinuationContext,
        activity_id: &str,
        document: &Document,
    ) -> Result<(), ChannelError>;
}

/// Directory-based channel: one-to-one chats addressed by recipient id
#[async_trait]
pub trait FallbackChannel: Send + Sync {
    /// Returns the chat id
    async fn find_or_create_conversation(&self, recipient_id: &str) -> Result<String, ChannelError>;

    /// Post a card with a short text summary; returns the message id
    async fn send_document(
        &self,
        conversation_id: &str,
        summary: &str,
        document: &Document,
    ) -> Result<String, ChannelError>;
}

/// Preview-only channel (mail, push) with no interactivity
#[async_trait]
pub trait LastResortChannel: Send + Sync {
    async fn send_preview(&self, recipient_id: &str, preview: &Preview) -> Result<(), ChannelError>;
}
