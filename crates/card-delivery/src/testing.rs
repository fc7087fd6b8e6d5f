//! In-memory channel fakes for unit tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use card_types::{ContinuationContext, Document, Recipient};

use crate::channel::{
    ContinuationChannel, ConversationParams, Directory, FallbackChannel, LastResortChannel,
};
use crate::error::ChannelError;
use crate::preview::Preview;

pub struct FakeDirectory;

#[async_trait]
impl Directory for FakeDirectory {
    async fn find_recipient(&self, address: &str) -> Result<Option<Recipient>, ChannelError> {
        Ok((address == "ada@example.com")
            .then(|| Recipient::new("user-1", address).with_display_name("Ada")))
    }
}

pub fn directory() -> Arc<dyn Directory> {
    Arc::new(FakeDirectory)
}

pub fn conversation_ctx(id: &str) -> ContinuationContext {
    ContinuationContext::new(json!({
        "serviceUrl": "https://smba.example/",
        "channelId": "msteams",
        "conversation": { "id": id }
    }))
}

#[derive(Default)]
pub struct FakeContinuation {
    pub send_error: Option<ChannelError>,
    pub delay: Option<Duration>,
    /// Activity ids `update_activity` accepts; empty accepts all
    pub updatable: HashSet<String>,
    pub created: Mutex<Vec<ConversationParams>>,
    pub sent: Mutex<Vec<(ContinuationContext, Document)>>,
    pub updates: Mutex<Vec<(ContinuationContext, String)>>,
    counter: AtomicUsize,
}

impl FakeContinuation {
    pub fn failing_sends(error: ChannelError) -> Self {
        Self {
            send_error: Some(error),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn accepting_updates(ids: &[&str]) -> Self {
        Self {
            updatable: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContinuationChannel for FakeContinuation {
    async fn create_conversation(
        &self,
        _context: &ContinuationContext,
        params: &ConversationParams,
    ) -> Result<ContinuationContext, ChannelError> {
        self.created.lock().unwrap().push(params.clone());
        Ok(conversation_ctx(&format!("conv-{}", params.members[0])))
    }

    async fn send_activity(
        &self,
        context: &ContinuationContext,
        document: &Document,
    ) -> Result<String, ChannelError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = &self.send_error {
            return Err(e.clone());
        }
        self.sent
            .lock()
            .unwrap()
            .push((context.clone(), document.clone()));
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("act-{n}"))
    }

    async fn update_activity(
        &self,
        context: &ContinuationContext,
        activity_id: &str,
        _document: &Document,
    ) -> Result<(), ChannelError> {
        if !self.updatable.is_empty() && !self.updatable.contains(activity_id) {
            return Err(ChannelError::rejected(format!("unknown activity {activity_id}")));
        }
        self.updates
            .lock()
            .unwrap()
            .push((context.clone(), activity_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFallback {
    pub error: Option<ChannelError>,
    /// (conversation id, summary, document)
    pub sent: Mutex<Vec<(String, String, Document)>>,
    counter: AtomicUsize,
}

impl FakeFallback {
    pub fn failing(error: ChannelError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FallbackChannel for FakeFallback {
    async fn find_or_create_conversation(&self, recipient_id: &str) -> Result<String, ChannelError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(format!("chat-{recipient_id}")),
        }
    }

    async fn send_document(
        &self,
        conversation_id: &str,
        summary: &str,
        document: &Document,
    ) -> Result<String, ChannelError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        self.sent.lock().unwrap().push((
            conversation_id.to_string(),
            summary.to_string(),
            document.clone(),
        ));
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("msg-{n}"))
    }
}

#[derive(Default)]
pub struct FakeLastResort {
    pub error: Option<ChannelError>,
    pub previews: Mutex<Vec<(String, Preview)>>,
}

impl FakeLastResort {
    pub fn failing(error: ChannelError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LastResortChannel for FakeLastResort {
    async fn send_preview(&self, recipient_id: &str, preview: &Preview) -> Result<(), ChannelError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        self.previews
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), preview.clone()));
        Ok(())
    }
}
