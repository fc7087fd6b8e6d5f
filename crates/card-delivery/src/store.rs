//! Continuation context store
//!
//! Remembers how to reach a recipient proactively. Injected into the
//! orchestrator; entries expire after a TTL so a stale context is treated as
//! absent instead of being retried forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use card_types::ContinuationContext;

/// Key of the installation-wide context, captured when the app was installed
/// or first messaged. Used to open conversations with any user.
pub const INSTALLATION_KEY: &str = "__installation__";

#[async_trait]
pub trait ContinuationStore: Send + Sync {
    /// Context stored under `key`, if present and not expired
    async fn get(&self, key: &str) -> Option<ContinuationContext>;

    async fn put(&self, key: &str, context: ContinuationContext);

    async fn remove(&self, key: &str) -> Option<ContinuationContext>;
}

#[derive(Debug, Clone)]
struct Entry {
    context: ContinuationContext,
    stored_at: Instant,
}

/// Process-local store backed by a `RwLock<HashMap>`
#[derive(Debug, Clone)]
pub struct InMemoryContinuationStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Option<Duration>,
}

impl Default for InMemoryContinuationStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl InMemoryContinuationStore {
    /// `ttl: None` keeps entries until replaced or removed
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ContinuationStore for InMemoryContinuationStore {
    async fn get(&self, key: &str) -> Option<ContinuationContext> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if let Some(ttl) = self.ttl {
            if entry.stored_at.elapsed() >= ttl {
                debug!(key, "Continuation context expired");
                return None;
            }
        }
        Some(entry.context.clone())
    }

    async fn put(&self, key: &str, context: ContinuationContext) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                context,
                stored_at: Instant::now(),
            },
        );
    }

    async fn remove(&self, key: &str) -> Option<ContinuationContext> {
        let mut entries = self.entries.write().await;
        entries.remove(key).map(|e| e.context)
    }
}
