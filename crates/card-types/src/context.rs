//! Delivery addressing types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Routing fields a continuation context needs to reach a conversation.
const ROUTING_FIELDS: [&str; 5] = ["serviceUrl", "channelId", "conversation", "bot", "user"];

/// Opaque, channel-issued token for re-addressing a conversation without the
/// recipient initiating contact.
///
/// The engine treats it as a JSON object and only reads a handful of
/// well-known fields from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationContext(Value);

impl ContinuationContext {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Message id embedded in the context, if any
    pub fn activity_id(&self) -> Option<&str> {
        non_empty(self.0.get("activityId"))
    }

    /// Conversation id embedded in the context, if any
    pub fn conversation_id(&self) -> Option<&str> {
        non_empty(self.0.get("conversation").and_then(|c| c.get("id")))
    }

    pub fn service_url(&self) -> Option<&str> {
        non_empty(self.0.get("serviceUrl"))
    }

    /// Copy of this context pointing at a specific message
    pub fn with_activity_id(&self, activity_id: &str) -> Self {
        let mut value = self.0.clone();
        if let Value::Object(map) = &mut value {
            map.insert("activityId".to_string(), Value::String(activity_id.to_string()));
        }
        Self(value)
    }

    /// Fill absent routing fields (`serviceUrl`, `channelId`, `conversation`,
    /// `bot`, `user`) from another context. Present fields are never replaced.
    pub fn merge_missing_from(&self, other: &ContinuationContext) -> Self {
        let mut merged = match &self.0 {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        for field in ROUTING_FIELDS {
            let missing = merged.get(field).map_or(true, Value::is_null);
            if missing {
                if let Some(value) = other.0.get(field).filter(|v| !v.is_null()) {
                    merged.insert(field.to_string(), value.clone());
                }
            }
        }

        Self(Value::Object(merged))
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// A directory-resolved recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Directory id, used to address the fallback and last-resort channels
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// The address the caller asked for (usually an email)
    pub address: String,
}

impl Recipient {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            address: address.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Display name, falling back to the address
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_ids() {
        let ctx = ContinuationContext::new(json!({
            "activityId": "act-1",
            "conversation": { "id": "conv-9" },
            "serviceUrl": "https://smba.example/"
        }));
        assert_eq!(ctx.activity_id(), Some("act-1"));
        assert_eq!(ctx.conversation_id(), Some("conv-9"));
        assert_eq!(ctx.service_url(), Some("https://smba.example/"));
    }

    #[test]
    fn test_empty_activity_id_reads_as_absent() {
        let ctx = ContinuationContext::new(json!({ "activityId": "" }));
        assert_eq!(ctx.activity_id(), None);
    }

    #[test]
    fn test_merge_missing_keeps_present_fields() {
        let partial = ContinuationContext::new(json!({
            "activityId": "act-1",
            "conversation": { "id": "conv-own" },
            "serviceUrl": null
        }));
        let stored = ContinuationContext::new(json!({
            "serviceUrl": "https://smba.example/",
            "conversation": { "id": "conv-stored" },
            "bot": { "id": "bot-1" }
        }));

        let merged = partial.merge_missing_from(&stored);

        assert_eq!(merged.service_url(), Some("https://smba.example/"));
        assert_eq!(merged.conversation_id(), Some("conv-own"));
        assert_eq!(merged.activity_id(), Some("act-1"));
        assert_eq!(merged.as_value()["bot"]["id"], json!("bot-1"));
    }

    #[test]
    fn test_with_activity_id_does_not_touch_original() {
        let ctx = ContinuationContext::new(json!({ "activityId": "old" }));
        let moved = ctx.with_activity_id("new");
        assert_eq!(ctx.activity_id(), Some("old"));
        assert_eq!(moved.activity_id(), Some("new"));
    }
}
