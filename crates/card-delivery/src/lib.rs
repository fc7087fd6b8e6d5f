//! Multi-Channel Delivery Orchestrator
//!
//! Sends a composed card to a recipient through an ordered channel chain:
//!
//! 1. **Primary**: conversational continuation using a stored context
//! 2. **Fallback**: directory-based conversation lookup/creation, then send
//! 3. **Last resort** (optional): a reduced-fidelity text preview
//!
//! Channels are tried one at a time, never concurrently; a duplicate message
//! in two channels is a user-visible defect. Only exhaustion of the whole
//! chain is an error, and it carries every channel's failure.
//!
//! Previously delivered cards can be replaced in place through the primary
//! channel. Messages the primary channel never sent can only be re-sent as a
//! new message, and the receipt says so.

pub mod channel;
mod error;
pub mod orchestrator;
pub mod preview;
pub mod replace;
pub mod store;

#[cfg(test)]
mod testing;

pub use channel::{
    ChannelKind, ContinuationChannel, ConversationParams, Directory, FallbackChannel,
    LastResortChannel,
};
pub use error::{ChannelError, DeliveryError};
pub use orchestrator::{
    DeliveryAttempt, DeliveryOptions, DeliveryOrchestrator, DeliveryReceipt, DeliveryState,
    SentMessage,
};
pub use preview::Preview;
pub use replace::{ReplaceTarget, UpdateReceipt, UpdateStatus};
pub use store::{ContinuationStore, InMemoryContinuationStore, INSTALLATION_KEY};
