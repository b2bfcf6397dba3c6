//! Inbound chat messages as seen by the router.

use serde::{Deserialize, Serialize};

/// A message event delivered by the chat gateway.
///
/// Bot-authored messages are filtered out before construction, so every
/// value of this type represents a human prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id.
    pub id: String,
    /// Raw message text.
    pub content: String,
    /// Author id (never the bot itself).
    pub author_id: String,
    /// Channel the message arrived in; for thread messages this is the
    /// thread id.
    pub channel_id: String,
    /// Whether `channel_id` refers to a thread.
    pub is_thread: bool,
    /// Parent channel when `is_thread` is set.
    pub parent_channel_id: Option<String>,
}
