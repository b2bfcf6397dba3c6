//! Discord gateway wire types (API v10).
//!
//! Only the events and opcodes the relay acts on are modeled; everything
//! else is carried as raw JSON and ignored.

use serde::Deserialize;
use serde_json::{json, Value};

/// Gateway opcodes the relay handles.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes that mean the configuration is wrong and a reconnect
/// cannot help.
pub mod close_code {
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;
}

/// Guilds, guild messages and message content.
pub const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

/// Envelope for every gateway frame.
#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

/// Opcode 10 payload.
#[derive(Debug, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat cadence in milliseconds.
    pub heartbeat_interval: u64,
}

/// READY dispatch payload, reduced to the bot identity.
#[derive(Debug, Deserialize)]
pub struct ReadyPayload {
    pub user: ReadyUser,
}

#[derive(Debug, Deserialize)]
pub struct ReadyUser {
    pub id: String,
}

/// MESSAGE_CREATE dispatch payload.
#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    /// Empty unless the message-content intent is granted.
    #[serde(default)]
    pub content: String,
    pub author: MessageAuthor,
}

#[derive(Debug, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    #[serde(default)]
    pub bot: bool,
}

/// Channel object reduced to thread-tracking fields. Used for
/// THREAD_CREATE, THREAD_DELETE and the thread lists in GUILD_CREATE.
#[derive(Debug, Deserialize)]
pub struct ThreadObject {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// GUILD_CREATE dispatch payload, reduced to active threads.
#[derive(Debug, Deserialize)]
pub struct GuildCreate {
    #[serde(default)]
    pub threads: Vec<ThreadObject>,
}

/// GET /gateway/bot response.
#[derive(Debug, Deserialize)]
pub struct GatewayBotResponse {
    pub url: String,
}

/// Opcode 2 identify frame.
#[must_use]
pub fn build_identify(token: &str) -> Value {
    json!({
        "op": opcode::IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "sandbox-relay",
                "device": "sandbox-relay",
            }
        }
    })
}

/// Opcode 1 heartbeat frame carrying the last seen sequence.
#[must_use]
pub fn build_heartbeat(sequence: Option<u64>) -> Value {
    json!({ "op": opcode::HEARTBEAT, "d": sequence })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_cover_guilds_messages_and_content() {
        assert_eq!(INTENTS, 33281);
    }

    #[test]
    fn hello_payload_parses() {
        let frame = r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#;
        let payload: GatewayPayload = serde_json::from_str(frame).unwrap();
        assert_eq!(payload.op, opcode::HELLO);

        let hello: HelloPayload = serde_json::from_value(payload.d.unwrap()).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn message_create_parses_with_author_flags() {
        let data = r#"{
            "id": "111",
            "channel_id": "222",
            "content": "hello",
            "author": {"id": "333", "bot": true, "username": "someone"}
        }"#;
        let message: MessageCreate = serde_json::from_str(data).unwrap();
        assert_eq!(message.id, "111");
        assert!(message.author.bot);
    }

    #[test]
    fn message_without_content_defaults_to_empty() {
        let data = r#"{"id":"1","channel_id":"2","author":{"id":"3"}}"#;
        let message: MessageCreate = serde_json::from_str(data).unwrap();
        assert_eq!(message.content, "");
        assert!(!message.author.bot);
    }

    #[test]
    fn guild_create_collects_threads() {
        let data = r#"{
            "id": "999",
            "threads": [
                {"id": "t1", "parent_id": "c1"},
                {"id": "t2"}
            ]
        }"#;
        let guild: GuildCreate = serde_json::from_str(data).unwrap();
        assert_eq!(guild.threads.len(), 2);
        assert_eq!(guild.threads[0].parent_id.as_deref(), Some("c1"));
        assert!(guild.threads[1].parent_id.is_none());
    }

    #[test]
    fn identify_frame_carries_token_and_intents() {
        let frame = build_identify("my-token");
        assert_eq!(frame["op"], u64::from(opcode::IDENTIFY));
        assert_eq!(frame["d"]["token"], "my-token");
        assert_eq!(frame["d"]["intents"], INTENTS);
    }

    #[test]
    fn heartbeat_frame_serializes_missing_sequence_as_null() {
        let frame = build_heartbeat(None);
        assert!(frame["d"].is_null());

        let frame = build_heartbeat(Some(42));
        assert_eq!(frame["d"], 42);
    }
}
