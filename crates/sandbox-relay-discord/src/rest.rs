//! Discord REST API client.
//!
//! Implements the outbound [`ChatGateway`] side of the relay: creating
//! threads from messages and posting plain-text messages.

use async_trait::async_trait;
use sandbox_relay_core::ChatGateway;
use sandbox_relay_core::session::ThreadId;
use sandbox_relay_core::traits::GatewayError;
use serde::Deserialize;
use serde_json::json;

/// Base URL for the Discord REST API.
pub(crate) const API_BASE: &str = "https://discord.com/api/v10";

/// Threads auto-archive after a day without activity.
const THREAD_AUTO_ARCHIVE_MIN: u32 = 1440;

/// Thin wrapper around the Discord REST API.
pub struct DiscordApi {
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    id: String,
}

impl DiscordApi {
    /// Create a client authenticating as the given bot.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<String, GatewayError> {
        let url = format!("{API_BASE}{path}");
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn thread_request_body(title: &str) -> serde_json::Value {
    json!({
        "name": title,
        "auto_archive_duration": THREAD_AUTO_ARCHIVE_MIN,
    })
}

#[async_trait]
impl ChatGateway for DiscordApi {
    async fn create_thread_from_message(
        &self,
        channel_id: &str,
        message_id: &str,
        title: &str,
    ) -> Result<ThreadId, GatewayError> {
        let path = format!("/channels/{channel_id}/messages/{message_id}/threads");
        let text = self.post_json(&path, &thread_request_body(title)).await?;
        let channel: ChannelResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Request(format!("malformed thread response: {e}")))?;
        Ok(channel.id)
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        let path = format!("/channels/{channel_id}/messages");
        self.post_json(&path, &json!({ "content": text })).await?;
        Ok(())
    }
}
