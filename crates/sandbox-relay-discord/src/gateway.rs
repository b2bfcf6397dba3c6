//! Discord gateway connection.
//!
//! Maintains the websocket session against the Discord gateway:
//! identify, heartbeats, dispatch handling, and reconnection after a
//! fixed delay. Message events are converted to [`InboundMessage`]
//! values and forwarded over a channel; thread lifecycle events keep a
//! local thread-to-parent map used for that conversion.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use sandbox_relay_core::InboundMessage;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::{
    self, close_code, GatewayBotResponse, GatewayPayload, GuildCreate, HelloPayload, MessageCreate,
    opcode, ReadyPayload, ThreadObject,
};
use crate::rest::API_BASE;

/// Delay before reconnecting after a dropped connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long to wait for the hello frame on a fresh connection.
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Unrecoverable gateway failures. Everything else reconnects.
#[derive(Debug, thiserror::Error)]
pub enum GatewayClientError {
    #[error("Discord rejected the bot token")]
    AuthenticationFailed,
    #[error("Discord refused the requested intents (close code {0})")]
    DisallowedIntents(u16),
    #[error("inbound message channel closed")]
    ChannelClosed,
}

/// Why a single connection ended.
enum ConnectionEnd {
    Reconnect,
    Fatal(GatewayClientError),
}

enum FetchUrlError {
    Unauthorized,
    Other(String),
}

/// Long-lived gateway connection producing inbound messages.
pub struct GatewayClient {
    token: String,
    http: reqwest::Client,
    bot_user_id: Option<String>,
    /// Known threads, mapped to their parent channel when Discord
    /// provided one.
    threads: HashMap<String, Option<String>>,
}

impl GatewayClient {
    /// Create a disconnected client for the given bot token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            http: reqwest::Client::new(),
            bot_user_id: None,
            threads: HashMap::new(),
        }
    }

    /// Connect and forward inbound messages to `tx` until an
    /// unrecoverable failure occurs.
    ///
    /// Network drops and server-requested reconnects are retried after a
    /// fixed delay.
    ///
    /// # Errors
    /// Returns an error when the token is rejected, the intents are
    /// refused, or the receiving side of `tx` is gone.
    pub async fn run(
        &mut self,
        tx: mpsc::Sender<InboundMessage>,
    ) -> Result<(), GatewayClientError> {
        loop {
            let url = match self.fetch_gateway_url().await {
                Ok(url) => url,
                Err(FetchUrlError::Unauthorized) => {
                    return Err(GatewayClientError::AuthenticationFailed);
                }
                Err(FetchUrlError::Other(error)) => {
                    warn!(error = %error, "gateway URL discovery failed, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };
            let url = format!("{url}/?v=10&encoding=json");

            match self.run_connection(&url, &tx).await {
                ConnectionEnd::Reconnect => {
                    info!("gateway connection ended, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
                ConnectionEnd::Fatal(error) => return Err(error),
            }
        }
    }

    async fn fetch_gateway_url(&self) -> Result<String, FetchUrlError> {
        let response = self
            .http
            .get(format!("{API_BASE}/gateway/bot"))
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| FetchUrlError::Other(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchUrlError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchUrlError::Other(format!("HTTP {status}")));
        }

        let info: GatewayBotResponse = response
            .json()
            .await
            .map_err(|e| FetchUrlError::Other(e.to_string()))?;
        Ok(info.url)
    }

    async fn run_connection(
        &mut self,
        url: &str,
        tx: &mpsc::Sender<InboundMessage>,
    ) -> ConnectionEnd {
        let (mut socket, _) = match connect_async(url).await {
            Ok(pair) => pair,
            Err(error) => {
                warn!(error = %error, "gateway connect failed");
                return ConnectionEnd::Reconnect;
            }
        };
        info!("gateway connected");

        let Some(hello) = wait_for_hello(&mut socket).await else {
            warn!("gateway closed before hello");
            return ConnectionEnd::Reconnect;
        };
        // A zero interval would panic the timer.
        let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval.max(1));

        let identify = protocol::build_identify(&self.token);
        if let Err(error) = socket.send(Message::Text(identify.to_string())).await {
            warn!(error = %error, "identify send failed");
            return ConnectionEnd::Reconnect;
        }

        // The first heartbeat goes out after a random fraction of the
        // interval, as the gateway requires.
        let jitter = heartbeat_interval.mul_f64(fastrand::f64());
        let mut heartbeat = interval_at(Instant::now() + jitter, heartbeat_interval);
        let mut sequence: Option<u64> = None;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = protocol::build_heartbeat(sequence);
                    if let Err(error) = socket.send(Message::Text(beat.to_string())).await {
                        warn!(error = %error, "heartbeat send failed");
                        return ConnectionEnd::Reconnect;
                    }
                }
                frame = socket.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let payload: GatewayPayload = match serde_json::from_str(&text) {
                                Ok(payload) => payload,
                                Err(error) => {
                                    debug!(error = %error, "skipping unparseable gateway frame");
                                    continue;
                                }
                            };
                            if let Some(s) = payload.s {
                                sequence = Some(s);
                            }
                            match payload.op {
                                opcode::DISPATCH => {
                                    if let Err(fatal) = self.handle_dispatch(payload, tx).await {
                                        return ConnectionEnd::Fatal(fatal);
                                    }
                                }
                                opcode::HEARTBEAT => {
                                    let beat = protocol::build_heartbeat(sequence);
                                    if let Err(error) = socket.send(Message::Text(beat.to_string())).await {
                                        warn!(error = %error, "requested heartbeat send failed");
                                        return ConnectionEnd::Reconnect;
                                    }
                                }
                                opcode::RECONNECT | opcode::INVALID_SESSION => {
                                    info!(op = payload.op, "server requested a fresh connection");
                                    return ConnectionEnd::Reconnect;
                                }
                                opcode::HEARTBEAT_ACK => {}
                                other => debug!(op = other, "ignoring gateway opcode"),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return classify_close(frame.as_ref().map(|f| f.code.into()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            warn!(error = %error, "gateway read failed");
                            return ConnectionEnd::Reconnect;
                        }
                        None => {
                            warn!("gateway stream ended");
                            return ConnectionEnd::Reconnect;
                        }
                    }
                }
            }
        }
    }

    async fn handle_dispatch(
        &mut self,
        payload: GatewayPayload,
        tx: &mpsc::Sender<InboundMessage>,
    ) -> Result<(), GatewayClientError> {
        let Some(event) = payload.t.as_deref() else {
            return Ok(());
        };
        let data = payload.d.unwrap_or(Value::Null);

        match event {
            "READY" => {
                if let Ok(ready) = serde_json::from_value::<ReadyPayload>(data) {
                    info!(bot_user_id = %ready.user.id, "gateway ready");
                    self.bot_user_id = Some(ready.user.id);
                }
            }
            "MESSAGE_CREATE" => {
                if let Ok(message) = serde_json::from_value::<MessageCreate>(data) {
                    if let Some(inbound) = self.to_inbound(message) {
                        if tx.send(inbound).await.is_err() {
                            return Err(GatewayClientError::ChannelClosed);
                        }
                    }
                }
            }
            "GUILD_CREATE" => {
                if let Ok(guild) = serde_json::from_value::<GuildCreate>(data) {
                    for thread in guild.threads {
                        self.track_thread(thread);
                    }
                }
            }
            "THREAD_CREATE" => {
                if let Ok(thread) = serde_json::from_value::<ThreadObject>(data) {
                    self.track_thread(thread);
                }
            }
            "THREAD_DELETE" => {
                if let Ok(thread) = serde_json::from_value::<ThreadObject>(data) {
                    self.threads.remove(&thread.id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn track_thread(&mut self, thread: ThreadObject) {
        debug!(thread_id = %thread.id, "tracking thread");
        self.threads.insert(thread.id, thread.parent_id);
    }

    /// Convert a message event into an [`InboundMessage`], dropping bot
    /// authors and the relay's own messages.
    fn to_inbound(&self, message: MessageCreate) -> Option<InboundMessage> {
        if message.author.bot {
            return None;
        }
        if self.bot_user_id.as_deref() == Some(message.author.id.as_str()) {
            return None;
        }

        let parent = self.threads.get(&message.channel_id).cloned();
        Some(InboundMessage {
            id: message.id,
            content: message.content,
            author_id: message.author.id,
            channel_id: message.channel_id,
            is_thread: parent.is_some(),
            parent_channel_id: parent.flatten(),
        })
    }
}

/// Read frames until the hello payload arrives or the timeout elapses.
async fn wait_for_hello(socket: &mut WsStream) -> Option<HelloPayload> {
    let hello = async {
        while let Some(frame) = socket.next().await {
            let Ok(Message::Text(text)) = frame else {
                continue;
            };
            let Ok(payload) = serde_json::from_str::<GatewayPayload>(&text) else {
                continue;
            };
            if payload.op == opcode::HELLO {
                return payload
                    .d
                    .and_then(|d| serde_json::from_value::<HelloPayload>(d).ok());
            }
        }
        None
    };
    timeout(HELLO_TIMEOUT, hello).await.ok().flatten()
}

fn classify_close(code: Option<u16>) -> ConnectionEnd {
    match code {
        Some(close_code::AUTHENTICATION_FAILED) => {
            ConnectionEnd::Fatal(GatewayClientError::AuthenticationFailed)
        }
        Some(code @ (close_code::INVALID_INTENTS | close_code::DISALLOWED_INTENTS)) => {
            ConnectionEnd::Fatal(GatewayClientError::DisallowedIntents(code))
        }
        other => {
            info!(code = ?other, "gateway closed");
            ConnectionEnd::Reconnect
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(author_id: &str, bot: bool, channel_id: &str) -> MessageCreate {
        serde_json::from_value(json!({
            "id": "m1",
            "channel_id": channel_id,
            "content": "hello",
            "author": {"id": author_id, "bot": bot},
        }))
        .unwrap()
    }

    #[test]
    fn bot_authors_are_dropped() {
        let client = GatewayClient::new("t");
        assert!(client.to_inbound(message("42", true, "c1")).is_none());
    }

    #[test]
    fn own_messages_are_dropped() {
        let mut client = GatewayClient::new("t");
        client.bot_user_id = Some("me".into());
        assert!(client.to_inbound(message("me", false, "c1")).is_none());
    }

    #[test]
    fn tracked_thread_marks_the_message() {
        let mut client = GatewayClient::new("t");
        client.track_thread(ThreadObject {
            id: "th-1".into(),
            parent_id: Some("chan-1".into()),
        });

        let inbound = client.to_inbound(message("42", false, "th-1")).unwrap();
        assert!(inbound.is_thread);
        assert_eq!(inbound.parent_channel_id.as_deref(), Some("chan-1"));
    }

    #[test]
    fn untracked_channel_is_top_level() {
        let client = GatewayClient::new("t");
        let inbound = client.to_inbound(message("42", false, "chan-1")).unwrap();
        assert!(!inbound.is_thread);
        assert!(inbound.parent_channel_id.is_none());
    }

    #[test]
    fn auth_failure_close_is_fatal() {
        assert!(matches!(
            classify_close(Some(close_code::AUTHENTICATION_FAILED)),
            ConnectionEnd::Fatal(GatewayClientError::AuthenticationFailed)
        ));
    }

    #[test]
    fn intent_closes_are_fatal_with_the_code() {
        assert!(matches!(
            classify_close(Some(close_code::DISALLOWED_INTENTS)),
            ConnectionEnd::Fatal(GatewayClientError::DisallowedIntents(4014))
        ));
        assert!(matches!(
            classify_close(Some(close_code::INVALID_INTENTS)),
            ConnectionEnd::Fatal(GatewayClientError::DisallowedIntents(4013))
        ));
    }

    #[test]
    fn ordinary_closes_reconnect() {
        assert!(matches!(classify_close(Some(1000)), ConnectionEnd::Reconnect));
        assert!(matches!(classify_close(None), ConnectionEnd::Reconnect));
    }

    #[tokio::test]
    async fn message_dispatch_forwards_to_the_channel() {
        let mut client = GatewayClient::new("t");
        let (tx, mut rx) = mpsc::channel(1);

        let payload: GatewayPayload = serde_json::from_value(json!({
            "op": 0,
            "t": "MESSAGE_CREATE",
            "s": 3,
            "d": {
                "id": "m1",
                "channel_id": "chan-1",
                "content": "run it",
                "author": {"id": "42", "bot": false},
            }
        }))
        .unwrap();

        client.handle_dispatch(payload, &tx).await.unwrap();
        let inbound = rx.recv().await.unwrap();
        assert_eq!(inbound.content, "run it");
        assert_eq!(inbound.channel_id, "chan-1");
    }

    #[tokio::test]
    async fn thread_delete_untracks_the_thread() {
        let mut client = GatewayClient::new("t");
        let (tx, _rx) = mpsc::channel(1);
        client.track_thread(ThreadObject {
            id: "th-1".into(),
            parent_id: Some("chan-1".into()),
        });

        let payload: GatewayPayload = serde_json::from_value(json!({
            "op": 0,
            "t": "THREAD_DELETE",
            "d": {"id": "th-1", "parent_id": "chan-1"},
        }))
        .unwrap();
        client.handle_dispatch(payload, &tx).await.unwrap();

        let inbound = client.to_inbound(message("42", false, "th-1")).unwrap();
        assert!(!inbound.is_thread);
    }
}
