//! Inbound message routing.
//!
//! Every message from the chat gateway lands here and is classified as
//! starting a session, continuing one, or irrelevant. Starts happen in
//! the monitored channel; continuations happen in threads that carry a
//! live session. Everything else is dropped without a reply.

use std::sync::Arc;

use sandbox_relay_core::format::format_result;
use sandbox_relay_core::session::Session;
use sandbox_relay_core::title::derive_thread_title;
use sandbox_relay_core::traits::{ExecutionError, GatewayError};
use sandbox_relay_core::{ChatGateway, ExecutionProvider, ExecutionRequest, InboundMessage};
use tracing::{debug, info, warn};

use crate::store::SessionStore;

/// Acknowledgement posted to the origin channel when a session starts.
pub const STARTING_NOTICE: &str = "Starting sandbox session...";

/// Acknowledgement posted to the thread while a continuation runs.
pub const THINKING_NOTICE: &str = "Thinking...";

/// Posted to the origin channel when thread creation fails.
pub const START_FAILED_NOTICE: &str = "Failed to start sandbox session.";

/// Routing failure for a single message.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

/// What a message means to the relay.
enum MessageClass {
    /// Top-level message in the monitored channel.
    Start,
    /// Thread message bound to a live session.
    Continue(Session),
    /// Anything else.
    Ignore,
}

/// Routes inbound messages to session starts and continuations.
pub struct Router<G, P>
where
    G: ChatGateway,
    P: ExecutionProvider,
{
    channel_id: String,
    gateway: Arc<G>,
    provider: Arc<P>,
    store: Arc<SessionStore>,
}

impl<G, P> Router<G, P>
where
    G: ChatGateway,
    P: ExecutionProvider,
{
    /// Create a router watching `channel_id` for new sessions.
    #[must_use]
    pub fn new(
        channel_id: impl Into<String>,
        gateway: Arc<G>,
        provider: Arc<P>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            gateway,
            provider,
            store,
        }
    }

    /// Handle one inbound message end to end.
    ///
    /// # Errors
    /// Returns an error when a gateway call fails after the point of no
    /// return, or when the provider rejects the request outright. Ordinary
    /// execution failures are relayed as messages and are not errors here.
    pub async fn dispatch(&self, message: InboundMessage) -> Result<(), RouterError> {
        match self.classify(&message).await {
            MessageClass::Start => self.start_session(&message).await,
            MessageClass::Continue(session) => self.continue_session(&message, session).await,
            MessageClass::Ignore => Ok(()),
        }
    }

    async fn classify(&self, message: &InboundMessage) -> MessageClass {
        if message.content.trim().is_empty() {
            debug!(message_id = %message.id, "ignoring message without text content");
            return MessageClass::Ignore;
        }
        if !message.is_thread {
            if message.channel_id == self.channel_id {
                return MessageClass::Start;
            }
            return MessageClass::Ignore;
        }
        // Thread messages only matter when the thread carries a session.
        match self.store.get(&message.channel_id).await {
            Some(session) => MessageClass::Continue(session),
            None => MessageClass::Ignore,
        }
    }

    /// Open a thread, acknowledge, then run the prompt in a fresh context.
    ///
    /// The thread and the acknowledgement are posted before the provider
    /// call so the user sees feedback while execution runs.
    async fn start_session(&self, message: &InboundMessage) -> Result<(), RouterError> {
        let title = derive_thread_title(&message.content);
        let thread_id = match self
            .gateway
            .create_thread_from_message(&message.channel_id, &message.id, &title)
            .await
        {
            Ok(thread_id) => thread_id,
            Err(err) => {
                warn!(error = %err, message_id = %message.id, "thread creation failed");
                if let Err(notice_err) = self
                    .gateway
                    .send_message(&message.channel_id, START_FAILED_NOTICE)
                    .await
                {
                    warn!(error = %notice_err, "could not post start-failure notice");
                }
                return Err(err.into());
            }
        };

        self.gateway
            .send_message(&message.channel_id, STARTING_NOTICE)
            .await?;

        let request = ExecutionRequest::new(message.content.as_str());
        let result = self.provider.execute(request).await?;

        if result.success {
            info!(
                thread_id = %thread_id,
                session_id = %result.session_id,
                sandbox_id = %result.sandbox_id,
                duration_ms = result.duration_ms,
                "session started"
            );
            self.store
                .create(Session::new(
                    thread_id.as_str(),
                    result.session_id.as_str(),
                    result.sandbox_id.as_str(),
                ))
                .await;
        } else {
            warn!(thread_id = %thread_id, "session start execution failed");
        }

        self.gateway
            .send_message(&thread_id, &format_result(&result))
            .await?;
        Ok(())
    }

    /// Run a follow-up prompt against the thread's existing context.
    async fn continue_session(
        &self,
        message: &InboundMessage,
        session: Session,
    ) -> Result<(), RouterError> {
        self.gateway
            .send_message(&message.channel_id, THINKING_NOTICE)
            .await?;

        let request = ExecutionRequest::new(message.content.as_str())
            .with_context(session.execution_context());
        let result = self.provider.execute(request).await?;

        if result.success {
            self.store.touch(&message.channel_id).await;
            debug!(
                thread_id = %message.channel_id,
                session_id = %session.session_id,
                duration_ms = result.duration_ms,
                "continuation completed"
            );
        } else {
            warn!(
                thread_id = %message.channel_id,
                session_id = %session.session_id,
                "continuation execution failed"
            );
        }

        self.gateway
            .send_message(&message.channel_id, &format_result(&result))
            .await?;
        Ok(())
    }
}
