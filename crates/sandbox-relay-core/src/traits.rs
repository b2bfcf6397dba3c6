//! Trait boundaries toward the chat platform and the execution service.

use async_trait::async_trait;
use thiserror::Error;

use crate::execution::{ExecutionRequest, ExecutionResult};
use crate::session::ThreadId;

/// Chat platform failure surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connection, timeout, serialization).
    #[error("gateway request failed: {0}")]
    Request(String),
    /// The platform answered with a non-success status.
    #[error("gateway returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, useful for diagnosing permission problems.
        body: String,
    },
}

/// Outbound capabilities the router needs from the chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Create a thread anchored to an existing message.
    ///
    /// # Errors
    /// Returns an error when the platform rejects the request or is
    /// unreachable.
    async fn create_thread_from_message(
        &self,
        channel_id: &str,
        message_id: &str,
        title: &str,
    ) -> Result<ThreadId, GatewayError>;

    /// Send plain text to a channel or thread.
    ///
    /// # Errors
    /// Returns an error when the platform rejects the request or is
    /// unreachable.
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), GatewayError>;
}

/// Invalid input handed to an execution provider.
///
/// Ordinary execution failures never use this; they come back as
/// [`ExecutionResult`] values with `success == false`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The prompt was empty after trimming.
    #[error("prompt must not be empty")]
    EmptyPrompt,
}

/// Single-call interface to the remote execution service.
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Run a prompt, creating or continuing a remote context.
    ///
    /// A populated `request.context` must be reused exactly; when the
    /// remote side no longer knows it, the result reports the failure
    /// rather than silently creating a replacement.
    ///
    /// # Errors
    /// Returns an error only for programmer-error-class input such as an
    /// empty prompt; every remote or environmental failure is reported
    /// through the returned [`ExecutionResult`].
    async fn execute(&self, request: ExecutionRequest)
    -> Result<ExecutionResult, ExecutionError>;
}
