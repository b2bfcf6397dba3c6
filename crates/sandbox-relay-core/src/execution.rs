//! Request and result types exchanged with the execution provider.

use serde::{Deserialize, Serialize};

use crate::session::{SandboxId, SessionId};

/// Handle to an existing remote execution context.
///
/// Nesting the two ids in one struct makes the "both present or neither"
/// rule structural: a request either continues an exact context or creates
/// a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Conversation identifier to resume.
    pub session_id: SessionId,
    /// Environment the conversation runs in.
    pub sandbox_id: SandboxId,
}

/// A single prompt execution, in a fresh context or an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Prompt text forwarded to the execution service.
    pub prompt: String,
    /// Existing context to continue; `None` provisions a new one.
    pub context: Option<ExecutionContext>,
}

impl ExecutionRequest {
    /// Request executing `prompt` in a newly created context.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: None,
        }
    }

    /// Continue an existing context instead of creating one.
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Outcome of one execution call.
///
/// Ordinary failures (non-zero exit, remote errors, missing credentials)
/// are values, not errors: `success` is false and `error` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Conversation identifier; empty when the failure predates a context.
    pub session_id: SessionId,
    /// Environment identifier; empty when the failure predates a context.
    pub sandbox_id: SandboxId,
    /// Captured output, possibly partial on failure.
    pub output: String,
    /// Wall-clock time for the whole call, failures included.
    pub duration_ms: u64,
    /// Whether the execution completed cleanly.
    pub success: bool,
    /// Failure description; present exactly when `success` is false.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Successful result carrying the context ids to store.
    #[must_use]
    pub fn completed(
        session_id: impl Into<SessionId>,
        sandbox_id: impl Into<SandboxId>,
        output: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sandbox_id: sandbox_id.into(),
            output: output.into(),
            duration_ms,
            success: true,
            error: None,
        }
    }

    /// Failed result; `output` keeps whatever was captured before the
    /// failure.
    #[must_use]
    pub fn failed(
        session_id: impl Into<SessionId>,
        sandbox_id: impl Into<SandboxId>,
        output: impl Into<String>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sandbox_id: sandbox_id.into(),
            output: output.into(),
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}
