//! Session records binding chat threads to remote execution contexts.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionContext;

/// Chat thread identifier (a Discord snowflake on the wire).
pub type ThreadId = String;
/// Conversation identifier held by the execution provider.
pub type SessionId = String;
/// Identifier of the isolated environment backing a conversation.
pub type SandboxId = String;

/// A chat thread bound to a remote execution context.
///
/// At most one session exists per thread. `session_id` and `sandbox_id`
/// never change after creation; only `last_activity` moves forward, on
/// every successful continuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Thread the session is keyed by.
    pub thread_id: ThreadId,
    /// Conversation context held by the execution provider.
    pub session_id: SessionId,
    /// Isolated environment backing the context.
    pub sandbox_id: SandboxId,
    /// Creation timestamp (Unix epoch milliseconds).
    pub created_at: i64,
    /// Timestamp of the most recent continuation.
    pub last_activity: i64,
}

impl Session {
    /// Create a session stamped with the current time.
    #[must_use]
    pub fn new(
        thread_id: impl Into<ThreadId>,
        session_id: impl Into<SessionId>,
        sandbox_id: impl Into<SandboxId>,
    ) -> Self {
        let timestamp = now_ms();
        Self {
            thread_id: thread_id.into(),
            session_id: session_id.into(),
            sandbox_id: sandbox_id.into(),
            created_at: timestamp,
            last_activity: timestamp,
        }
    }

    /// Context handle for continuing this session's remote execution.
    #[must_use]
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            session_id: self.session_id.clone(),
            sandbox_id: self.sandbox_id.clone(),
        }
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_stamps_creation_and_activity_equally() {
        let session = Session::new("thread-1", "sess-1", "box-1");
        assert_eq!(session.created_at, session.last_activity);
        assert!(session.created_at > 0);
    }

    #[test]
    fn execution_context_carries_both_ids() {
        let session = Session::new("thread-1", "sess-1", "box-1");
        let context = session.execution_context();
        assert_eq!(context.session_id, "sess-1");
        assert_eq!(context.sandbox_id, "box-1");
    }

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
