//! Thread title derivation from message text.

/// Maximum title length accepted by the chat platform.
const MAX_TITLE_LEN: usize = 80;

/// Title used when the message text has no usable characters.
const FALLBACK_TITLE: &str = "Session";

/// Derive a thread title from raw message text.
///
/// Whitespace runs collapse to single spaces, the result is trimmed and
/// truncated to 80 characters, and empty input falls back to `"Session"`.
#[must_use]
pub fn derive_thread_title(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        collapsed.chars().take(MAX_TITLE_LEN).collect()
    }
}
