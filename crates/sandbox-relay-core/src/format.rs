//! Relay-text formatting for execution results.
//!
//! The chat platform renders markdown and enforces a 2000-character
//! message limit, so results are wrapped in code blocks and truncated at
//! a character boundary when they would not fit.

use crate::execution::ExecutionResult;

/// Hard message-length limit imposed by the chat platform.
const MAX_MESSAGE_LEN: usize = 2000;

/// Marker appended inside the code block when text is cut off.
const TRUNCATION_MARKER: &str = "... (truncated)";

/// Placeholder rendered when a successful run produced no output.
const EMPTY_OUTPUT: &str = "(no output)";

/// Fallback for failed results missing an error description.
const UNKNOWN_ERROR: &str = "execution failed";

/// Render an execution result as a single chat message.
///
/// Success wraps the output in an `**Output:**` code block; failure wraps
/// the error text in an `**Error:**` block.
#[must_use]
pub fn format_result(result: &ExecutionResult) -> String {
    if result.success {
        let output = result.output.trim();
        let body = if output.is_empty() { EMPTY_OUTPUT } else { output };
        wrap("**Output:**", body)
    } else {
        let error = result.error.as_deref().unwrap_or("").trim();
        let body = if error.is_empty() { UNKNOWN_ERROR } else { error };
        wrap("**Error:**", body)
    }
}

/// Wrap `body` in a fenced code block under `header`, keeping the whole
/// message within the platform limit.
fn wrap(header: &str, body: &str) -> String {
    // A fence inside the body would close the block early; a zero-width
    // space keeps the visible text intact.
    let body = body.replace("```", "`\u{200B}``");

    let overhead = header.len() + "\n```\n".len() + "\n```".len();
    let budget = MAX_MESSAGE_LEN.saturating_sub(overhead);
    if body.len() <= budget {
        return format!("{header}\n```\n{body}\n```");
    }

    let keep = floor_char_boundary(&body, budget.saturating_sub(TRUNCATION_MARKER.len() + 1));
    format!("{header}\n```\n{}\n{TRUNCATION_MARKER}\n```", &body[..keep])
}

/// Largest byte index `<= i` that is a char boundary of `s`.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(output: &str) -> ExecutionResult {
        ExecutionResult::completed("sess-1", "box-1", output, 10)
    }

    fn failed(error: &str) -> ExecutionResult {
        ExecutionResult::failed("sess-1", "box-1", "", 10, error)
    }

    #[test]
    fn success_wraps_output_in_code_block() {
        let text = format_result(&ok("it ran"));
        assert_eq!(text, "**Output:**\n```\nit ran\n```");
    }

    #[test]
    fn empty_output_renders_placeholder() {
        let text = format_result(&ok("   \n"));
        assert!(text.contains("(no output)"));
    }

    #[test]
    fn failure_wraps_error_in_error_block() {
        let text = format_result(&failed("boom"));
        assert_eq!(text, "**Error:**\n```\nboom\n```");
    }

    #[test]
    fn blank_error_uses_fallback_text() {
        let text = format_result(&failed("  "));
        assert!(text.contains("execution failed"));
    }

    #[test]
    fn long_output_is_truncated_under_the_limit() {
        let text = format_result(&ok(&"x".repeat(5000)));
        assert!(text.len() <= MAX_MESSAGE_LEN);
        assert!(text.contains(TRUNCATION_MARKER));
        assert!(text.ends_with("```"));
    }

    #[test]
    fn truncation_cuts_at_a_char_boundary() {
        let text = format_result(&ok(&"\u{3042}".repeat(3000)));
        assert!(text.len() <= MAX_MESSAGE_LEN);
        // Would panic on a broken boundary: the slice must stay valid UTF-8.
        assert!(text.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn embedded_fences_do_not_break_the_block() {
        let text = format_result(&ok("a\n```\nb"));
        assert_eq!(text.matches("```").count(), 2);
    }

    #[test]
    fn short_message_is_not_truncated() {
        let text = format_result(&ok("fine"));
        assert!(!text.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn floor_char_boundary_handles_multibyte() {
        let s = "a\u{3042}b";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 4), 4);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }
}
