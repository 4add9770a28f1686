/// Action name reported to the actor when a close is reverted.
pub const CLOSE_ACTION: &str = "close";

/// Render the comment posted after an issue transition was reverted for lacking linked pull requests.
pub fn render_linked_pull_request_required_comment(actor_login: &str, action: &str) -> String {
    format!(
        "***@{}*** you can't {} an issue unless the issue has link pull requests.",
        actor_login.trim(),
        action
    )
}

/// Bound response bodies quoted in error messages.
pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
