//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, which is
//! close enough for budgeting history against the model's context.

use devpilot_core::message::Message;
use devpilot_core::provider::ToolDefinition;

/// Per-message overhead for role names and delimiters in the wire format.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including tool-call payloads.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + message.estimated_tokens()
}

pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for tool definitions (serialized as JSON).
pub fn estimate_tools_tokens(tools: &[ToolDefinition]) -> usize {
    tools
        .iter()
        .map(|t| estimate_tokens(&serde_json::to_string(t).unwrap_or_default()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user("test"); // 1 token + 4 overhead
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn multiple_messages() {
        let msgs = vec![Message::user("hello"), Message::assistant("world")];
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }

    #[test]
    fn tool_definitions_cost_tokens() {
        let tool = ToolDefinition {
            name: "list_tasks".into(),
            description: "List tasks".into(),
            parameters: serde_json::json!({ "type": "object" }),
        };
        assert!(estimate_tools_tokens(&[tool]) > 0);
        assert_eq!(estimate_tools_tokens(&[]), 0);
    }
}
