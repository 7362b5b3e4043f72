//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Good enough
//! to decide when memory should be compressed; never used for billing.

use actloop_core::message::{ContentBlock, Message};
use actloop_core::model::ToolSchema;

/// Per-message overhead for role name, delimiters and formatting markers.
const MESSAGE_OVERHEAD: usize = 4;

/// Flat cost charged for an image block.
const IMAGE_TOKENS: usize = 85;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for one content block.
pub fn estimate_block_tokens(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text { text } => estimate_tokens(text),
        ContentBlock::Thinking { thinking } => estimate_tokens(thinking),
        ContentBlock::ToolUse(tool_use) => {
            let input = serde_json::to_string(&tool_use.input).unwrap_or_default();
            estimate_tokens(&tool_use.name) + estimate_tokens(&input)
        }
        ContentBlock::ToolResult(result) => {
            estimate_tokens(&result.name) + result.output.iter().map(estimate_block_tokens).sum::<usize>()
        }
        ContentBlock::Image { .. } => IMAGE_TOKENS,
    }
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + message.content().iter().map(estimate_block_tokens).sum::<usize>()
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for a tool schema (serialized as JSON).
pub fn estimate_tool_tokens(tool: &ToolSchema) -> usize {
    let json = serde_json::to_string(tool).unwrap_or_default();
    estimate_tokens(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actloop_core::message::ToolUseBlock;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user("test"); // 4 chars → 1 token + 4 overhead = 5
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn multiple_messages() {
        let msgs = vec![
            Message::user("hello"),      // 2 + 4
            Message::assistant("world"), // 2 + 4
        ];
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }

    #[test]
    fn tool_blocks_are_counted() {
        let block = ContentBlock::ToolUse(ToolUseBlock {
            id: "c".into(),
            name: "calc".into(),                         // 1
            input: serde_json::Map::new(),               // "{}" → 1
        });
        assert_eq!(estimate_block_tokens(&block), 2);

        let result = ContentBlock::tool_result("c", "calc", "12345678"); // 1 + 2
        assert_eq!(estimate_block_tokens(&result), 3);
    }

    #[test]
    fn tool_schema_tokens() {
        let tool = ToolSchema {
            name: "test_tool".to_string(),
            description: "A test tool".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        assert!(estimate_tool_tokens(&tool) > 0);
    }
}
