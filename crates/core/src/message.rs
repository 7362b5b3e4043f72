//! Message and content domain types.
//!
//! A [`Message`] is one turn of conversation: an author, a role and an
//! ordered list of [`ContentBlock`]s. Role, author, identity and timestamp
//! are fixed at construction. Content can only be replaced wholesale, and
//! the identity survives the replacement so consumers can correlate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user, and tool results fed back to the model
    User,
    /// The model
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    /// Invocation identity, echoed back by the matching result
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments keyed by parameter name
    #[serde(default)]
    pub input: serde_json::Map<String, serde_json::Value>,
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// The invocation identity this result answers
    pub id: String,

    /// Name of the tool that produced it
    pub name: String,

    /// Output fragments, typically a single text block
    #[serde(default)]
    pub output: Vec<ContentBlock>,
}

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

/// One typed fragment of a message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
    Thinking { thinking: String },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        ContentBlock::Thinking { thinking: thinking.into() }
    }

    /// A tool result carrying a single text output.
    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, output: impl Into<String>) -> Self {
        ContentBlock::ToolResult(ToolResultBlock {
            id: id.into(),
            name: name.into(),
            output: vec![ContentBlock::text(output)],
        })
    }

    /// The textual rendering of this block, if it has one.
    ///
    /// Tool results render their text outputs; tool uses and images have
    /// no text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ContentBlock::Text { text } => Some(text.clone()),
            ContentBlock::ToolResult(result) => {
                let parts: Vec<String> = result.output.iter().filter_map(|b| b.as_text()).collect();
                Some(parts.join("\n"))
            }
            ContentBlock::Thinking { .. } | ContentBlock::ToolUse(_) | ContentBlock::Image { .. } => None,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: String,
    name: String,
    role: Role,
    content: Vec<ContentBlock>,
    timestamp: DateTime<Utc>,

    /// The invocation this message belongs to, when produced inside one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,

    /// Free-form metadata (iteration counts, outcomes, model info)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    /// Create a message with an explicit author and content.
    pub fn new(name: impl Into<String>, role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            role,
            content,
            timestamp: Utc::now(),
            invocation_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", Role::User, vec![ContentBlock::text(text)])
    }

    /// Create a new assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new("assistant", Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create a new system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", Role::System, vec![ContentBlock::text(text)])
    }

    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = Some(invocation_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    /// Replace the content wholesale. Identity, author and role are kept.
    pub fn replace_content(&mut self, content: Vec<ContentBlock>) {
        self.content = content;
    }

    /// Text of all text-bearing blocks, joined with newlines.
    pub fn text_content(&self) -> String {
        let parts: Vec<String> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect();
        parts.join("\n")
    }

    /// Tool invocations in emission order.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(tool_use) => Some(tool_use),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_uses(&self) -> bool {
        self.content.iter().any(|b| matches!(b, ContentBlock::ToolUse(_)))
    }

    /// Attach a metadata entry, returning the message.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
