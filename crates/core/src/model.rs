//! Model client contract — the abstraction over language model backends.
//!
//! A [`ModelClient`] turns a message history plus [`CallOptions`] into a
//! response, either in one piece or as a stream of [`ResponseChunk`]s.
//! Wire formats and transports live outside this crate.

use crate::error::ModelError;
use crate::message::{ContentBlock, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// How the model may use the attached tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides
    #[default]
    Auto,
    /// Tools are listed but must not be called
    None,
    /// The model must call at least one tool
    Required,
}

/// A tool signature sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Per-request parameters. Re-derived from agent configuration on every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    #[serde(default)]
    pub tool_choice: ToolChoice,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another call's usage into this one.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Backend-assigned response identity
    pub id: String,

    /// The generated content fragments
    pub content: Vec<ContentBlock>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// An incremental piece of streamed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// Text to append to the current text block
    Text { text: String },

    /// Reasoning text to append to the current thinking block
    Thinking { thinking: String },

    /// A slice of a tool invocation. Deltas sharing an `index` belong to
    /// the same invocation; `arguments` is a fragment of JSON text.
    ToolUse {
        index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        arguments: String,
    },

    /// A fully formed block (images, pre-assembled tool uses)
    Block { block: ContentBlock },
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseChunk {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deltas: Vec<ContentDelta>,

    /// Whether this is the terminal chunk
    #[serde(default)]
    pub is_last: bool,

    /// Usage info, typically only on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ResponseChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            deltas: vec![ContentDelta::Text { text: text.into() }],
            ..Self::default()
        }
    }

    /// The terminal chunk, carrying no content.
    pub fn last() -> Self {
        Self {
            is_last: true,
            ..Self::default()
        }
    }
}

/// Receiving end of a streamed response.
pub type ChunkReceiver = mpsc::Receiver<std::result::Result<ResponseChunk, ModelError>>;

/// The core model client trait.
///
/// The agent loop calls `call()` or `stream()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// The model identifier (e.g., "gpt-4o", "claude-sonnet-4").
    fn model_name(&self) -> &str;

    /// Whether the agent loop should consume this client through `stream()`.
    fn is_streaming(&self) -> bool {
        false
    }

    /// Send a history and get a complete response.
    async fn call(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> std::result::Result<ModelResponse, ModelError>;

    /// Send a history and get a stream of response chunks.
    ///
    /// Default implementation calls `call()` and wraps the result as a
    /// single terminal chunk.
    async fn stream(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> std::result::Result<ChunkReceiver, ModelError> {
        let response = self.call(messages, options).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx
            .send(Ok(ResponseChunk {
                deltas: response
                    .content
                    .into_iter()
                    .map(|block| ContentDelta::Block { block })
                    .collect(),
                is_last: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}
