//! Error types for the ActLoop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::message::ContentBlock;
use thiserror::Error;

/// The top-level error type for all ActLoop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Hook errors ---
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    // --- Control flow ---
    #[error("Operation cancelled")]
    Cancelled,

    #[error("{role} agent failed: {source}")]
    SubAgent {
        role: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid state dictionary: {0}")]
    State(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a cancellation outcome, looking through
    /// sub-agent wrapping.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::SubAgent { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Content assembled before a streaming failure, if any.
    pub fn partial_content(&self) -> Option<&[ContentBlock]> {
        match self {
            Error::Model(ModelError::StreamInterrupted { partial, .. }) => Some(partial.as_slice()),
            Error::SubAgent { source, .. } => source.partial_content(),
            _ => None,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by model backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The response stream ended before its terminal chunk. `partial`
    /// holds the content assembled up to the failure, already finalized
    /// with a trailing error text block.
    #[error("Stream interrupted: {reason}")]
    StreamInterrupted {
        reason: String,
        partial: Vec<ContentBlock>,
    },

    #[error("Model client not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid memory state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook '{hook}' failed: {reason}")]
    Failed { hook: String, reason: String },

    #[error("hook '{hook}' replaced the input message identity")]
    IdentityChanged { hook: String },
}
