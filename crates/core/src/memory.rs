//! Memory trait — the agent's private record of prior messages.
//!
//! The agent loop reads a snapshot of memory when building each request and
//! writes to it only at the start (input) and end (reply) of a reply cycle.
//! Implementations must serialize concurrent access, since the same
//! instance may be shared between agents by the caller.

use crate::error::MemoryError;
use crate::message::Message;
use async_trait::async_trait;

#[async_trait]
pub trait Memory: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Append a message.
    async fn add(&self, message: Message) -> Result<(), MemoryError>;

    /// All stored messages, oldest first.
    async fn messages(&self) -> Result<Vec<Message>, MemoryError>;

    /// Remove every stored message.
    async fn clear(&self) -> Result<(), MemoryError>;

    /// Number of stored messages.
    async fn size(&self) -> Result<usize, MemoryError> {
        Ok(self.messages().await?.len())
    }

    /// The `n` most recent messages, oldest first.
    async fn last_n(&self, n: usize) -> Result<Vec<Message>, MemoryError> {
        let mut messages = self.messages().await?;
        let skip = messages.len().saturating_sub(n);
        Ok(messages.split_off(skip))
    }
}
