//! No-op memory — for agents that should not remember anything between replies.

use actloop_core::error::MemoryError;
use actloop_core::memory::Memory;
use actloop_core::message::Message;
use async_trait::async_trait;

/// A memory that stores nothing.
pub struct NoopMemory;

#[async_trait]
impl Memory for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn add(&self, _message: Message) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}
