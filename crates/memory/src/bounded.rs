//! In-process message memory with a size cap.

use actloop_core::error::MemoryError;
use actloop_core::memory::Memory;
use actloop_core::message::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;

/// Default cap on stored messages.
pub const DEFAULT_MAX_MESSAGES: usize = 1000;

/// An append-only message store that drops the oldest messages once
/// `max_messages` is exceeded.
///
/// By default a message whose id is already stored is ignored, so
/// observing the same message twice does not duplicate history. Access is
/// serialized through a `tokio::sync::RwLock`, making one instance safe to
/// share between agents.
pub struct BoundedMemory {
    messages: RwLock<VecDeque<Message>>,
    max_messages: usize,
    allow_duplicates: bool,
}

impl BoundedMemory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_MESSAGES)
    }

    /// Create a memory holding at most `max_messages` messages.
    /// A cap of zero means unbounded.
    pub fn with_capacity(max_messages: usize) -> Self {
        Self {
            messages: RwLock::new(VecDeque::new()),
            max_messages,
            allow_duplicates: false,
        }
    }

    /// Keep messages whose id is already stored instead of ignoring them.
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

impl Default for BoundedMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Memory for BoundedMemory {
    fn name(&self) -> &str {
        "bounded"
    }

    async fn add(&self, message: Message) -> Result<(), MemoryError> {
        let mut messages = self.messages.write().await;

        if !self.allow_duplicates && messages.iter().any(|m| m.id() == message.id()) {
            debug!(id = message.id(), "Skipping duplicate message");
            return Ok(());
        }

        messages.push_back(message);

        if self.max_messages > 0 {
            while messages.len() > self.max_messages {
                messages.pop_front();
            }
        }
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.messages.read().await.iter().cloned().collect())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.messages.write().await.clear();
        Ok(())
    }

    async fn size(&self) -> Result<usize, MemoryError> {
        Ok(self.messages.read().await.len())
    }
}
