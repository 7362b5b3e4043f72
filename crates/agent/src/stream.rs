//! Streaming response aggregation.
//!
//! A streamed model call yields [`ResponseChunk`]s. The aggregator folds
//! them, in emission order, into the same `Vec<ContentBlock>` a blocking
//! call would have returned:
//!
//! - consecutive text deltas merge into one text block (same for thinking)
//! - tool-use deltas are grouped by `index`; their JSON argument fragments
//!   are concatenated and parsed only once the terminal chunk arrives
//! - complete blocks pass through untouched
//!
//! If the stream fails or closes before the terminal chunk, whatever was
//! assembled is finalized with a trailing error text and returned inside
//! [`ModelError::StreamInterrupted`], so the caller never waits forever and
//! can still inspect the partial content.

use actloop_core::error::{Error, ModelError, Result};
use actloop_core::message::{ContentBlock, ToolUseBlock};
use actloop_core::model::{ChunkReceiver, ContentDelta, ResponseChunk, Usage};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// The assembled content of a fully drained stream.
#[derive(Debug, Clone, Default)]
pub struct AggregatedResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Option<Usage>,
    pub chunks: usize,
}

/// One position in the output, in first-seen order.
#[derive(Debug)]
enum Slot {
    Text(String),
    Thinking(String),
    ToolUse(u32),
    Block(ContentBlock),
}

#[derive(Debug)]
struct ToolUseAccumulator {
    id: String,
    name: String,
    arguments: String,
    /// Used when the provider never sends an id; unique per stream so
    /// repeated turns never collide.
    fallback_id: String,
}

impl ToolUseAccumulator {
    fn new(index: u32) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            arguments: String::new(),
            fallback_id: format!("call_{index}_{}", Uuid::new_v4().simple()),
        }
    }

    fn to_block(&self, index: u32) -> std::result::Result<ToolUseBlock, String> {
        if self.name.is_empty() {
            return Err(format!("tool use #{index} never received a name"));
        }

        let input = if self.arguments.trim().is_empty() {
            serde_json::Map::new()
        } else {
            match serde_json::from_str::<serde_json::Value>(&self.arguments) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(other) => {
                    return Err(format!(
                        "arguments for tool '{}' are not a JSON object: {other}",
                        self.name
                    ));
                }
                Err(e) => {
                    return Err(format!(
                        "arguments for tool '{}' are not valid JSON: {e}",
                        self.name
                    ));
                }
            }
        };

        let id = if self.id.is_empty() {
            self.fallback_id.clone()
        } else {
            self.id.clone()
        };

        Ok(ToolUseBlock {
            id,
            name: self.name.clone(),
            input,
        })
    }
}

/// Folds response chunks into content blocks.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    slots: Vec<Slot>,
    tool_uses: HashMap<u32, ToolUseAccumulator>,
    usage: Option<Usage>,
    chunks: usize,
    finished: bool,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal chunk has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fold one chunk into the aggregate.
    pub fn push(&mut self, chunk: ResponseChunk) {
        self.chunks += 1;
        for delta in chunk.deltas {
            self.push_delta(delta);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        if chunk.is_last {
            self.finished = true;
        }
    }

    fn push_delta(&mut self, delta: ContentDelta) {
        match delta {
            ContentDelta::Text { text } => match self.slots.last_mut() {
                Some(Slot::Text(current)) => current.push_str(&text),
                _ => self.slots.push(Slot::Text(text)),
            },
            ContentDelta::Thinking { thinking } => match self.slots.last_mut() {
                Some(Slot::Thinking(current)) => current.push_str(&thinking),
                _ => self.slots.push(Slot::Thinking(thinking)),
            },
            ContentDelta::ToolUse {
                index,
                id,
                name,
                arguments,
            } => {
                if !self.tool_uses.contains_key(&index) {
                    self.slots.push(Slot::ToolUse(index));
                }
                let acc = self
                    .tool_uses
                    .entry(index)
                    .or_insert_with(|| ToolUseAccumulator::new(index));
                if let Some(id) = id {
                    acc.id = id;
                }
                if let Some(name) = name {
                    acc.name = name;
                }
                acc.arguments.push_str(&arguments);
            }
            ContentDelta::Block { block } => self.slots.push(Slot::Block(block)),
        }
    }

    /// Build the final content. Any tool use whose arguments do not parse
    /// fails the whole response.
    pub fn finish(&self) -> std::result::Result<Vec<ContentBlock>, String> {
        let mut content = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if let Some(block) = self.render(slot)? {
                content.push(block);
            }
        }
        Ok(content)
    }

    /// Finalize after a failure: keep every block that can be built, drop
    /// incomplete tool uses, and append an error text block.
    pub fn interrupt(&self, reason: impl Into<String>) -> ModelError {
        let reason = reason.into();
        let mut partial: Vec<ContentBlock> = self
            .slots
            .iter()
            .filter_map(|slot| self.render(slot).ok().flatten())
            .collect();
        partial.push(ContentBlock::text(format!("Error: stream interrupted: {reason}")));

        warn!(chunks = self.chunks, blocks = partial.len(), %reason, "Stream ended before terminal chunk");
        ModelError::StreamInterrupted { reason, partial }
    }

    fn render(&self, slot: &Slot) -> std::result::Result<Option<ContentBlock>, String> {
        let block = match slot {
            Slot::Text(text) if text.is_empty() => return Ok(None),
            Slot::Text(text) => ContentBlock::text(text.clone()),
            Slot::Thinking(thinking) if thinking.is_empty() => return Ok(None),
            Slot::Thinking(thinking) => ContentBlock::thinking(thinking.clone()),
            Slot::ToolUse(index) => match self.tool_uses.get(index) {
                Some(acc) => ContentBlock::ToolUse(acc.to_block(*index)?),
                None => return Ok(None),
            },
            Slot::Block(block) => block.clone(),
        };
        Ok(Some(block))
    }
}

/// Drain `rx` to its terminal chunk and return the assembled content.
///
/// Each wait races against `cancel`; a cancelled drain returns
/// [`Error::Cancelled`] and leaves the remaining chunks unread.
pub async fn aggregate(rx: &mut ChunkReceiver, cancel: &CancellationToken) -> Result<AggregatedResponse> {
    let mut aggregator = StreamAggregator::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(chunks = aggregator.chunks, "Stream drain cancelled");
                return Err(Error::Cancelled);
            }
            next = rx.recv() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                aggregator.push(chunk);
                if aggregator.is_finished() {
                    break;
                }
            }
            Some(Err(e)) => return Err(aggregator.interrupt(e.to_string()).into()),
            None => {
                return Err(aggregator
                    .interrupt("stream closed before the terminal chunk")
                    .into());
            }
        }
    }

    match aggregator.finish() {
        Ok(content) => Ok(AggregatedResponse {
            content,
            usage: aggregator.usage,
            chunks: aggregator.chunks,
        }),
        Err(reason) => Err(aggregator.interrupt(reason).into()),
    }
}
