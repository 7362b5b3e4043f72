//! Memory compression.
//!
//! When an agent's memory grows past a token threshold, every message but
//! the most recent few is condensed into one structured summary by a model
//! call. Memory is then rebuilt as `[summary, kept...]`.

use super::token::{estimate_messages_tokens, estimate_tool_tokens};
use actloop_core::error::{Error, Result};
use actloop_core::memory::Memory;
use actloop_core::message::{ContentBlock, Message, Role};
use actloop_core::model::{CallOptions, ModelClient, ToolSchema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// When and how memory is compressed.
#[derive(Clone)]
pub struct CompressionConfig {
    /// Estimated memory tokens at or above which compression runs
    pub trigger_tokens: usize,

    /// Most recent messages kept verbatim
    pub keep_recent: usize,

    /// Model used for the summary. `None` means the agent's own model.
    pub model: Option<Arc<dyn ModelClient>>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            trigger_tokens: 8000,
            keep_recent: 3,
            model: None,
        }
    }
}

/// The structured continuation summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionSummary {
    pub task_overview: String,
    pub current_state: String,
    pub important_discoveries: String,
    pub next_steps: String,
    pub context_to_preserve: String,
}

const SUMMARY_FIELDS: [&str; 5] = [
    "task_overview",
    "current_state",
    "important_discoveries",
    "next_steps",
    "context_to_preserve",
];

impl CompressionSummary {
    /// Used when the summary call fails.
    pub fn fallback(compressed: usize) -> Self {
        Self {
            task_overview: "Previous task continuation".into(),
            current_state: format!("Compressed {compressed} messages"),
            important_discoveries: "See previous conversation for details".into(),
            next_steps: "Continue with the original task".into(),
            context_to_preserve: String::new(),
        }
    }

    /// Parse a model's free-form summary. A line naming a field (as
    /// `task_overview`, `Task Overview:` or `# Task overview`) starts that
    /// field; following lines are appended to it. Missing fields get
    /// neutral defaults.
    pub fn parse(text: &str) -> Self {
        let mut summary = Self::default();
        let mut current: Option<usize> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some((field, rest)) = field_header(trimmed) {
                current = Some(field);
                if !rest.is_empty() {
                    summary.append(field, rest);
                }
                continue;
            }

            if let Some(field) = current {
                summary.append(field, trimmed);
            }
        }

        if summary.task_overview.is_empty() {
            summary.task_overview = "Continuing previous task".into();
        }
        if summary.current_state.is_empty() {
            summary.current_state = "Unknown".into();
        }
        if summary.important_discoveries.is_empty() {
            summary.important_discoveries = "N/A".into();
        }
        if summary.next_steps.is_empty() {
            summary.next_steps = "Continue task execution".into();
        }
        summary
    }

    fn append(&mut self, field: usize, text: &str) {
        let slot = match field {
            0 => &mut self.task_overview,
            1 => &mut self.current_state,
            2 => &mut self.important_discoveries,
            3 => &mut self.next_steps,
            _ => &mut self.context_to_preserve,
        };
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }

    /// Render as the system message that replaces the compressed history.
    pub fn to_message(&self) -> Message {
        let text = format!(
            "<system-info>Here is a summary of your previous work\n\
             # Task Overview\n{}\n\n\
             # Current State\n{}\n\n\
             # Important Discoveries\n{}\n\n\
             # Next Steps\n{}\n\n\
             # Context to Preserve\n{}\n\
             </system-info>",
            self.task_overview,
            self.current_state,
            self.important_discoveries,
            self.next_steps,
            self.context_to_preserve,
        );
        Message::new("system", Role::System, vec![ContentBlock::text(text)])
    }
}

/// Recognize a field header. Returns the field index and any text after
/// the label on the same line.
fn field_header(line: &str) -> Option<(usize, &str)> {
    let stripped = line.trim_start_matches(['-', '*', '#', ' ']);
    let (label, rest) = match stripped.find(':') {
        Some(pos) => (&stripped[..pos], stripped[pos + 1..].trim()),
        None => (stripped, ""),
    };
    let key = label
        .trim()
        .trim_matches('*')
        .to_lowercase()
        .replace(' ', "_");
    SUMMARY_FIELDS
        .iter()
        .position(|field| key == *field)
        .map(|index| (index, rest))
}

/// What a compression pass did.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub messages_compressed: usize,
    pub summary: CompressionSummary,
}

/// Compress `memory` if it is over the threshold. Returns `None` when
/// nothing needed doing.
///
/// The tool catalogue rides along on every model call, so `tools` counts
/// toward the threshold.
pub async fn compress_memory(
    memory: &dyn Memory,
    model: &dyn ModelClient,
    config: &CompressionConfig,
    tools: &[ToolSchema],
    cancel: &CancellationToken,
) -> Result<Option<CompressionOutcome>> {
    let messages = memory.messages().await?;
    let catalogue_tokens: usize = tools.iter().map(estimate_tool_tokens).sum();
    let tokens_before = estimate_messages_tokens(&messages) + catalogue_tokens;
    let keep_recent = config.keep_recent.max(1);

    if tokens_before < config.trigger_tokens || messages.len() <= keep_recent {
        return Ok(None);
    }

    let split = messages.len() - keep_recent;
    let (old, recent) = messages.split_at(split);

    let summary = summarize(old, config.model.as_deref().unwrap_or(model), cancel).await?;
    let summary_message = summary.to_message();

    let mut rebuilt = Vec::with_capacity(recent.len() + 1);
    rebuilt.push(summary_message);
    rebuilt.extend(recent.iter().cloned());
    let tokens_after = estimate_messages_tokens(&rebuilt) + catalogue_tokens;

    memory.clear().await?;
    for message in rebuilt {
        memory.add(message).await?;
    }

    info!(
        tokens_before,
        tokens_after,
        compressed = old.len(),
        "Memory compressed"
    );

    Ok(Some(CompressionOutcome {
        tokens_before,
        tokens_after,
        messages_compressed: old.len(),
        summary,
    }))
}

async fn summarize(
    messages: &[Message],
    model: &dyn ModelClient,
    cancel: &CancellationToken,
) -> Result<CompressionSummary> {
    let transcript: Vec<String> = messages
        .iter()
        .filter_map(|m| {
            let text = m.text_content();
            (!text.is_empty()).then(|| format!("[{}] {}: {}", m.timestamp().to_rfc3339(), m.role(), text))
        })
        .collect();

    let prompt = format!(
        "You have been working on a task but have not yet completed it.\n\
         Write a continuation summary that will let you resume efficiently in a new context window.\n\n\
         Previous conversation:\n{}\n\n\
         Reply with these fields:\n\
         - task_overview: the user's core request and success criteria\n\
         - current_state: what has been completed so far\n\
         - important_discoveries: decisions made, errors hit and how they were resolved\n\
         - next_steps: specific actions needed to finish\n\
         - context_to_preserve: user preferences and promises made\n\n\
         Be concise and actionable.",
        transcript.join("\n")
    );
    let request = [Message::system(prompt)];
    let options = CallOptions::default();

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        response = model.call(&request, &options) => response,
    };

    match response {
        Ok(response) => {
            let text: Vec<String> = response.content.iter().filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            }).collect();
            Ok(CompressionSummary::parse(&text.join("\n")))
        }
        Err(e) => {
            warn!("Compression summary failed, using fallback: {e}");
            Ok(CompressionSummary::fallback(messages.len()))
        }
    }
}
