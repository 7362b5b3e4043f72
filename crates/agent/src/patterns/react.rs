//! ReAct pattern — Thought → Action → Observation loop.
//!
//! One reply runs up to `max_iterations` model calls. Each call sees the
//! system prompt (with the tool catalogue rendered into it), the agent's
//! memory, the new input and every tool turn produced so far in this
//! reply. A response without tool invocations ends the loop and becomes
//! the reply. Otherwise each invocation is executed in order: the
//! invocation goes into the working history as an assistant turn and its
//! result (or an `Error: ...` result) as a user turn.
//!
//! Running out of iterations is not an error: the reply carries the text
//! the model produced along the way and is flagged `truncated`.
//!
//! Memory is written exactly twice per reply: the input before the first
//! model call and the reply after the last.

use crate::context::compression::{CompressionConfig, compress_memory};
use crate::hooks::{HookContext, HookPipeline, ReplyHook};
use crate::inject::{Injector, InjectorChain};
use crate::stream::aggregate;
use actloop_config::{LoopConfig, ToolChoiceSetting};
use actloop_core::agent::{Agent, StateDict, StateModule, state_field, state_str};
use actloop_core::error::{Error, Result};
use actloop_core::event::{DomainEvent, EventBus};
use actloop_core::memory::Memory;
use actloop_core::message::{ContentBlock, Message, Role, ToolResultBlock, ToolUseBlock};
use actloop_core::model::{CallOptions, ModelClient, ToolChoice, ToolSchema, Usage};
use actloop_core::tool::ToolProvider;
use actloop_memory::BoundedMemory;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Text used when the model answers with no content at all.
const EMPTY_RESPONSE_TEXT: &str = "Empty response from model";

/// A single ReAct agent.
pub struct ReactAgent {
    id: String,
    name: String,
    system_prompt: RwLock<String>,
    model: Arc<dyn ModelClient>,
    tools: Option<Arc<dyn ToolProvider>>,
    memory: Arc<dyn Memory>,
    max_iterations: usize,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    stop: Vec<String>,
    tool_choice: ToolChoice,
    hooks: HookPipeline,
    injectors: InjectorChain,
    compression: Option<CompressionConfig>,
    event_bus: Option<Arc<EventBus>>,
}

/// The result of one ReAct run.
#[derive(Debug, Clone)]
pub struct ReactResult {
    /// The reply message, also written to memory.
    pub reply: Message,
    /// Model calls made.
    pub iterations: usize,
    /// Tool invocations executed.
    pub tool_calls_made: usize,
    /// Whether the iteration budget ran out before a final answer.
    pub truncated: bool,
    /// Token usage summed over all model calls.
    pub usage: Usage,
    /// The full history sent on the last model call plus the final
    /// response: system prompt, memory, input and every tool turn.
    pub history: Vec<Message>,
}

impl ReactAgent {
    /// Create a new ReAct agent with bounded memory and no tools.
    pub fn new(name: impl Into<String>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            system_prompt: RwLock::new(String::new()),
            model,
            tools: None,
            memory: Arc::new(BoundedMemory::new()),
            max_iterations: 10,
            temperature: None,
            max_tokens: None,
            stop: Vec::new(),
            tool_choice: ToolChoice::Auto,
            hooks: HookPipeline::new(),
            injectors: InjectorChain::new(),
            compression: None,
            event_bus: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = RwLock::new(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Replace the memory. Pass a shared instance to let agents see each
    /// other's messages.
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = memory;
        self
    }

    /// Set max iterations (at least one).
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_hooks(mut self, hooks: HookPipeline) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_pre_reply_hook(mut self, hook: Arc<dyn ReplyHook>) -> Self {
        self.hooks.add_pre_reply(hook);
        self
    }

    pub fn with_post_reply_hook(mut self, hook: Arc<dyn ReplyHook>) -> Self {
        self.hooks.add_post_reply(hook);
        self
    }

    pub fn with_injector(mut self, injector: Arc<dyn Injector>) -> Self {
        self.injectors.add(injector);
        self
    }

    pub fn with_compression(mut self, config: CompressionConfig) -> Self {
        self.compression = Some(config);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Apply loaded settings: iteration budget, call options, memory cap
    /// and compression.
    pub fn with_settings(mut self, config: &LoopConfig) -> Self {
        self.max_iterations = config.react.max_iterations.max(1);
        self.temperature = config.react.temperature;
        self.max_tokens = config.react.max_tokens;
        self.stop = config.react.stop.clone();
        self.tool_choice = match config.react.tool_choice {
            ToolChoiceSetting::Auto => ToolChoice::Auto,
            ToolChoiceSetting::None => ToolChoice::None,
            ToolChoiceSetting::Required => ToolChoice::Required,
        };
        self.memory = Arc::new(
            BoundedMemory::with_capacity(config.memory.max_messages)
                .allow_duplicates(config.memory.allow_duplicates),
        );
        self.compression = config.compression.enabled.then(|| CompressionConfig {
            trigger_tokens: config.compression.trigger_tokens,
            keep_recent: config.compression.keep_recent,
            model: None,
        });
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    pub async fn system_prompt(&self) -> String {
        self.system_prompt.read().await.clone()
    }

    pub async fn set_system_prompt(&self, prompt: impl Into<String>) {
        *self.system_prompt.write().await = prompt.into();
    }

    /// The system prompt with the tool catalogue appended.
    pub async fn render_system_prompt(&self, schemas: &[ToolSchema]) -> String {
        let mut prompt = self.system_prompt.read().await.clone();
        if schemas.is_empty() {
            return prompt;
        }

        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str("# Tools\n\nYou have access to the following tools:\n\n");
        for schema in schemas {
            prompt.push_str(&format!("## {}\n", schema.name));
            if !schema.description.is_empty() {
                prompt.push_str(&schema.description);
                prompt.push('\n');
            }
            if let Some(properties) = schema.parameters.get("properties").and_then(|p| p.as_object()) {
                for (name, param) in properties {
                    prompt.push_str(&format!("- {name}"));
                    if let Some(desc) = param.get("description").and_then(|d| d.as_str()) {
                        prompt.push_str(&format!(": {desc}"));
                    }
                    if let Some(kind) = param.get("type").and_then(|t| t.as_str()) {
                        prompt.push_str(&format!(" ({kind})"));
                    }
                    prompt.push('\n');
                }
            }
            prompt.push('\n');
        }
        prompt.push_str("To use a tool, respond with a tool_use block containing the tool name and parameters.\n");
        prompt
    }

    /// Execute the ReAct loop for one input, without hooks.
    pub async fn run(&self, cancel: &CancellationToken, input: Message) -> Result<ReactResult> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let input = self.injectors.apply_all(input);
        let schemas = self.tools.as_ref().map(|t| t.schemas()).unwrap_or_default();
        self.maybe_compress(cancel, &schemas).await?;

        let system_prompt = self.render_system_prompt(&schemas).await;

        let mut history = Vec::new();
        if !system_prompt.is_empty() {
            history.push(Message::system(system_prompt));
        }
        history.extend(self.memory.messages().await?);
        history.push(input.clone());
        self.memory.add(input.clone()).await?;

        let options = CallOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: self.stop.clone(),
            tools: schemas,
            tool_choice: self.tool_choice,
        };

        info!(
            agent = %self.name,
            model = self.model.model_name(),
            max_iter = self.max_iterations,
            "ReAct loop starting"
        );

        let mut usage = Usage::default();
        let mut accumulated: Vec<ContentBlock> = Vec::new();
        let mut executed: HashSet<String> = HashSet::new();
        let mut tool_calls_made = 0usize;
        let mut final_content: Option<Vec<ContentBlock>> = None;
        let mut iterations = 0usize;

        while iterations < self.max_iterations {
            iterations += 1;
            debug!(agent = %self.name, iteration = iterations, "ReAct iteration");

            let content = self.call_model(cancel, &history, &options, iterations, &mut usage).await?;

            let tool_uses: Vec<ToolUseBlock> = content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse(t) => Some(t.clone()),
                    _ => None,
                })
                .collect();

            if tool_uses.is_empty() {
                final_content = Some(content);
                break;
            }

            let mut preamble: Vec<ContentBlock> = content
                .into_iter()
                .filter(|b| matches!(b, ContentBlock::Text { .. } | ContentBlock::Thinking { .. }))
                .collect();
            accumulated.extend(preamble.iter().cloned());

            for tool_use in tool_uses {
                if !executed.insert(tool_use.id.clone()) {
                    warn!(agent = %self.name, id = %tool_use.id, "Skipping repeated tool invocation id");
                    continue;
                }
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let mut turn = std::mem::take(&mut preamble);
                turn.push(ContentBlock::ToolUse(tool_use.clone()));
                history.push(Message::new(self.name.clone(), Role::Assistant, turn));

                let result = self.execute_tool(cancel, &tool_use).await?;
                tool_calls_made += 1;
                history.push(Message::new(
                    tool_use.name.clone(),
                    Role::User,
                    vec![ContentBlock::ToolResult(result)],
                ));
            }
        }

        let truncated = final_content.is_none();
        let mut content = match final_content {
            Some(content) => content,
            None => {
                warn!(agent = %self.name, "ReAct: max iterations reached ({})", self.max_iterations);
                accumulated
            }
        };
        if content.is_empty() {
            content.push(ContentBlock::text(if truncated {
                format!("Stopped after {iterations} iterations without a final answer.")
            } else {
                EMPTY_RESPONSE_TEXT.to_string()
            }));
        }

        let mut reply = Message::new(self.name.clone(), Role::Assistant, content)
            .with_invocation_id(input.id())
            .with_metadata("iterations", iterations)
            .with_metadata("tool_calls", tool_calls_made);
        if truncated {
            reply.metadata.insert("truncated".into(), true.into());
        }

        self.memory.add(reply.clone()).await?;
        history.push(reply.clone());

        info!(
            agent = %self.name,
            iterations,
            tool_calls = tool_calls_made,
            truncated,
            "ReAct loop completed"
        );
        self.publish(DomainEvent::ReplyCompleted {
            agent: self.name.clone(),
            iterations,
            tool_calls: tool_calls_made,
            truncated,
            timestamp: Utc::now(),
        });

        Ok(ReactResult {
            reply,
            iterations,
            tool_calls_made,
            truncated,
            usage,
            history,
        })
    }

    async fn call_model(
        &self,
        cancel: &CancellationToken,
        history: &[Message],
        options: &CallOptions,
        iteration: usize,
        usage: &mut Usage,
    ) -> Result<Vec<ContentBlock>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        let (content, call_usage) = if self.model.is_streaming() {
            let mut rx = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                rx = self.model.stream(history, options) => rx?,
            };
            let aggregated = aggregate(&mut rx, cancel).await?;
            (aggregated.content, aggregated.usage)
        } else {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                response = self.model.call(history, options) => response?,
            };
            (response.content, response.usage)
        };

        if let Some(call_usage) = &call_usage {
            usage.add(call_usage);
        }
        self.publish(DomainEvent::ModelCalled {
            agent: self.name.clone(),
            model: self.model.model_name().to_string(),
            iteration,
            tokens_used: call_usage.map(|u| u.total_tokens),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        Ok(content)
    }

    /// Run one invocation. Tool failures become an error result; only
    /// cancellation escapes.
    async fn execute_tool(&self, cancel: &CancellationToken, tool_use: &ToolUseBlock) -> Result<ToolResultBlock> {
        let start = Instant::now();
        let outcome = match &self.tools {
            Some(tools) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    outcome = tools.call(tool_use) => outcome,
                }
            }
            None => Err(actloop_core::error::ToolError::NotFound(tool_use.name.clone())),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (output, success) = match outcome {
            Ok(output) => (output, true),
            Err(e) => {
                warn!(agent = %self.name, tool = %tool_use.name, "Tool failed: {e}");
                (vec![ContentBlock::text(format!("Error: {e}"))], false)
            }
        };

        self.publish(DomainEvent::ToolExecuted {
            agent: self.name.clone(),
            tool_name: tool_use.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(ToolResultBlock {
            id: tool_use.id.clone(),
            name: tool_use.name.clone(),
            output,
        })
    }

    async fn maybe_compress(&self, cancel: &CancellationToken, tools: &[ToolSchema]) -> Result<()> {
        let Some(config) = &self.compression else {
            return Ok(());
        };
        let outcome = compress_memory(self.memory.as_ref(), self.model.as_ref(), config, tools, cancel).await?;
        if let Some(outcome) = outcome {
            self.publish(DomainEvent::MemoryCompressed {
                agent: self.name.clone(),
                messages_before: outcome.messages_compressed + config.keep_recent.max(1),
                messages_after: config.keep_recent.max(1) + 1,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[async_trait]
impl StateModule for ReactAgent {
    async fn state_dict(&self) -> Result<StateDict> {
        let mut state = StateDict::new();
        state.insert("id".into(), self.id.clone().into());
        state.insert("name".into(), self.name.clone().into());
        state.insert("system_prompt".into(), self.system_prompt().await.into());
        state.insert("max_iterations".into(), self.max_iterations.into());
        state.insert(
            "memory".into(),
            serde_json::to_value(self.memory.messages().await?)?,
        );
        Ok(state)
    }

    /// Restore the system prompt and memory. The dictionary must come from
    /// an agent with the same name.
    async fn load_state_dict(&self, state: &StateDict) -> Result<()> {
        let name = state_str(state, "name")?;
        if name != self.name {
            return Err(Error::State(format!(
                "state belongs to agent '{name}', not '{}'",
                self.name
            )));
        }

        let prompt = state_str(state, "system_prompt")?.to_string();
        let messages: Vec<Message> = serde_json::from_value(state_field(state, "memory")?.clone())?;

        self.set_system_prompt(prompt).await;
        self.memory.clear().await?;
        for message in messages {
            self.memory.add(message).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Agent for ReactAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// Run pre-reply hooks, the loop, then post-reply hooks.
    async fn reply(&self, cancel: &CancellationToken, input: Message) -> Result<Message> {
        let ctx = self.hooks.run_pre_reply(self, HookContext::new(self.name.clone(), input))?;
        let result = self.run(cancel, ctx.input.clone()).await?;

        let mut ctx = ctx;
        ctx.response = Some(result.reply);
        let ctx = self.hooks.run_post_reply(self, ctx)?;
        ctx.response
            .ok_or_else(|| Error::Internal("post-reply hooks dropped the response".into()))
    }

    async fn observe(&self, message: Message) -> Result<()> {
        self.memory.add(message).await?;
        Ok(())
    }
}
