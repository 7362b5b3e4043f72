//! Shared test helpers for pattern tests.

use actloop_core::agent::{Agent, StateDict, StateModule};
use actloop_core::error::{Error, ModelError, Result, ToolError};
use actloop_core::message::{ContentBlock, Message, Role, ToolUseBlock};
use actloop_core::model::{
    CallOptions, ChunkReceiver, ContentDelta, ModelClient, ModelResponse, ResponseChunk, Usage,
};
use actloop_core::tool::{Tool, ToolResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A mock model that returns a sequence of scripted responses.
///
/// Each call returns the next response in the queue. Once the queue is
/// down to its last entry that entry repeats when `repeat_last` is set;
/// otherwise running out panics. In streaming mode each response is
/// re-cut into small deltas so the aggregator has real work to do.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<std::result::Result<ModelResponse, ModelError>>>,
    repeat_last: bool,
    streaming: bool,
    calls: Mutex<Vec<(Vec<Message>, CallOptions)>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            repeat_last: false,
            streaming: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Plain text answers, one per call.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| text_response(t)).collect())
    }

    /// Every call fails with a network error.
    pub fn failing(reason: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(vec![Err(ModelError::Network(reason.into()))])),
            repeat_last: true,
            streaming: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Keep returning the final response once the script runs out.
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Serve responses through `stream()`.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The history sent on call `n` (zero-based).
    pub fn history(&self, n: usize) -> Vec<Message> {
        self.calls.lock().unwrap()[n].0.clone()
    }

    /// The options sent on call `n` (zero-based).
    pub fn options(&self, n: usize) -> CallOptions {
        self.calls.lock().unwrap()[n].1.clone()
    }

    fn next(&self, messages: &[Message], options: &CallOptions) -> std::result::Result<ModelResponse, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), options.clone()));

        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 || (responses.len() == 1 && !self.repeat_last) {
            return responses.pop_front().unwrap();
        }
        match responses.front() {
            Some(response) => response.clone(),
            None => panic!(
                "ScriptedModel: no more responses (call #{})",
                self.calls.lock().unwrap().len()
            ),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    async fn call(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> std::result::Result<ModelResponse, ModelError> {
        self.next(messages, options)
    }

    async fn stream(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> std::result::Result<ChunkReceiver, ModelError> {
        let response = self.next(messages, options)?;
        let chunks = split_into_chunks(&response);
        let (tx, rx) = mpsc::channel(chunks.len());
        for chunk in chunks {
            let _ = tx.send(Ok(chunk)).await;
        }
        Ok(rx)
    }
}

/// Cut a response into per-delta chunks: text two characters at a time,
/// tool arguments split in half.
fn split_into_chunks(response: &ModelResponse) -> Vec<ResponseChunk> {
    let mut chunks = Vec::new();
    let mut tool_index = 0u32;
    for block in &response.content {
        match block {
            ContentBlock::Text { text } => {
                let chars: Vec<char> = text.chars().collect();
                for piece in chars.chunks(2) {
                    chunks.push(ResponseChunk::text(piece.iter().collect::<String>()));
                }
            }
            ContentBlock::ToolUse(tool_use) => {
                let args = serde_json::to_string(&tool_use.input).unwrap();
                let (head, tail) = args.split_at(args.len() / 2);
                chunks.push(ResponseChunk {
                    deltas: vec![ContentDelta::ToolUse {
                        index: tool_index,
                        id: Some(tool_use.id.clone()),
                        name: Some(tool_use.name.clone()),
                        arguments: head.to_string(),
                    }],
                    ..ResponseChunk::default()
                });
                chunks.push(ResponseChunk {
                    deltas: vec![ContentDelta::ToolUse {
                        index: tool_index,
                        id: None,
                        name: None,
                        arguments: tail.to_string(),
                    }],
                    ..ResponseChunk::default()
                });
                tool_index += 1;
            }
            other => chunks.push(ResponseChunk {
                deltas: vec![ContentDelta::Block { block: other.clone() }],
                ..ResponseChunk::default()
            }),
        }
    }
    chunks.push(ResponseChunk {
        usage: response.usage,
        ..ResponseChunk::last()
    });
    chunks
}

/// A streaming model whose chunks are spelled out verbatim.
///
/// When `cancel_after_send` is set, the token is cancelled right after the
/// chunks are queued, so the consumer sees cancellation with fragments
/// still unread. The sender is kept alive until the receiver drops so a
/// script without a terminal chunk blocks instead of closing.
pub struct ChunkedModel {
    scripts: Mutex<VecDeque<Vec<std::result::Result<ResponseChunk, ModelError>>>>,
    cancel_after_send: Option<CancellationToken>,
    hold_open: bool,
}

impl ChunkedModel {
    pub fn new(scripts: Vec<Vec<std::result::Result<ResponseChunk, ModelError>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            cancel_after_send: None,
            hold_open: false,
        }
    }

    pub fn cancel_after_send(mut self, token: CancellationToken) -> Self {
        self.cancel_after_send = Some(token);
        self
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl ModelClient for ChunkedModel {
    fn model_name(&self) -> &str {
        "chunked-model"
    }

    fn is_streaming(&self) -> bool {
        true
    }

    async fn call(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> std::result::Result<ModelResponse, ModelError> {
        Err(ModelError::NotConfigured("chunked-model only streams".into()))
    }

    async fn stream(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> std::result::Result<ChunkReceiver, ModelError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("ChunkedModel: no more scripts");
        let (tx, rx) = mpsc::channel(script.len().max(1));
        for chunk in script {
            let _ = tx.send(chunk).await;
        }
        if let Some(token) = &self.cancel_after_send {
            token.cancel();
        }
        if self.hold_open {
            tokio::spawn(async move { tx.closed().await });
        }
        Ok(rx)
    }
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        id: "resp".into(),
        content: vec![ContentBlock::text(text)],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
    }
}

/// Create a response with a thought followed by tool invocations.
pub fn tool_use_response(thought: &str, tool_uses: Vec<ContentBlock>) -> ModelResponse {
    let mut content = Vec::new();
    if !thought.is_empty() {
        content.push(ContentBlock::text(thought));
    }
    content.extend(tool_uses);
    ModelResponse {
        content,
        ..text_response("")
    }
}

/// Helper to create a tool invocation block.
pub fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse(ToolUseBlock {
        id: id.into(),
        name: name.into(),
        input: input.as_object().cloned().unwrap_or_default(),
    })
}

/// Echoes its `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str { "echo" }
    fn description(&self) -> &str { "Echoes back the input" }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo" }
            },
            "required": ["text"]
        })
    }
    async fn execute(
        &self,
        input: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<ToolResponse, ToolError> {
        let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(ToolResponse::text(format!("echo: {text}")))
    }
}

/// Always fails with the given reason.
pub struct FailingTool(pub &'static str);

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str { "broken" }
    fn description(&self) -> &str { "Always fails" }
    fn parameters_schema(&self) -> serde_json::Value { serde_json::json!({"type": "object"}) }
    async fn execute(
        &self,
        _input: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<ToolResponse, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: self.0.into(),
        })
    }
}

/// Counts how many times it ran.
#[derive(Clone, Default)]
pub struct CountingTool {
    pub runs: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str { "counter" }
    fn description(&self) -> &str { "Counts invocations" }
    fn parameters_schema(&self) -> serde_json::Value { serde_json::json!({"type": "object"}) }
    async fn execute(
        &self,
        _input: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<ToolResponse, ToolError> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ToolResponse::text(format!("run {n}")))
    }
}

/// An agent that answers from a script without any model, recording
/// every input it receives. The last reply repeats.
pub struct StubAgent {
    name: String,
    replies: Mutex<VecDeque<String>>,
    inputs: Mutex<Vec<Message>>,
    fail_with: Option<String>,
    cancels: Option<CancellationToken>,
}

impl StubAgent {
    pub fn new(name: &str) -> Self {
        Self::scripted(name, &["ok"])
    }

    pub fn scripted(name: &str, replies: &[&str]) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            inputs: Mutex::new(Vec::new()),
            fail_with: None,
            cancels: None,
        }
    }

    pub fn failing(name: &str, reason: &str) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::new(name)
        }
    }

    /// Cancel `token` while answering, as if the user gave up mid-reply.
    /// The reply itself still completes.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancels = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn inputs(&self) -> Vec<Message> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateModule for StubAgent {
    async fn state_dict(&self) -> Result<StateDict> {
        let mut state = StateDict::new();
        state.insert("name".into(), self.name.clone().into());
        state.insert("calls".into(), self.calls().into());
        Ok(state)
    }

    async fn load_state_dict(&self, _state: &StateDict) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn id(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, cancel: &CancellationToken, input: Message) -> Result<Message> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.inputs.lock().unwrap().push(input);
        if let Some(token) = &self.cancels {
            token.cancel();
        }
        if let Some(reason) = &self.fail_with {
            return Err(Error::Model(ModelError::Network(reason.clone())));
        }
        let mut replies = self.replies.lock().unwrap();
        let text = if replies.len() > 1 {
            replies.pop_front().unwrap_or_default()
        } else {
            replies.front().cloned().unwrap_or_default()
        };
        Ok(Message::new(self.name.clone(), Role::Assistant, vec![ContentBlock::text(text)]))
    }

    async fn observe(&self, _message: Message) -> Result<()> {
        Ok(())
    }
}
