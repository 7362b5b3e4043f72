//! Tool contracts — the abstraction over agent capabilities.
//!
//! The agent loop only ever talks to a [`ToolProvider`]: it lists the
//! callable signatures and executes one invocation at a time. The
//! [`ToolRegistry`] is the in-process provider built from individual
//! [`Tool`] implementations.

use crate::error::ToolError;
use crate::message::{ContentBlock, ToolUseBlock};
use crate::model::ToolSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The output of a tool execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Output fragments, typically text
    pub content: Vec<ContentBlock>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
        }
    }
}

/// A single callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        input: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<ToolResponse, ToolError>;

    /// Convert this tool into a ToolSchema for sending to the model.
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The collaborator the agent loop executes tool invocations against.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// The current catalogue of callable tools, in a stable order.
    fn schemas(&self) -> Vec<ToolSchema>;

    /// Execute one invocation and return its output fragments.
    async fn call(&self, invocation: &ToolUseBlock) -> std::result::Result<Vec<ContentBlock>, ToolError>;
}

/// A registry of available tools, kept in registration order so the
/// catalogue sent to the model is stable between calls.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its position.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Box::new(tool));
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.to_schema()).collect()
    }

    async fn call(&self, invocation: &ToolUseBlock) -> std::result::Result<Vec<ContentBlock>, ToolError> {
        let tool = self
            .get(&invocation.name)
            .ok_or_else(|| ToolError::NotFound(invocation.name.clone()))?;
        Ok(tool.execute(&invocation.input).await?.content)
    }
}
