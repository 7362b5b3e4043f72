//! # ActLoop Core
//!
//! Domain types, traits, and error definitions for the ActLoop agent
//! orchestration runtime. This crate defines the domain model that all
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the agent loops touch is defined as a trait here:
//! - [`ModelClient`] produces responses, blocking or streamed
//! - [`ToolProvider`] lists and executes tools
//! - [`Memory`] stores prior messages
//! - [`Agent`] answers one message with another
//!
//! Concrete backends live outside the core, and tests substitute scripted
//! stubs for all of them.

pub mod agent;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, StateDict, StateModule};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use memory::Memory;
pub use message::{ContentBlock, ImageSource, Message, Role, ToolResultBlock, ToolUseBlock};
pub use model::{
    CallOptions, ChunkReceiver, ContentDelta, ModelClient, ModelResponse, ResponseChunk, ToolChoice,
    ToolSchema, Usage,
};
pub use tool::{Tool, ToolProvider, ToolRegistry, ToolResponse};

pub use tokio_util::sync::CancellationToken;
