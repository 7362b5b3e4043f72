//! Memory implementations for ActLoop agents.

pub mod bounded;
pub mod noop;

pub use bounded::{BoundedMemory, DEFAULT_MAX_MESSAGES};
pub use noop::NoopMemory;
