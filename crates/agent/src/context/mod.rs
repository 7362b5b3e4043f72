//! Keeping an agent's memory inside the model's context window.
//!
//! [`token`] estimates how much of the window a history takes;
//! [`compression`] condenses old memory into one summary message once the
//! estimate crosses a threshold.

pub mod compression;
pub mod token;

pub use compression::{CompressionConfig, CompressionOutcome, CompressionSummary, compress_memory};
pub use token::{estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
