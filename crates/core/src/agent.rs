//! Agent and state-dictionary contracts.
//!
//! Every agent (a single ReAct loop or a supervisory loop composed of
//! several) answers one input message with one reply message. Agents also
//! expose their durable state as a serializable mapping so an external
//! persistence layer can snapshot and restore a run.

use crate::error::{Error, Result};
use crate::message::Message;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A serializable snapshot of an agent's durable state.
pub type StateDict = serde_json::Map<String, serde_json::Value>;

/// Something whose state can be exported to and restored from a [`StateDict`].
#[async_trait]
pub trait StateModule: Send + Sync {
    async fn state_dict(&self) -> Result<StateDict>;

    async fn load_state_dict(&self, state: &StateDict) -> Result<()>;
}

#[async_trait]
pub trait Agent: StateModule {
    /// Stable identity of this agent instance.
    fn id(&self) -> &str;

    /// Author name stamped on this agent's replies.
    fn name(&self) -> &str;

    /// Produce a reply to `input`.
    ///
    /// Every suspension point observes `cancel`; a cancelled reply fails
    /// with [`Error::Cancelled`].
    async fn reply(&self, cancel: &CancellationToken, input: Message) -> Result<Message>;

    /// Record a message in memory without replying to it.
    async fn observe(&self, message: Message) -> Result<()>;
}

/// Look up a required key in a state dictionary.
pub fn state_field<'a>(state: &'a StateDict, key: &str) -> Result<&'a serde_json::Value> {
    state
        .get(key)
        .ok_or_else(|| Error::State(format!("missing field '{key}'")))
}

/// Look up a required string key in a state dictionary.
pub fn state_str<'a>(state: &'a StateDict, key: &str) -> Result<&'a str> {
    state_field(state, key)?
        .as_str()
        .ok_or_else(|| Error::State(format!("field '{key}' is not a string")))
}
