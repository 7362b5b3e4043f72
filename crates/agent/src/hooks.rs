//! Reply hooks — callbacks around an agent's reply.
//!
//! A [`HookPipeline`] holds two ordered lists of [`ReplyHook`]s. Pre-reply
//! hooks run before the loop body and may rewrite the input or stash
//! values; post-reply hooks run after it and may rewrite the response. Each
//! hook receives the [`HookContext`] by value and returns the context the
//! next hook will see.
//!
//! Hooks are synchronous and run in registration order. A failing hook
//! aborts the reply.

use actloop_core::agent::Agent;
use actloop_core::error::HookError;
use actloop_core::message::Message;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Layout version of [`HookContext`]. Bumped whenever a field changes
/// meaning so hooks can refuse contexts they do not understand.
pub const HOOK_CONTEXT_VERSION: u32 = 1;

/// The state threaded through a hook chain.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub version: u32,

    /// Name of the agent being hooked
    pub agent_name: String,

    /// The input message. Pre-reply hooks may rewrite its content but
    /// must keep its identity.
    pub input: Message,

    /// The reply, present only for post-reply hooks
    pub response: Option<Message>,

    /// Values hooks pass to later hooks
    pub values: BTreeMap<String, serde_json::Value>,
}

impl HookContext {
    pub fn new(agent_name: impl Into<String>, input: Message) -> Self {
        Self {
            version: HOOK_CONTEXT_VERSION,
            agent_name: agent_name.into(),
            input,
            response: None,
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Typed lookup. `None` when the key is missing or has another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A callback run before or after a reply.
pub trait ReplyHook: Send + Sync {
    fn name(&self) -> &str;

    fn call(&self, agent: &dyn Agent, ctx: HookContext) -> Result<HookContext, HookError>;
}

/// Adapts a closure into a [`ReplyHook`].
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&dyn Agent, HookContext) -> Result<HookContext, HookError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> ReplyHook for FnHook<F>
where
    F: Fn(&dyn Agent, HookContext) -> Result<HookContext, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, agent: &dyn Agent, ctx: HookContext) -> Result<HookContext, HookError> {
        (self.f)(agent, ctx)
    }
}

/// Logs every reply it sees at info level.
pub struct LoggingHook;

impl ReplyHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn call(&self, agent: &dyn Agent, ctx: HookContext) -> Result<HookContext, HookError> {
        match &ctx.response {
            None => info!(agent = agent.name(), input_id = ctx.input.id(), "Reply starting"),
            Some(response) => info!(
                agent = agent.name(),
                input_id = ctx.input.id(),
                response_id = response.id(),
                chars = response.text_content().len(),
                "Reply finished"
            ),
        }
        Ok(ctx)
    }
}

/// Ordered pre- and post-reply hooks.
#[derive(Clone, Default)]
pub struct HookPipeline {
    pre_reply: Vec<Arc<dyn ReplyHook>>,
    post_reply: Vec<Arc<dyn ReplyHook>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre_reply(&mut self, hook: Arc<dyn ReplyHook>) {
        self.pre_reply.push(hook);
    }

    pub fn add_post_reply(&mut self, hook: Arc<dyn ReplyHook>) {
        self.post_reply.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.pre_reply.is_empty() && self.post_reply.is_empty()
    }

    /// Names of the pre-reply hooks in run order.
    pub fn pre_reply_names(&self) -> Vec<&str> {
        self.pre_reply.iter().map(|h| h.name()).collect()
    }

    /// Names of the post-reply hooks in run order.
    pub fn post_reply_names(&self) -> Vec<&str> {
        self.post_reply.iter().map(|h| h.name()).collect()
    }

    pub fn run_pre_reply(&self, agent: &dyn Agent, ctx: HookContext) -> Result<HookContext, HookError> {
        run_chain(&self.pre_reply, agent, ctx)
    }

    pub fn run_post_reply(&self, agent: &dyn Agent, ctx: HookContext) -> Result<HookContext, HookError> {
        run_chain(&self.post_reply, agent, ctx)
    }
}

fn run_chain(
    hooks: &[Arc<dyn ReplyHook>],
    agent: &dyn Agent,
    mut ctx: HookContext,
) -> Result<HookContext, HookError> {
    for hook in hooks {
        let input_id = ctx.input.id().to_string();
        let response_id = ctx.response.as_ref().map(|r| r.id().to_string());

        debug!(hook = hook.name(), agent = %ctx.agent_name, "Running reply hook");
        ctx = hook.call(agent, ctx)?;

        let response_changed = match (&response_id, &ctx.response) {
            (Some(before), Some(after)) => before != after.id(),
            (Some(_), None) => true,
            _ => false,
        };
        if ctx.input.id() != input_id || response_changed {
            return Err(HookError::IdentityChanged {
                hook: hook.name().to_string(),
            });
        }
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::StubAgent;
    use actloop_core::message::ContentBlock;

    fn tagging_hook(name: &'static str) -> Arc<dyn ReplyHook> {
        Arc::new(FnHook::new(name, move |_agent: &dyn Agent, mut ctx: HookContext| {
            let mut order: Vec<String> = ctx.get_as("order").unwrap_or_default();
            order.push(name.to_string());
            ctx.insert("order", serde_json::json!(order));
            Ok(ctx)
        }))
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let mut pipeline = HookPipeline::new();
        pipeline.add_pre_reply(tagging_hook("first"));
        pipeline.add_pre_reply(tagging_hook("second"));
        pipeline.add_pre_reply(Arc::new(LoggingHook));

        let agent = StubAgent::new("stub");
        let ctx = pipeline
            .run_pre_reply(&agent, HookContext::new("stub", Message::user("hi")))
            .unwrap();
        let order: Vec<String> = ctx.get_as("order").unwrap();
        assert_eq!(order, vec!["first", "second"]);
        assert_eq!(pipeline.pre_reply_names(), vec!["first", "second", "logging"]);
        assert_eq!(ctx.version, HOOK_CONTEXT_VERSION);
    }

    #[test]
    fn failing_hook_stops_the_chain() {
        let mut pipeline = HookPipeline::new();
        pipeline.add_pre_reply(Arc::new(FnHook::new("deny", |_agent: &dyn Agent, _ctx: HookContext| {
            Err(HookError::Failed {
                hook: "deny".into(),
                reason: "input rejected".into(),
            })
        })));
        pipeline.add_pre_reply(tagging_hook("never"));

        let agent = StubAgent::new("stub");
        let err = pipeline
            .run_pre_reply(&agent, HookContext::new("stub", Message::user("hi")))
            .unwrap_err();
        assert!(err.to_string().contains("input rejected"));
    }

    #[test]
    fn content_rewrite_keeps_identity() {
        let mut pipeline = HookPipeline::new();
        pipeline.add_pre_reply(Arc::new(FnHook::new("rewrite", |_agent: &dyn Agent, mut ctx: HookContext| {
            ctx.input.replace_content(vec![ContentBlock::text("rewritten")]);
            Ok(ctx)
        })));

        let agent = StubAgent::new("stub");
        let input = Message::user("original");
        let id = input.id().to_string();
        let ctx = pipeline.run_pre_reply(&agent, HookContext::new("stub", input)).unwrap();
        assert_eq!(ctx.input.id(), id);
        assert_eq!(ctx.input.text_content(), "rewritten");
    }

    #[test]
    fn replacing_the_input_is_rejected() {
        let mut pipeline = HookPipeline::new();
        pipeline.add_pre_reply(Arc::new(FnHook::new("swap", |_agent: &dyn Agent, mut ctx: HookContext| {
            ctx.input = Message::user("someone else");
            Ok(ctx)
        })));

        let agent = StubAgent::new("stub");
        let err = pipeline
            .run_pre_reply(&agent, HookContext::new("stub", Message::user("mine")))
            .unwrap_err();
        assert!(matches!(err, HookError::IdentityChanged { .. }));
    }

    #[test]
    fn post_reply_hook_cannot_drop_response() {
        let mut pipeline = HookPipeline::new();
        pipeline.add_post_reply(Arc::new(FnHook::new("drop", |_agent: &dyn Agent, mut ctx: HookContext| {
            ctx.response = None;
            Ok(ctx)
        })));

        let agent = StubAgent::new("stub");
        let mut ctx = HookContext::new("stub", Message::user("q"));
        ctx.response = Some(Message::assistant("a"));
        assert!(pipeline.run_post_reply(&agent, ctx).is_err());
    }
}
