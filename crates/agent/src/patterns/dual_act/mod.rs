//! Dual-Act pattern — a Planner (H) supervising an Executor (R).
//!
//! Both sides are full agents, usually [`ReactAgent`](super::react::ReactAgent)s.
//! The Executor runs first on the task itself. Its reply is turned into a
//! [`Conclusion`] and handed to the Planner as a review prompt. The Planner
//! answers TERMINATE (its message becomes the reply), CONTINUE or REDIRECT
//! (the Executor runs again with the new instruction).
//!
//! The loop stops after `max_hr_loops` Executor runs. Hitting the cap is not
//! an error: the last conclusion is rendered as the reply. Any failure of
//! either sub-agent fails the whole loop.

pub mod conclusion;
pub mod config;
pub mod decision;

pub use conclusion::{COMPLETE_CONFIDENCE, Conclusion, ConclusionExtractor, HeuristicExtractor};
pub use config::DualActConfig;
pub use decision::{DecisionAction, HumanDecision};

use crate::hooks::{HookContext, HookPipeline, ReplyHook};
use actloop_core::agent::{Agent, StateDict, StateModule, state_field, state_str};
use actloop_core::error::{Error, Result};
use actloop_core::event::{DomainEvent, EventBus};
use actloop_core::message::{ContentBlock, Message, Role};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Where the supervisory loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopState {
    #[default]
    Planning,
    Executing,
    Terminated,
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The Planner answered TERMINATE
    PlannerTerminated,
    /// The round cap was reached
    MaxRounds,
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopExit::PlannerTerminated => write!(f, "terminated"),
            LoopExit::MaxRounds => write!(f, "max_rounds"),
        }
    }
}

/// The outcome of one supervisory run.
#[derive(Debug, Clone)]
pub struct DualActResult {
    pub reply: Message,
    /// One conclusion per Executor run
    pub conclusions: Vec<Conclusion>,
    /// One decision per Planner review
    pub decisions: Vec<HumanDecision>,
    /// Executor runs performed
    pub rounds: usize,
    pub final_state: LoopState,
    pub exit: LoopExit,
}

/// Reasoning attached to the reply when the round cap ends the loop.
const MAX_ROUNDS_REASONING: &str = "Maximum H-R rounds reached";

pub struct DualActAgent {
    id: String,
    name: String,
    planner: Arc<dyn Agent>,
    executor: Arc<dyn Agent>,
    config: DualActConfig,
    hooks: HookPipeline,
    event_bus: Option<Arc<EventBus>>,
    state: Mutex<LoopState>,
    rounds_completed: AtomicUsize,
}

impl DualActAgent {
    /// Pair a Planner with an Executor. Fails if the config is invalid.
    pub fn new(
        name: impl Into<String>,
        planner: Arc<dyn Agent>,
        executor: Arc<dyn Agent>,
        config: DualActConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            planner,
            executor,
            config,
            hooks: HookPipeline::new(),
            event_bus: None,
            state: Mutex::new(LoopState::Planning),
            rounds_completed: AtomicUsize::new(0),
        })
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

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn planner(&self) -> &Arc<dyn Agent> {
        &self.planner
    }

    pub fn executor(&self) -> &Arc<dyn Agent> {
        &self.executor
    }

    pub fn config(&self) -> &DualActConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    /// Executor runs in the most recent supervisory run.
    pub fn rounds_completed(&self) -> usize {
        self.rounds_completed.load(Ordering::Relaxed)
    }

    /// Run the supervisory loop for one task, without hooks.
    pub async fn run(&self, cancel: &CancellationToken, input: Message) -> Result<DualActResult> {
        let task = input.text_content();
        let mut instruction = input.clone();
        let mut conclusions: Vec<Conclusion> = Vec::new();
        let mut decisions: Vec<HumanDecision> = Vec::new();
        let mut round = 0usize;

        info!(agent = %self.name, max_rounds = self.config.max_hr_loops, "Dual-Act loop starting");
        self.rounds_completed.store(0, Ordering::Relaxed);

        let (reply, exit) = loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            round += 1;

            self.set_state(LoopState::Executing);
            debug!(agent = %self.name, round, "Executor running");
            let instruction_text = instruction.text_content();
            let executed = self
                .executor
                .reply(cancel, instruction)
                .await
                .map_err(|e| sub_agent_error("executor", e))?;
            self.rounds_completed.store(round, Ordering::Relaxed);

            let mut conclusion = self.config.conclusion_extractor.extract(&executed);
            conclusion.original_input = instruction_text;
            conclusion.iterations = executed
                .metadata
                .get("iterations")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            debug!(
                agent = %self.name,
                round,
                confidence = conclusion.confidence,
                "Executor concluded"
            );
            self.publish(DomainEvent::ConclusionReached {
                round,
                confidence: conclusion.confidence,
                timestamp: Utc::now(),
            });
            conclusions.push(conclusion);

            if round >= self.config.max_hr_loops {
                let last = conclusions.last().cloned().unwrap_or_default();
                let text = render_final(&task, &last, MAX_ROUNDS_REASONING);
                let reply = Message::new(self.name.clone(), Role::Assistant, vec![ContentBlock::text(text)]);
                break (reply, LoopExit::MaxRounds);
            }

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.set_state(LoopState::Planning);
            let review = match conclusions.last() {
                Some(conclusion) => self.review_prompt(&task, conclusion),
                None => return Err(Error::Internal("no conclusion to review".into())),
            };
            let planned = self
                .planner
                .reply(cancel, review)
                .await
                .map_err(|e| sub_agent_error("planner", e))?;

            let decision = HumanDecision::parse(&planned.text_content());
            debug!(
                agent = %self.name,
                round,
                action = %decision.action,
                reasoning = %decision.reasoning,
                "Planner decided"
            );
            self.publish(DomainEvent::DecisionMade {
                round,
                action: decision.action.to_string(),
                timestamp: Utc::now(),
            });

            if decision.should_terminate() {
                decisions.push(decision);
                break (planned, LoopExit::PlannerTerminated);
            }
            instruction = self.format_instruction(&decision);
            decisions.push(decision);
        };

        self.set_state(LoopState::Terminated);
        let reply = reply
            .with_invocation_id(input.id())
            .with_metadata("outcome", exit.to_string())
            .with_metadata("rounds", round);

        info!(agent = %self.name, rounds = round, exit = %exit, "Dual-Act loop finished");
        self.publish(DomainEvent::SupervisionFinished {
            rounds: round,
            exit: exit.to_string(),
            timestamp: Utc::now(),
        });

        Ok(DualActResult {
            reply,
            conclusions,
            decisions,
            rounds: round,
            final_state: LoopState::Terminated,
            exit,
        })
    }

    /// The Planner's input for reviewing one conclusion.
    pub fn review_prompt(&self, task: &str, conclusion: &Conclusion) -> Message {
        let text = if self.config.human_decision_prompt.is_empty() {
            format!(
                "## Execution Review\n\n\
                 **Original Task:** {task}\n\n\
                 **Work Summary:** {}\n\n\
                 **Steps Taken:**\n{}\n\n\
                 **Confidence:** {:.2}\n\n\
                 **Suggested Next Action:** {}\n\n\
                 ---\n\
                 Please evaluate this work and decide:\n\
                 - TERMINATE: If the task is complete and satisfactory\n\
                 - CONTINUE: If more work is needed (provide next instruction)\n\
                 - REDIRECT: If the approach needs to change (explain new approach)\n\n\
                 Respond with your decision and reasoning.",
                conclusion.summary,
                conclusion.numbered_steps(),
                conclusion.confidence,
                conclusion.suggested_next_action,
            )
        } else {
            self.config
                .human_decision_prompt
                .replace("{task}", task)
                .replace("{summary}", &conclusion.summary)
                .replace("{steps}", &conclusion.steps.join("\n"))
                .replace("{confidence}", &format!("{:.2}", conclusion.confidence))
                .replace("{suggested_next_action}", &conclusion.suggested_next_action)
        };
        Message::new(self.name.clone(), Role::User, vec![ContentBlock::text(text)])
    }

    /// The Executor's input after a CONTINUE or REDIRECT.
    pub fn format_instruction(&self, decision: &HumanDecision) -> Message {
        let text = if !self.config.reactive_task_prompt.is_empty() {
            self.config
                .reactive_task_prompt
                .replace("{instruction}", &decision.new_instruction)
                .replace("{approach}", &decision.modified_approach)
        } else if decision.is_redirect() && !decision.modified_approach.is_empty() {
            format!("NEW APPROACH: {}\n\n{}", decision.modified_approach, decision.new_instruction)
        } else {
            decision.new_instruction.clone()
        };
        Message::new(self.name.clone(), Role::User, vec![ContentBlock::text(text)])
    }

    fn set_state(&self, state: LoopState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

/// Cancellation passes through unwrapped so callers can match on it.
fn sub_agent_error(role: &str, error: Error) -> Error {
    match error {
        Error::Cancelled => Error::Cancelled,
        other => Error::SubAgent {
            role: role.to_string(),
            source: Box::new(other),
        },
    }
}

fn nested_state<'a>(state: &'a StateDict, key: &str) -> Result<&'a StateDict> {
    state_field(state, key)?
        .as_object()
        .ok_or_else(|| Error::State(format!("field '{key}' is not an object")))
}

/// The reply used when no Planner message ends the loop.
fn render_final(task: &str, conclusion: &Conclusion, reasoning: &str) -> String {
    let mut out = format!("## Task: {task}\n\n**Summary:** {}\n\n", conclusion.summary);
    if !conclusion.steps.is_empty() {
        out.push_str("**Steps Taken:**\n");
        for step in &conclusion.steps {
            out.push_str(&format!("  {step}\n"));
        }
        out.push('\n');
    }
    out.push_str(&format!("**Final Decision:** {reasoning}"));
    out
}

#[async_trait]
impl StateModule for DualActAgent {
    async fn state_dict(&self) -> Result<StateDict> {
        let mut config = StateDict::new();
        config.insert("max_hr_loops".into(), self.config.max_hr_loops.into());

        let mut state = StateDict::new();
        state.insert("id".into(), self.id.clone().into());
        state.insert("name".into(), self.name.clone().into());
        state.insert("config".into(), config.into());
        state.insert("planner".into(), self.planner.state_dict().await?.into());
        state.insert("executor".into(), self.executor.state_dict().await?.into());
        state.insert("rounds_completed".into(), self.rounds_completed().into());
        Ok(state)
    }

    /// Restore both sub-agents. The round cap is configuration and is not
    /// taken from the dictionary.
    async fn load_state_dict(&self, state: &StateDict) -> Result<()> {
        let name = state_str(state, "name")?;
        if name != self.name {
            return Err(Error::State(format!(
                "state belongs to agent '{name}', not '{}'",
                self.name
            )));
        }

        self.planner.load_state_dict(nested_state(state, "planner")?).await?;
        self.executor.load_state_dict(nested_state(state, "executor")?).await?;

        let rounds = state.get("rounds_completed").and_then(|v| v.as_u64()).unwrap_or(0);
        self.rounds_completed.store(rounds as usize, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl Agent for DualActAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, cancel: &CancellationToken, input: Message) -> Result<Message> {
        let ctx = self.hooks.run_pre_reply(self, HookContext::new(self.name.clone(), input))?;
        let result = self.run(cancel, ctx.input.clone()).await?;

        let mut ctx = ctx;
        ctx.response = Some(result.reply);
        let ctx = self.hooks.run_post_reply(self, ctx)?;
        ctx.response
            .ok_or_else(|| Error::Internal("post-reply hooks dropped the response".into()))
    }

    /// The Planner keeps the conversation view, so observed messages go there.
    async fn observe(&self, message: Message) -> Result<()> {
        self.planner.observe(message).await
    }
}
