//! Agent patterns — structured reasoning strategies.
//!
//! 1. **ReAct** — Thought → Action → Observation loop over one model
//! 2. **Dual-Act** — a Planner agent supervising an Executor agent
//!
//! Both implement [`actloop_core::Agent`], so a Dual-Act agent can itself
//! serve as the Planner or Executor of another.

pub mod dual_act;
pub mod react;

pub use dual_act::{
    Conclusion, ConclusionExtractor, DecisionAction, DualActAgent, DualActConfig, DualActResult,
    HeuristicExtractor, HumanDecision, LoopExit, LoopState,
};
pub use react::{ReactAgent, ReactResult};

#[cfg(test)]
pub(crate) mod test_helpers;
