//! The agent loops of ActLoop.
//!
//! A [`ReactAgent`] answers one input by alternating model calls and tool
//! executions:
//!
//! 1. **Receive** an input message and run it through the injector chain
//! 2. **Build history** (system prompt + tool catalogue + memory + input)
//! 3. **Call the model**, draining the stream when the client streams
//! 4. **If tool invocations**: execute them in order, append results, go to 3
//! 5. **If text only**: that content is the reply
//!
//! The loop ends on a text-only response or when the iteration budget runs
//! out. A [`DualActAgent`] puts two such agents in a Planner/Executor loop
//! with its own round budget.

pub mod context;
pub mod hooks;
pub mod inject;
pub mod patterns;
pub mod stream;

pub use context::{CompressionConfig, CompressionOutcome, CompressionSummary, compress_memory};
pub use hooks::{FnHook, HOOK_CONTEXT_VERSION, HookContext, HookPipeline, LoggingHook, ReplyHook};
pub use inject::{ContextInjector, Injector, InjectorChain};
pub use patterns::{
    Conclusion, ConclusionExtractor, DecisionAction, DualActAgent, DualActConfig, DualActResult,
    HeuristicExtractor, HumanDecision, LoopExit, LoopState, ReactAgent, ReactResult,
};
pub use stream::{AggregatedResponse, StreamAggregator, aggregate};
