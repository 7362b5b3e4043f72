//! Dual-Act loop configuration.

use super::conclusion::{ConclusionExtractor, HeuristicExtractor};
use actloop_config::{DualActSettings, LoopConfig};
use actloop_core::error::{Error, Result};
use std::sync::Arc;

/// How many H-R rounds to run and how the two agents are prompted.
#[derive(Clone)]
pub struct DualActConfig {
    /// Maximum Executor runs before the loop stops on its own.
    pub max_hr_loops: usize,

    /// Template for the Planner's review prompt. Empty means the built-in
    /// review. Placeholders: `{task}`, `{summary}`, `{steps}`,
    /// `{confidence}`, `{suggested_next_action}`.
    pub human_decision_prompt: String,

    /// Template for Executor instructions after the first round. Empty
    /// means the built-in format. Placeholders: `{instruction}`, `{approach}`.
    pub reactive_task_prompt: String,

    /// Turns the Executor's reply into a [`super::Conclusion`].
    pub conclusion_extractor: Arc<dyn ConclusionExtractor>,
}

impl Default for DualActConfig {
    fn default() -> Self {
        Self {
            max_hr_loops: 3,
            human_decision_prompt: String::new(),
            reactive_task_prompt: String::new(),
            conclusion_extractor: Arc::new(HeuristicExtractor),
        }
    }
}

impl std::fmt::Debug for DualActConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualActConfig")
            .field("max_hr_loops", &self.max_hr_loops)
            .field("human_decision_prompt", &self.human_decision_prompt)
            .field("reactive_task_prompt", &self.reactive_task_prompt)
            .field("conclusion_extractor", &self.conclusion_extractor.name())
            .finish()
    }
}

impl DualActConfig {
    pub fn with_max_hr_loops(mut self, max: usize) -> Self {
        self.max_hr_loops = max;
        self
    }

    pub fn with_human_decision_prompt(mut self, template: impl Into<String>) -> Self {
        self.human_decision_prompt = template.into();
        self
    }

    pub fn with_reactive_task_prompt(mut self, template: impl Into<String>) -> Self {
        self.reactive_task_prompt = template.into();
        self
    }

    pub fn with_conclusion_extractor(mut self, extractor: Arc<dyn ConclusionExtractor>) -> Self {
        self.conclusion_extractor = extractor;
        self
    }

    /// Build from the `[dual_act]` section of a loaded config.
    pub fn from_settings(config: &LoopConfig) -> Result<Self> {
        let DualActSettings {
            max_hr_loops,
            human_decision_prompt,
            reactive_task_prompt,
        } = &config.dual_act;

        let built = Self {
            max_hr_loops: *max_hr_loops,
            human_decision_prompt: human_decision_prompt.clone(),
            reactive_task_prompt: reactive_task_prompt.clone(),
            ..Self::default()
        };
        built.validate()?;
        Ok(built)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_hr_loops == 0 {
            return Err(Error::Config {
                message: "dual_act.max_hr_loops must be greater than 0".into(),
            });
        }
        Ok(())
    }
}
