//! The Executor's report to the Planner.

use actloop_core::message::Message;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence at or above which a conclusion counts as complete.
pub const COMPLETE_CONFIDENCE: f32 = 0.8;

/// What one Executor run accomplished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conclusion {
    /// Short account of the work done
    pub summary: String,

    /// Intermediate steps, in the order reported
    pub steps: Vec<String>,

    /// Optional hint about what should happen next
    pub suggested_next_action: String,

    /// Self-assessed completion, 0.0 to 1.0
    pub confidence: f32,

    /// Anything else worth handing to the Planner
    pub artifacts: BTreeMap<String, serde_json::Value>,

    /// The instruction the Executor was working on
    pub original_input: String,

    /// ReAct iterations the Executor spent
    pub iterations: usize,
}

impl Conclusion {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn add_step(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }

    pub fn add_artifact(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.artifacts.insert(key.into(), value.into());
    }

    pub fn is_complete(&self) -> bool {
        self.confidence >= COMPLETE_CONFIDENCE
    }

    /// Steps as a numbered list, or a placeholder when there are none.
    pub fn numbered_steps(&self) -> String {
        if self.steps.is_empty() {
            return "No detailed steps recorded.".into();
        }
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Turns an Executor reply into a [`Conclusion`].
pub trait ConclusionExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, reply: &Message) -> Conclusion;
}

/// Keyword-based extraction from free text.
///
/// Confidence comes from an explicit `Confidence: 0.x` line when present,
/// otherwise from completion or failure words. Lines starting with `-` or
/// a list number are taken as steps. A `Next:` or `Suggested next action:`
/// line becomes the suggestion.
pub struct HeuristicExtractor;

impl ConclusionExtractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn extract(&self, reply: &Message) -> Conclusion {
        let text = reply.text_content();
        let mut conclusion = Conclusion::new(text.trim());
        conclusion.confidence = explicit_confidence(&text).unwrap_or_else(|| keyword_confidence(&text));

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('-') || is_numbered(trimmed) {
                conclusion.add_step(trimmed);
            }
        }

        if let Some(next) = suggested_next(&text) {
            conclusion.suggested_next_action = next;
        }
        conclusion
    }
}

fn keyword_confidence(text: &str) -> f32 {
    if mentions_success(text) {
        0.9
    } else if mentions_failure(text) {
        0.2
    } else {
        0.5
    }
}

/// A whole completion word that is not negated ("not done", "not yet finished").
fn mentions_success(text: &str) -> bool {
    let Ok(re) = Regex::new(r"(?i)\b(not\s+(?:yet\s+)?)?(done|complete|completed|finished)\b") else {
        return false;
    };
    re.captures_iter(text).any(|caps| caps.get(1).is_none())
}

fn mentions_failure(text: &str) -> bool {
    Regex::new(r"(?i)\b(error|errors|failed|failure)\b").is_ok_and(|re| re.is_match(text))
}

fn explicit_confidence(text: &str) -> Option<f32> {
    let re = Regex::new(r"(?im)^[\s*#-]*confidence[\s*]*:[\s*]*([01](?:\.\d+)?)").ok()?;
    let value: f32 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 1.0))
}

fn is_numbered(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

fn suggested_next(text: &str) -> Option<String> {
    let re = Regex::new(r"(?im)^[\s*#-]*(?:suggested next action|next)[\s*]*:[\s*]*(.+)$").ok()?;
    let next = re.captures(text)?.get(1)?.as_str().trim().trim_end_matches('*').trim();
    (!next.is_empty()).then(|| next.to_string())
}
