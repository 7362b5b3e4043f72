//! Planner decisions and how they are read out of free text.
//!
//! Parsing is best effort. An explicit `Decision:` or `Action:` label wins;
//! otherwise the first standalone upper-case action word counts. When no
//! action can be found the decision is CONTINUE, which the round cap keeps
//! bounded.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the Planner wants to happen next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    /// Run the Executor again with a new instruction
    #[default]
    Continue,
    /// Stop; the Planner's message is the answer
    Terminate,
    /// Run the Executor again with a changed approach
    Redirect,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionAction::Continue => write!(f, "CONTINUE"),
            DecisionAction::Terminate => write!(f, "TERMINATE"),
            DecisionAction::Redirect => write!(f, "REDIRECT"),
        }
    }
}

impl DecisionAction {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "CONTINUE" => Some(Self::Continue),
            "TERMINATE" => Some(Self::Terminate),
            "REDIRECT" => Some(Self::Redirect),
            _ => None,
        }
    }
}

/// A parsed Planner decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanDecision {
    pub action: DecisionAction,

    /// Next instruction for the Executor (CONTINUE and REDIRECT)
    pub new_instruction: String,

    pub reasoning: String,

    /// The changed approach (REDIRECT)
    pub modified_approach: String,
}

impl HumanDecision {
    pub fn new(action: DecisionAction) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    pub fn should_terminate(&self) -> bool {
        self.action == DecisionAction::Terminate
    }

    /// CONTINUE and REDIRECT both run the Executor again.
    pub fn should_continue(&self) -> bool {
        matches!(self.action, DecisionAction::Continue | DecisionAction::Redirect)
    }

    pub fn is_redirect(&self) -> bool {
        self.action == DecisionAction::Redirect
    }

    /// Read a decision out of the Planner's reply.
    pub fn parse(text: &str) -> Self {
        let action = labeled_action(text)
            .or_else(|| bare_action(text))
            .unwrap_or_default();

        let mut decision = Self::new(action);
        decision.reasoning = section(text, &["reasoning", "reason"]).unwrap_or_default();

        if action != DecisionAction::Terminate {
            decision.new_instruction = section(text, &["instruction", "next instruction", "next step", "next steps"])
                .unwrap_or_else(|| text.trim().to_string());
        }
        if action == DecisionAction::Redirect {
            decision.modified_approach = section(text, &["approach", "new approach"]).unwrap_or_default();
        }
        decision
    }
}

fn labeled_action(text: &str) -> Option<DecisionAction> {
    let re = Regex::new(r"(?im)^[\s*#>-]*(?:decision|action)[\s*]*:[\s*]*(terminate|continue|redirect)\b").ok()?;
    DecisionAction::from_word(re.captures(text)?.get(1)?.as_str())
}

fn bare_action(text: &str) -> Option<DecisionAction> {
    let re = Regex::new(r"\b(TERMINATE|CONTINUE|REDIRECT)\b").ok()?;
    DecisionAction::from_word(re.find(text)?.as_str())
}

/// Labels that open a section of a decision reply.
const SECTION_LABELS: [&str; 10] = [
    "decision",
    "action",
    "reasoning",
    "reason",
    "instruction",
    "next instruction",
    "next step",
    "next steps",
    "approach",
    "new approach",
];

/// If `line` is a `Label: rest` header for a known label, returns the
/// lower-cased label and the rest of the line.
fn header(line: &str) -> Option<(String, &str)> {
    let stripped = line.trim_start_matches([' ', '\t', '*', '#', '>', '-']);
    let colon = stripped.find(':')?;
    let label = stripped[..colon].trim().trim_matches('*').trim().to_lowercase();
    if !SECTION_LABELS.contains(&label.as_str()) {
        return None;
    }
    let rest = stripped[colon + 1..].trim().trim_matches('*').trim();
    Some((label, rest))
}

/// Text of the first section opened by one of `labels`, up to the next
/// known header or markdown heading. List markers are dropped and lines
/// are joined with spaces.
fn section(text: &str, labels: &[&str]) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut inside = false;

    for line in text.lines() {
        if let Some((label, rest)) = header(line) {
            if inside {
                break;
            }
            if labels.contains(&label.as_str()) {
                inside = true;
                if !rest.is_empty() {
                    parts.push(rest);
                }
            }
            continue;
        }
        if !inside {
            continue;
        }
        if line.trim_start().starts_with('#') {
            break;
        }
        let trimmed = line.trim().trim_start_matches(['*', '-']).trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    let joined = parts.join(" ");
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_decision_with_sections() {
        let decision = HumanDecision::parse(
            "**Decision:** CONTINUE\n\
             **Reasoning:** The parser works but\n\
             edge cases are untested.\n\
             **Instruction:** Add tests for empty input.",
        );
        assert_eq!(decision.action, DecisionAction::Continue);
        assert_eq!(decision.reasoning, "The parser works but edge cases are untested.");
        assert_eq!(decision.new_instruction, "Add tests for empty input.");
        assert!(decision.should_continue());
    }

    #[test]
    fn label_beats_bare_keyword() {
        let decision = HumanDecision::parse("We could CONTINUE, but\nAction: terminate\nReasoning: good enough");
        assert!(decision.should_terminate());
        assert!(decision.new_instruction.is_empty());
        assert_eq!(decision.reasoning, "good enough");
    }

    #[test]
    fn bare_upper_case_keyword() {
        let decision = HumanDecision::parse("TERMINATE - the report is complete.");
        assert!(decision.should_terminate());
    }

    #[test]
    fn lower_case_prose_does_not_terminate() {
        let decision = HumanDecision::parse("I am not sure this is done. Please check the logs again.");
        assert_eq!(decision.action, DecisionAction::Continue);
        assert_eq!(decision.new_instruction, "I am not sure this is done. Please check the logs again.");
    }

    #[test]
    fn redirect_reads_approach() {
        let decision = HumanDecision::parse(
            "Decision: REDIRECT\n\
             Approach: use the streaming API\n\
             Instruction: re-fetch the data in pages",
        );
        assert!(decision.is_redirect());
        assert!(decision.should_continue());
        assert_eq!(decision.modified_approach, "use the streaming API");
        assert_eq!(decision.new_instruction, "re-fetch the data in pages");
    }

    #[test]
    fn section_stops_at_heading() {
        let decision = HumanDecision::parse(
            "Decision: CONTINUE\n\
             Reasoning:\n\
             - coverage is low\n\
             # Notes\n\
             unrelated",
        );
        assert_eq!(decision.reasoning, "coverage is low");
    }

    #[test]
    fn action_display_and_serde() {
        assert_eq!(DecisionAction::Redirect.to_string(), "REDIRECT");
        assert_eq!(serde_json::to_value(DecisionAction::Terminate).unwrap(), "TERMINATE");
        assert_eq!(DecisionAction::default(), DecisionAction::Continue);
    }
}
