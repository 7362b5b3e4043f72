//! Configuration loading, validation, and management for ActLoop.
//!
//! Loads agent and supervisory-loop settings from a TOML file with
//! environment variable overrides. Validates all settings before use.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Single-agent ReAct settings
    #[serde(default)]
    pub react: ReactSettings,

    /// Per-agent message memory
    #[serde(default)]
    pub memory: MemorySettings,

    /// Memory compression
    #[serde(default)]
    pub compression: CompressionSettings,

    /// Planner/Executor supervisory loop
    #[serde(default)]
    pub dual_act: DualActSettings,
}

/// How the model may use tools, as written in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceSetting {
    #[default]
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactSettings {
    /// Maximum model calls per reply
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub stop: Vec<String>,

    #[serde(default)]
    pub tool_choice: ToolChoiceSetting,
}

fn default_max_iterations() -> usize {
    10
}

impl Default for ReactSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            temperature: None,
            max_tokens: None,
            stop: Vec::new(),
            tool_choice: ToolChoiceSetting::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Oldest messages are dropped beyond this count (0 = unbounded)
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Keep messages whose id is already stored
    #[serde(default)]
    pub allow_duplicates: bool,
}

fn default_max_messages() -> usize {
    1000
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            allow_duplicates: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Estimated memory tokens above which compression runs
    #[serde(default = "default_trigger_tokens")]
    pub trigger_tokens: usize,

    /// Most recent messages kept verbatim
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_trigger_tokens() -> usize {
    8000
}
fn default_keep_recent() -> usize {
    3
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger_tokens: default_trigger_tokens(),
            keep_recent: default_keep_recent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualActSettings {
    /// Maximum Planner/Executor rounds
    #[serde(default = "default_max_hr_loops")]
    pub max_hr_loops: usize,

    /// Template for the planner's review input. Placeholders:
    /// `{task}`, `{summary}`, `{steps}`, `{confidence}`, `{suggested_next_action}`.
    /// Empty means the built-in review prompt.
    #[serde(default)]
    pub human_decision_prompt: String,

    /// Template for the executor's input. Placeholder: `{instruction}`.
    /// Empty means the instruction is passed through.
    #[serde(default)]
    pub reactive_task_prompt: String,
}

fn default_max_hr_loops() -> usize {
    3
}

impl Default for DualActSettings {
    fn default() -> Self {
        Self {
            max_hr_loops: default_max_hr_loops(),
            human_decision_prompt: String::new(),
            reactive_task_prompt: String::new(),
        }
    }
}

impl LoopConfig {
    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::parse(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `$ACTLOOP_CONFIG`, or `actloop.toml` in the working directory.
    pub fn config_path() -> PathBuf {
        std::env::var("ACTLOOP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("actloop.toml"))
    }

    /// Apply `ACTLOOP_*` environment overrides (highest priority).
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `ACTLOOP_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = parsed_override::<usize>(&lookup, "ACTLOOP_MAX_ITERATIONS")? {
            self.react.max_iterations = value;
        }
        if let Some(value) = parsed_override::<usize>(&lookup, "ACTLOOP_MAX_HR_LOOPS")? {
            self.dual_act.max_hr_loops = value;
        }
        if let Some(value) = parsed_override::<f32>(&lookup, "ACTLOOP_TEMPERATURE")? {
            self.react.temperature = Some(value);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.react.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "react.max_iterations must be greater than 0".into(),
            ));
        }

        if self.dual_act.max_hr_loops == 0 {
            return Err(ConfigError::ValidationError(
                "dual_act.max_hr_loops must be greater than 0".into(),
            ));
        }

        if let Some(t) = self.react.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "react.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.compression.enabled && self.compression.keep_recent == 0 {
            return Err(ConfigError::ValidationError(
                "compression.keep_recent must be greater than 0 when compression is enabled".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parsed_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ConfigError::ValidationError(format!("{key}={raw:?} is invalid: {e}"))
        }),
        None => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for actloop_core::Error {
    fn from(e: ConfigError) -> Self {
        actloop_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = LoopConfig::default();
        assert_eq!(config.react.max_iterations, 10);
        assert_eq!(config.dual_act.max_hr_loops, 3);
        assert_eq!(config.memory.max_messages, 1000);
        assert_eq!(config.compression.keep_recent, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = LoopConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: LoopConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = LoopConfig::from_toml_str(
            r#"
            [react]
            max_iterations = 4
            tool_choice = "required"

            [dual_act]
            reactive_task_prompt = "Task: {instruction}"
            "#,
        )
        .unwrap();
        assert_eq!(config.react.max_iterations, 4);
        assert_eq!(config.react.tool_choice, ToolChoiceSetting::Required);
        assert_eq!(config.dual_act.max_hr_loops, 3);
        assert_eq!(config.dual_act.reactive_task_prompt, "Task: {instruction}");
    }

    #[test]
    fn zero_hr_loops_rejected() {
        let err = LoopConfig::from_toml_str("[dual_act]\nmax_hr_loops = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("max_hr_loops"));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = LoopConfig {
            react: ReactSettings {
                temperature: Some(5.0),
                ..ReactSettings::default()
            },
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn compression_requires_kept_messages() {
        let mut config = LoopConfig::default();
        config.compression.enabled = true;
        config.compression.keep_recent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = LoopConfig::load_from(Path::new("/nonexistent/actloop.toml")).unwrap();
        assert_eq!(config, LoopConfig::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[memory]\nmax_messages = 50\n").unwrap();
        let config = LoopConfig::load_from(file.path()).unwrap();
        assert_eq!(config.memory.max_messages, 50);
    }

    #[test]
    fn unparseable_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[react\nmax_iterations = ").unwrap();
        let err = LoopConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = LoopConfig::default_toml();
        assert!(toml_str.contains("max_iterations"));
        assert!(toml_str.contains("max_hr_loops"));
    }

    #[test]
    fn config_error_converts_to_domain_error() {
        let err: actloop_core::Error = ConfigError::ValidationError("bad".into()).into();
        assert!(matches!(err, actloop_core::Error::Config { .. }));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = LoopConfig::from_toml_str("[react]\nmax_iterations = 5\n").unwrap();
        config
            .apply_overrides(lookup(&[
                ("ACTLOOP_MAX_ITERATIONS", "7"),
                ("ACTLOOP_MAX_HR_LOOPS", " 6 "),
                ("ACTLOOP_TEMPERATURE", "0.3"),
            ]))
            .unwrap();
        assert_eq!(config.react.max_iterations, 7);
        assert_eq!(config.dual_act.max_hr_loops, 6);
        assert_eq!(config.react.temperature, Some(0.3));
    }

    #[test]
    fn absent_overrides_leave_config_alone() {
        let mut config = LoopConfig::default();
        config.apply_overrides(lookup(&[])).unwrap();
        assert_eq!(config.react.max_iterations, 10);
        assert_eq!(config.dual_act.max_hr_loops, 3);
        assert_eq!(config.react.temperature, None);
    }

    #[test]
    fn unparsable_override_is_a_validation_error() {
        let mut config = LoopConfig::default();
        let err = config
            .apply_overrides(lookup(&[("ACTLOOP_MAX_HR_LOOPS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("ACTLOOP_MAX_HR_LOOPS"));
        assert_eq!(config.dual_act.max_hr_loops, 3);

        let err = config
            .apply_overrides(lookup(&[("ACTLOOP_TEMPERATURE", "warm")]))
            .unwrap_err();
        assert!(err.to_string().contains("ACTLOOP_TEMPERATURE"));
    }

    #[test]
    fn out_of_range_override_fails_validation() {
        let mut config = LoopConfig::default();
        config
            .apply_overrides(lookup(&[("ACTLOOP_TEMPERATURE", "3.5")]))
            .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn env_overrides_read_process_environment() {
        // Only this test touches these variables.
        unsafe {
            std::env::set_var("ACTLOOP_MAX_HR_LOOPS", "4");
            std::env::set_var("ACTLOOP_TEMPERATURE", "0.9");
        }
        let mut config = LoopConfig::default();
        let applied = config.apply_env_overrides();
        unsafe {
            std::env::remove_var("ACTLOOP_MAX_HR_LOOPS");
            std::env::remove_var("ACTLOOP_TEMPERATURE");
        }
        applied.unwrap();
        assert_eq!(config.dual_act.max_hr_loops, 4);
        assert_eq!(config.react.temperature, Some(0.9));
    }
}
