use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, SubtranError};

/// Width of the ellipsis appended to truncated translations
pub const ELLIPSIS: &str = "...";

// Default values for fields that older config files may not carry
fn default_timeout_secs() -> u64 {
    300
}

fn default_min_break_position() -> usize {
    60
}

fn default_max_line_chars() -> usize {
    42
}

fn default_codec() -> CodecKind {
    CodecKind::Bracket
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub completion: CompletionConfig,
    pub translate: TranslateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible chat completion API
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Optional cap on completion size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Language of the input subtitles, as named in the prompt
    pub source_language: String,
    /// Language to translate into, as named in the prompt
    pub target_language: String,
    /// Maximum number of entries per request
    pub batch_size: usize,
    /// Total attempts per batch before falling back to the source text
    pub max_retries: u32,
    /// Pause between successive batch dispatches (seconds)
    pub inter_batch_delay_secs: u64,
    /// Pause between attempts of the same batch (seconds)
    pub inter_retry_delay_secs: u64,
    /// Translations longer than this many characters are truncated
    pub soft_char_cap: usize,
    /// Truncation point before the ellipsis is appended
    pub hard_char_cap: usize,
    /// A word-boundary cut is only taken past this character position
    #[serde(default = "default_min_break_position")]
    pub min_break_position: usize,
    /// Target line width communicated to the model
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,
    /// Payload format used between the batch and the model
    #[serde(default = "default_codec")]
    pub codec: CodecKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// `[i] text` sections joined by an explicit separator token
    Bracket,
    /// One `N. text` entry per line; ambiguous when the model emits sub-lists
    Numbered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion: CompletionConfig {
                endpoint: "https://api.groq.com/openai/v1".to_string(),
                model: "openai/gpt-oss-120b".to_string(),
                api_key_env: "GROQ_API_KEY".to_string(),
                temperature: 0.1,
                max_tokens: None,
                timeout_secs: default_timeout_secs(),
            },
            translate: TranslateConfig::default(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            source_language: "English".to_string(),
            target_language: "Albanian".to_string(),
            batch_size: 25,
            max_retries: 3,
            inter_batch_delay_secs: 12,
            inter_retry_delay_secs: 5,
            soft_char_cap: 84,
            hard_char_cap: 81,
            min_break_position: default_min_break_position(),
            max_line_chars: default_max_line_chars(),
            codec: default_codec(),
        }
    }
}

impl TranslateConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_secs(self.inter_batch_delay_secs)
    }

    pub fn inter_retry_delay(&self) -> Duration {
        Duration::from_secs(self.inter_retry_delay_secs)
    }

    /// Reject settings the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SubtranError::Config("batch_size must be at least 1".to_string()));
        }
        if self.max_retries == 0 {
            return Err(SubtranError::Config("max_retries must be at least 1".to_string()));
        }
        if self.hard_char_cap + ELLIPSIS.chars().count() > self.soft_char_cap {
            return Err(SubtranError::Config(format!(
                "hard_char_cap ({}) plus ellipsis must fit within soft_char_cap ({})",
                self.hard_char_cap, self.soft_char_cap
            )));
        }
        if self.min_break_position >= self.hard_char_cap {
            return Err(SubtranError::Config(format!(
                "min_break_position ({}) must be below hard_char_cap ({})",
                self.min_break_position, self.hard_char_cap
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtranError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SubtranError::Config(format!("Failed to parse config file: {}", e)))?;
        config.translate.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| SubtranError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SubtranError::Config(format!("Failed to serialize config: {}", e)))
    }
}
