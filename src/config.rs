//! Configuration management for Autopost
//!
//! Loads settings from TOML file at ~/.autopost/config.toml

use crate::error::{AutopostError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (defaults to ~/.autopost)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Duplicate-avoidance loop settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Text generator settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Prompt settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Posting settings
    #[serde(default)]
    pub poster: PosterConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".autopost"))
        .unwrap_or_else(|| PathBuf::from(".autopost"))
}

fn default_true() -> bool {
    true
}

/// Generation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Generator calls before falling back to mutation
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Candidates at or above this Jaccard score are duplicates
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f64,

    /// Candidates at or below this Hamming distance are duplicates
    #[serde(default = "default_hamming_threshold")]
    pub hamming_threshold: u32,

    /// Platform length limit, in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Shingle length in characters
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,

    /// Block terms extracted from the nearest neighbor on rejection
    #[serde(default = "default_block_terms")]
    pub block_terms: usize,

    /// Block terms listed in the retry prompt
    #[serde(default = "default_prompt_block_terms")]
    pub prompt_block_terms: usize,

    /// Seed for the fallback mutator (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_jaccard_threshold() -> f64 {
    0.80
}

fn default_hamming_threshold() -> u32 {
    3
}

fn default_max_chars() -> usize {
    140
}

fn default_shingle_size() -> usize {
    crate::dedup::DEFAULT_SHINGLE_SIZE
}

fn default_block_terms() -> usize {
    8
}

fn default_prompt_block_terms() -> usize {
    12
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            max_attempts: default_max_attempts(),
            jaccard_threshold: default_jaccard_threshold(),
            hamming_threshold: default_hamming_threshold(),
            max_chars: default_max_chars(),
            shingle_size: default_shingle_size(),
            block_terms: default_block_terms(),
            prompt_block_terms: default_prompt_block_terms(),
            seed: None,
        }
    }
}

/// Text generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// CLI provider ("claude_code" or "openclaw")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Optional model override passed to the provider
    #[serde(default)]
    pub model: Option<String>,

    /// Generator timeout in seconds (provider default when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_provider() -> String {
    "claude_code".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            provider: default_provider(),
            model: None,
            timeout_secs: None,
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Base prompt sent on every attempt
    #[serde(default = "default_base_prompt")]
    pub base: String,

    /// Optional topic appended to the base prompt
    #[serde(default)]
    pub topic: Option<String>,
}

fn default_base_prompt() -> String {
    "You write posts for X (formerly Twitter).\n\
     Write one interesting fact about technology in 140 characters or fewer.\n\
     Open with a hook that stops the scroll.\n\
     Output only the post text."
        .to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        PromptConfig {
            base: default_base_prompt(),
            topic: None,
        }
    }
}

/// Poster configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PosterConfig {
    /// Generate and log without publishing
    #[serde(default)]
    pub dry_run: bool,

    /// External command that publishes a post; the text is passed as the last argument
    #[serde(default)]
    pub command: Option<String>,

    /// Extra arguments placed before the text
    #[serde(default)]
    pub args: Vec<String>,

    /// URL template for published posts, `{id}` is replaced with the post id
    #[serde(default)]
    pub url_template: Option<String>,
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write a daily-rotated log file under data_dir/logs
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { file: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            generation: GenerationConfig::default(),
            ai: AiConfig::default(),
            prompt: PromptConfig::default(),
            poster: PosterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(AutopostError::Config(format!(
                "Configuration file not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    /// Get the data directory, expanding ~ if present
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    /// Durable history index store
    pub fn index_path(&self) -> PathBuf {
        self.data_dir().join("history_index.json")
    }

    /// Append-only preview log
    pub fn preview_log_path(&self) -> PathBuf {
        self.data_dir().join("preview.md")
    }

    /// Latest-run payload, overwritten every run
    pub fn payload_path(&self) -> PathBuf {
        self.data_dir().join("payload.json")
    }

    /// Directory for rotated log files
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("AUTOPOST_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(provider) = std::env::var("AUTOPOST_PROVIDER") {
            self.ai.provider = provider;
        }
        if let Ok(model) = std::env::var("AUTOPOST_MODEL") {
            self.ai.model = if model.is_empty() { None } else { Some(model) };
        }
        if let Ok(topic) = std::env::var("AUTOPOST_TOPIC") {
            self.prompt.topic = if topic.is_empty() { None } else { Some(topic) };
        }
        if let Ok(dry_run) = std::env::var("AUTOPOST_DRY_RUN") {
            self.poster.dry_run = dry_run.eq_ignore_ascii_case("true") || dry_run == "1";
        }
    }

    /// Reject settings the generation loop cannot run with
    pub fn validate(&self) -> Result<()> {
        let g = &self.generation;
        if g.max_attempts == 0 {
            return Err(AutopostError::Validation(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&g.jaccard_threshold) {
            return Err(AutopostError::Validation(format!(
                "generation.jaccard_threshold must be within 0.0..=1.0, got {}",
                g.jaccard_threshold
            )));
        }
        if g.hamming_threshold > 64 {
            return Err(AutopostError::Validation(format!(
                "generation.hamming_threshold must be at most 64, got {}",
                g.hamming_threshold
            )));
        }
        if g.shingle_size == 0 || g.max_chars == 0 {
            return Err(AutopostError::Validation(
                "generation.shingle_size and generation.max_chars must be positive".to_string(),
            ));
        }
        if !self.poster.dry_run && self.poster.command.is_none() {
            return Err(AutopostError::Config(
                "poster.command is required unless poster.dry_run is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AutopostError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Create a default configuration file at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# Autopost Configuration

# Where the history index, preview log, payload and logs live
data_dir = "~/.autopost"

[generation]
# Generator calls before the fallback mutator takes over
max_attempts = 5
# Duplicate when Jaccard >= jaccard_threshold OR Hamming <= hamming_threshold
jaccard_threshold = 0.80
hamming_threshold = 3
# Platform length limit (characters)
max_chars = 140
shingle_size = 2
# Block terms taken from the nearest neighbor, and how many the retry prompt lists
block_terms = 8
prompt_block_terms = 12
# Fix the fallback mutator's random choices
# seed = 42

[ai]
# "claude_code" or "openclaw"
provider = "claude_code"
# model = "sonnet"
# timeout_secs = 60

[prompt]
# base = "..."
# topic = "open source"

[poster]
# Generate and log without publishing
dry_run = true
# External publishing command; receives the post text as its last argument
# and prints the post id on stdout
# command = "/usr/local/bin/post-to-x"
# args = ["--account", "main"]
# url_template = "https://x.com/i/web/status/{id}"

[logging]
file = true
"#;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
