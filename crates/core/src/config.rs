//! Configuration management for sift.
//!
//! Configuration is merged from, in increasing precedence:
//! - built-in defaults
//! - the YAML config file (`.sift/config.yaml`)
//! - environment variables
//! - command-line flags
//!
//! The configuration is workspace-centric; indexes, conversations and prompt
//! overrides live under `.sift/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .sift/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider used as the generator ("ollama" or "static")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Retrieval and task tuning
    pub rag: RagSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
        temperature: Option<f32>,
        #[serde(default)]
        stream: bool,
    },
    Static {
        reply: String,
    },
}

/// Retrieval, history and strategy settings (`rag:` section of config.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSettings {
    /// Chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum fuzzy score (0-100) for a keyword seed match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u8,

    /// Messages of history injected into chat prompts
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Messages kept in memory per conversation
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Conversation storage directory (default: .sift/conversations)
    #[serde(default)]
    pub history_dir: Option<PathBuf>,

    /// Language used when detection fails
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Languages responses may be written in
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,

    /// Default question complexity
    #[serde(default = "default_complexity")]
    pub complexity: String,
}

fn default_top_k() -> usize {
    5
}

fn default_fuzzy_threshold() -> u8 {
    70
}

fn default_history_limit() -> usize {
    6
}

fn default_history_window() -> usize {
    50
}

fn default_language() -> String {
    "English".to_string()
}

fn default_supported_languages() -> Vec<String> {
    vec!["English".to_string(), "Arabic".to_string()]
}

fn default_complexity() -> String {
    "medium".to_string()
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fuzzy_threshold: default_fuzzy_threshold(),
            history_limit: default_history_limit(),
            history_window: default_history_window(),
            history_dir: None,
            default_language: default_language(),
            supported_languages: default_supported_languages(),
            complexity: default_complexity(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    rag: Option<RagSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            log_level: None,
            log_format: LogFormat::default(),
            verbose: false,
            no_color: false,
            llm: None,
            rag: RagSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the YAML file and defaults.
    ///
    /// Environment variables:
    /// - `SIFT_WORKSPACE`: Override workspace path
    /// - `SIFT_CONFIG`: Path to config file
    /// - `SIFT_PROVIDER`: LLM provider
    /// - `SIFT_MODEL`: Model identifier
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("SIFT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("SIFT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".sift/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("SIFT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("SIFT_MODEL") {
            config.model = model;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                    ProviderConfig::Static { .. } => "static".to_string(),
                };
            }

            result.llm = Some(llm);
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .sift directory.
    pub fn sift_dir(&self) -> PathBuf {
        self.workspace.join(".sift")
    }

    /// Ensure the .sift directory exists.
    pub fn ensure_sift_dir(&self) -> AppResult<()> {
        let sift_dir = self.sift_dir();
        if !sift_dir.exists() {
            std::fs::create_dir_all(&sift_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .sift directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Directory holding per-conversation history files.
    pub fn history_dir(&self) -> PathBuf {
        match &self.rag.history_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.workspace.join(dir),
            None => self.sift_dir().join("conversations"),
        }
    }

    /// Get the configuration for a provider, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "static"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if self.rag.top_k == 0 {
            return Err(AppError::Config("rag.top_k must be at least 1".to_string()));
        }

        if self.rag.fuzzy_threshold > 100 {
            return Err(AppError::Config(format!(
                "rag.fuzzy_threshold must be within 0-100, got {}",
                self.rag.fuzzy_threshold
            )));
        }

        if self.rag.history_window < self.rag.history_limit {
            return Err(AppError::Config(format!(
                "rag.history_window ({}) must be >= rag.history_limit ({})",
                self.rag.history_window, self.rag.history_limit
            )));
        }

        if let Some(ProviderConfig::Ollama { endpoint, .. }) = self.get_provider_config(&self.provider) {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "Ollama endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }
        }

        Ok(())
    }
}
