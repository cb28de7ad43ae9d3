//! Configuration loading, validation, and management for Loopwright.
//!
//! Loads configuration from `~/.loopwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.loopwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible endpoint (without `/chat/completions`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Round cap per `send`
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Override the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Directory every path-taking tool is confined to. Defaults to the
    /// current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_rounds() -> u32 {
    25
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_rounds", &self.max_rounds)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "[custom]"))
            .field("workspace_root", &self.workspace_root)
            .field("auth", &self.auth)
            .field("client", &self.client)
            .field("tools", &self.tools)
            .field("agent", &self.agent)
            .finish()
    }
}

/// Credentials for the chat endpoint.
///
/// Either a static `api_key`, or a long-lived `secret` traded at
/// `exchange_url` for short-lived bearer tokens.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_url: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &redact(&self.api_key))
            .field("secret", &redact(&self.secret))
            .field("exchange_url", &self.exchange_url)
            .finish()
    }
}

/// HTTP client settings for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra client-identification headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retry once without streaming when the stream cannot be opened
    #[serde(default = "default_true")]
    pub fallback_to_non_streaming: bool,
}

fn default_user_agent() -> String {
    concat!("loopwright/", env!("CARGO_PKG_VERSION")).into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            headers: HashMap::new(),
            request_timeout_secs: default_request_timeout(),
            fallback_to_non_streaming: true,
        }
    }
}

/// Limits applied by the built-in tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_bash_timeout")]
    pub bash_timeout_secs: u64,

    /// Maximum captured shell output, in bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Cap on grep lines and glob results
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Lines returned by `read_file` when no limit is given
    #[serde(default = "default_read_limit")]
    pub read_default_limit: usize,
}

fn default_bash_timeout() -> u64 {
    30
}
fn default_max_output_bytes() -> usize {
    1024 * 1024
}
fn default_max_results() -> usize {
    200
}
fn default_read_limit() -> usize {
    2000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bash_timeout_secs: default_bash_timeout(),
            max_output_bytes: default_max_output_bytes(),
            max_results: default_max_results(),
            read_default_limit: default_read_limit(),
        }
    }
}

/// Agent loop behaviour switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Emit `tool_input_progress` events while tool arguments stream in
    #[serde(default)]
    pub emit_tool_input_progress: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.loopwright/config.toml).
    ///
    /// Environment variables override the file:
    /// - `LOOPWRIGHT_API_URL`, `LOOPWRIGHT_MODEL`, `LOOPWRIGHT_WORKSPACE`
    /// - `LOOPWRIGHT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `LOOPWRIGHT_SECRET`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LOOPWRIGHT_API_URL") {
            self.api_url = url;
        }
        if let Some(model) = lookup("LOOPWRIGHT_MODEL") {
            self.model = model;
        }
        if let Some(root) = lookup("LOOPWRIGHT_WORKSPACE") {
            self.workspace_root = Some(PathBuf::from(root));
        }
        if let Some(key) = lookup("LOOPWRIGHT_API_KEY") {
            self.auth.api_key = Some(key);
        } else if self.auth.api_key.is_none() {
            self.auth.api_key = lookup("OPENAI_API_KEY");
        }
        if let Some(secret) = lookup("LOOPWRIGHT_SECRET") {
            self.auth.secret = Some(secret);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loopwright")
    }

    /// The confinement root, falling back to the current directory.
    pub fn resolved_workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::ValidationError(
                "top_p must be between 0.0 and 1.0".into(),
            ));
        }

        if self.max_rounds == 0 {
            return Err(ConfigError::ValidationError("max_rounds must be at least 1".into()));
        }

        if self.tools.bash_timeout_secs == 0
            || self.tools.max_output_bytes == 0
            || self.tools.max_results == 0
            || self.tools.read_default_limit == 0
        {
            return Err(ConfigError::ValidationError(
                "tool limits must be positive".into(),
            ));
        }

        if self.auth.secret.is_some() && self.auth.exchange_url.is_none() {
            return Err(ConfigError::ValidationError(
                "auth.secret requires auth.exchange_url".into(),
            ));
        }

        Ok(())
    }

    /// Check if any credential is available (from config or environment).
    pub fn has_credentials(&self) -> bool {
        self.auth.api_key.is_some() || self.auth.secret.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_rounds: default_max_rounds(),
            system_prompt: None,
            workspace_root: None,
            auth: AuthConfig::default(),
            client: ClientConfig::default(),
            tools: ToolsConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
