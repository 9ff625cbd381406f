//! Configuration loading, validation, and management for DevPilot.
//!
//! Loads configuration from `~/.devpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.devpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Remote project service
    #[serde(default)]
    pub backend: BackendConfig,

    /// Reasoning and dispatch limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Session retention and persistence
    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("backend", &self.backend)
            .field("agent", &self.agent)
            .field("sessions", &self.sessions)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("auth_token", &redact(&self.auth_token))
            .field("user_id", &self.user_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_tokens", &format!("[{} token(s)]", self.api_tokens.len()))
            .finish()
    }
}

/// Where and how to reach the project management service.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Path prefix in front of every operation
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Sent as `Authorization: Bearer <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Sent as `X-User-ID`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Per-call timeout
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8080".into()
}
fn default_api_prefix() -> String {
    "/api/agent".into()
}
fn default_backend_timeout() -> u64 {
    15
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            api_prefix: default_api_prefix(),
            auth_token: None,
            user_id: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// What to do when a message arrives for a session that is still busy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Wait for the in-flight message to finish.
    #[default]
    Queue,
    /// Fail immediately with a busy error.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool invocations per user message
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Most recent turns sent to the model
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,

    /// Token budget for rendered history
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    /// Outer deadline for handling one message end to end
    #[serde(default = "default_request_deadline")]
    pub request_deadline_secs: u64,

    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Replace the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_steps() -> usize {
    5
}
fn default_max_context_turns() -> usize {
    40
}
fn default_max_context_tokens() -> usize {
    6000
}
fn default_model_timeout() -> u64 {
    60
}
fn default_request_deadline() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_context_turns: default_max_context_turns(),
            max_context_tokens: default_max_context_tokens(),
            model_timeout_secs: default_model_timeout(),
            request_deadline_secs: default_request_deadline(),
            busy_policy: BusyPolicy::default(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Idle sessions older than this are evicted (0 = never)
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Directory for the JSON session archive; unset keeps sessions in memory only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_dir: Option<PathBuf>,
}

fn default_ttl_minutes() -> u64 {
    60
}
fn default_max_sessions() -> usize {
    10_000
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            max_sessions: default_max_sessions(),
            persist_dir: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Static bearer tokens accepted on `/v1`. Empty disables auth.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_tokens: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_tokens: vec![],
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.devpilot/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    ///
    /// - `DEVPILOT_API_KEY`, then `OPENAI_API_KEY` (only if no key is configured)
    /// - `DEVPILOT_PROVIDER`, `DEVPILOT_MODEL`
    /// - `DEVPILOT_BACKEND_URL`, then `SPRING_BACKEND_URL`
    /// - `DEVPILOT_BACKEND_TOKEN`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("DEVPILOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("DEVPILOT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("DEVPILOT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("DEVPILOT_BACKEND_URL").or_else(|| lookup("SPRING_BACKEND_URL")) {
            self.backend.base_url = url;
        }
        if let Some(token) = lookup("DEVPILOT_BACKEND_TOKEN") {
            self.backend.auth_token = Some(token);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".devpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError("agent.max_steps must be at least 1".into()));
        }

        if self.agent.max_context_turns == 0 || self.agent.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "agent context limits must be greater than 0".into(),
            ));
        }

        if self.agent.model_timeout_secs == 0
            || self.agent.request_deadline_secs == 0
            || self.backend.timeout_secs == 0
        {
            return Err(ConfigError::ValidationError("timeouts must be greater than 0".into()));
        }

        if !(self.backend.base_url.starts_with("http://") || self.backend.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                self.backend.base_url
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
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
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            backend: BackendConfig::default(),
            agent: AgentConfig::default(),
            sessions: SessionsConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
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
