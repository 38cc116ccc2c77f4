//! Configuration loading, validation, and management for Oracle.
//!
//! Loads configuration from `~/.oracle/config.toml` with environment
//! variable overrides. Validates all settings at startup. The session core
//! never reads configuration itself: it receives an immutable
//! [`SessionConfig`] built from [`AppConfig`].

use oracle_core::memory::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.oracle/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Memory isolation key
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Fallback city for the weather tool
    #[serde(default = "default_city")]
    pub default_city: String,

    /// Context cap for every model call
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Default per-tool timeout
    #[serde(default = "default_tool_timeout_seconds")]
    pub tool_timeout_seconds: u64,

    /// Retry the session-end commit once before giving up
    #[serde(default = "default_true")]
    pub retry_on_commit_failure: bool,

    /// How long shutdown waits for the transcript commit
    #[serde(default = "default_commit_grace_seconds")]
    pub commit_grace_seconds: u64,

    /// Generate an opening greeting when a session activates
    #[serde(default = "default_true")]
    pub greet_on_start: bool,

    /// Per-tool timeout overrides, in seconds
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tool_timeouts: HashMap<String, u64>,

    /// Language model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Memory store configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Persona configuration
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Email tool credentials
    #[serde(default)]
    pub email: EmailConfig,
}

fn default_user_id() -> String {
    "Bruce Wayne".into()
}
fn default_city() -> String {
    "Chennai".into()
}
fn default_max_context_tokens() -> usize {
    8192
}
fn default_tool_timeout_seconds() -> u64 {
    10
}
fn default_commit_grace_seconds() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

/// Tools whose own work needs longer than the general default.
///
/// The weather tool tries wttr.in twice (5 s, then 7 s) before falling back
/// to Open-Meteo (geocode and forecast, 7 s each).
const BUILTIN_TOOL_TIMEOUTS: &[(&str, u64)] = &[("get_weather", 30)];

/// Largest accepted `|persona.utc_offset_minutes|`: one day, exclusive.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60;

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_model_url")]
    pub base_url: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_model_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_model_name() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.8
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_model_url(),
            model: default_model_name(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "file", "mem0", "in_memory" or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// JSONL path for the file backend (default: ~/.oracle/memory/facts.jsonl)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default = "default_mem0_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum facts per active recall
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    /// Maximum facts preloaded at session start
    #[serde(default = "default_preload_limit")]
    pub preload_limit: usize,

    /// Query used for the session-start preload
    #[serde(default = "default_preload_query")]
    pub preload_query: String,

    /// Deadline for a single recall, in seconds
    #[serde(default = "default_memory_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_mem0_url() -> String {
    "https://api.mem0.ai".into()
}
fn default_recall_limit() -> usize {
    10
}
fn default_preload_limit() -> usize {
    30
}
fn default_preload_query() -> String {
    "user preferences personal facts favorites name full name email".into()
}
fn default_memory_timeout_seconds() -> u64 {
    8
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            api_url: default_mem0_url(),
            api_key: None,
            recall_limit: default_recall_limit(),
            preload_limit: default_preload_limit(),
            preload_query: default_preload_query(),
            timeout_seconds: default_memory_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("recall_limit", &self.recall_limit)
            .field("preload_limit", &self.preload_limit)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,

    /// How the user is addressed in every reply
    #[serde(default = "default_honorific")]
    pub honorific: String,

    /// Fixed UTC offset used by the time tool and greetings
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,
}

fn default_persona_name() -> String {
    "Oracle".into()
}
fn default_honorific() -> String {
    "Mr. Wayne".into()
}
fn default_utc_offset_minutes() -> i32 {
    330
}
fn default_timezone_label() -> String {
    "IST".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            honorific: default_honorific(),
            utc_offset_minutes: default_utc_offset_minutes(),
            timezone_label: default_timezone_label(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_password: Option<String>,

    /// SMTP relay, reached over STARTTLS
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: None,
            app_password: None,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.sender.as_deref().is_some_and(|s| !s.trim().is_empty())
            && self.app_password.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender", &self.sender)
            .field("app_password", &redact(&self.app_password))
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.oracle/config.toml),
    /// then apply environment overrides.
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

    /// Apply environment overrides through `lookup`.
    ///
    /// - `USER_ID`, `DEFAULT_CITY`
    /// - `ORACLE_API_KEY` > `GOOGLE_API_KEY` > `OPENAI_API_KEY` (only if unset in file)
    /// - `ORACLE_MODEL`, `ORACLE_MODEL_URL`
    /// - `ORACLE_MEMORY_BACKEND`, `MEM0_API_KEY`
    /// - `GMAIL_USER`, `GMAIL_APP_PASSWORD`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(user) = get("USER_ID") {
            self.user_id = user;
        }
        if let Some(city) = get("DEFAULT_CITY") {
            self.default_city = city;
        }
        if self.model.api_key.is_none() {
            self.model.api_key = get("ORACLE_API_KEY")
                .or_else(|| get("GOOGLE_API_KEY"))
                .or_else(|| get("OPENAI_API_KEY"));
        }
        if let Some(model) = get("ORACLE_MODEL") {
            self.model.model = model;
        }
        if let Some(url) = get("ORACLE_MODEL_URL") {
            self.model.base_url = url;
        }
        if let Some(backend) = get("ORACLE_MEMORY_BACKEND") {
            self.memory.backend = backend;
        }
        if self.memory.api_key.is_none() {
            self.memory.api_key = get("MEM0_API_KEY");
        }
        if let Some(sender) = get("GMAIL_USER") {
            self.email.sender = Some(sender);
        }
        if let Some(password) = get("GMAIL_APP_PASSWORD") {
            self.email.app_password = Some(password);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".oracle")
    }

    /// Path of the JSONL fact file for the file backend.
    pub fn memory_path(&self) -> PathBuf {
        self.memory
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("memory").join("facts.jsonl"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::ValidationError("user_id must not be empty".into()));
        }
        if self.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError("max_context_tokens must be > 0".into()));
        }
        if self.tool_timeout_seconds == 0 || self.tool_timeouts.values().any(|t| *t == 0) {
            return Err(ConfigError::ValidationError("tool timeouts must be > 0".into()));
        }
        if self.memory.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError("memory.timeout_seconds must be > 0".into()));
        }
        if self.persona.utc_offset_minutes.abs() >= MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::ValidationError(format!(
                "persona.utc_offset_minutes must be within ±{} (got {})",
                MAX_UTC_OFFSET_MINUTES - 1,
                self.persona.utc_offset_minutes
            )));
        }
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !matches!(self.memory.backend.as_str(), "file" | "mem0" | "in_memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}'",
                self.memory.backend
            )));
        }
        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// The immutable projection handed to a session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            user_id: UserId::new(self.user_id.trim()),
            default_city: self.default_city.clone(),
            max_context_tokens: self.max_context_tokens,
            tool_timeout: Duration::from_secs(self.tool_timeout_seconds),
            tool_timeouts: BUILTIN_TOOL_TIMEOUTS
                .iter()
                .map(|(name, secs)| (name.to_string(), *secs))
                .chain(self.tool_timeouts.iter().map(|(name, secs)| (name.clone(), *secs)))
                .map(|(name, secs)| (name, Duration::from_secs(secs)))
                .collect(),
            retry_on_commit_failure: self.retry_on_commit_failure,
            commit_grace: Duration::from_secs(self.commit_grace_seconds),
            recall_limit: self.memory.recall_limit,
            preload_limit: self.memory.preload_limit,
            preload_query: self.memory.preload_query.clone(),
            memory_timeout: Duration::from_secs(self.memory.timeout_seconds),
            greet_on_start: self.greet_on_start,
            persona: self.persona.clone(),
        }
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
            user_id: default_user_id(),
            default_city: default_city(),
            max_context_tokens: default_max_context_tokens(),
            tool_timeout_seconds: default_tool_timeout_seconds(),
            retry_on_commit_failure: true,
            commit_grace_seconds: default_commit_grace_seconds(),
            greet_on_start: true,
            tool_timeouts: HashMap::new(),
            model: ModelConfig::default(),
            memory: MemoryConfig::default(),
            persona: PersonaConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

/// Everything a session needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_id: UserId,
    pub default_city: String,
    pub max_context_tokens: usize,
    pub tool_timeout: Duration,
    pub tool_timeouts: HashMap<String, Duration>,
    pub retry_on_commit_failure: bool,
    pub commit_grace: Duration,
    pub recall_limit: usize,
    pub preload_limit: usize,
    pub preload_query: String,
    /// Deadline for every recall, preload included.
    pub memory_timeout: Duration,
    pub greet_on_start: bool,
    pub persona: PersonaConfig,
}

impl SessionConfig {
    /// Timeout for a specific tool, falling back to the default.
    ///
    /// Configured overrides win over the built-in per-tool budgets.
    pub fn timeout_for(&self, tool_name: &str) -> Duration {
        self.tool_timeouts.get(tool_name).copied().unwrap_or(self.tool_timeout)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        AppConfig::default().session_config()
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
