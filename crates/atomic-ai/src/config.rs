use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::AuthScheme;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load from a YAML file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }

    /// Apply environment overrides: `PORT`, `LLM_BASE_URL`, and the API key
    /// variable named by `llm.api_key_env`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {port}")))?;
        }
        if let Some(base_url) = var("LLM_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.base_url = base_url;
        }
        if let Some(key) = var(&self.llm.api_key_env).filter(|v| !v.is_empty()) {
            self.llm.api_key = Some(key);
        }
        Ok(())
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    90
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

// ============================================================================
// LlmConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Resolved from `api_key_env`; never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_scheme: AuthScheme,
    #[serde(default = "default_model")]
    pub vision_model: String,
    #[serde(default = "default_model")]
    pub chat_model: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_llm_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            api_key: None,
            auth_scheme: AuthScheme::default(),
            vision_model: default_model(),
            chat_model: default_model(),
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_llm_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://fal.run/openrouter/router/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "FAL_KEY".to_string()
}

fn default_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_llm_request_timeout() -> u64 {
    60
}

// ============================================================================
// ValidatorConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_validator_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_validator_max_tokens(),
        }
    }
}

fn default_validator_max_tokens() -> u32 {
    200
}

// ============================================================================
// ChatConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// `0` disables the cap.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_chat_max_tokens(),
            temperature: default_temperature(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

fn default_chat_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_history_turns() -> usize {
    20
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================
