use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::chat::assembler::LineFraming;
use crate::config_env::{
    optional_trimmed_env, parse_f32_env, parse_u32_env, require_non_empty_env, string_env_or,
};
use crate::llm::catalog::{DEFAULT_MODEL_ID, find_model};

pub const DEFAULT_RELAY_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_HTTP_REFERER: &str = "http://localhost:3000";
pub const DEFAULT_APP_TITLE: &str = "Advanced Chatbot App";
pub const DEFAULT_RELAY_CHAT_URL: &str = "http://127.0.0.1:8080/api/chat";

pub const CHAT_RELAY_URL_VAR: &str = "CHAT_RELAY_URL";
pub const CHAT_MODEL_VAR: &str = "CHAT_MODEL";
pub const CHAT_STREAM_FRAMING_VAR: &str = "CHAT_STREAM_FRAMING";
pub const CHAT_EXPORT_DIR_VAR: &str = "CHAT_EXPORT_DIR";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TOP_P: f32 = 0.9;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid number in env var {0}")]
    ParseFloat(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// Everything the relay needs to talk to the provider. Built once at start-up
/// and shared read-only with every request handler.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub default_model: String,
    pub http_referer: String,
    pub app_title: String,
    pub sampling: SamplingParams,
}

// The credential must never end up in logs, so Debug is written by hand.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("chat_completions_url", &self.chat_completions_url)
            .field("api_key", &"<redacted>")
            .field("default_model", &self.default_model)
            .field("http_referer", &self.http_referer)
            .field("app_title", &self.app_title)
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chat_completions_url =
            string_env_or("OPENROUTER_CHAT_COMPLETIONS_URL", DEFAULT_CHAT_COMPLETIONS_URL);
        validate_http_url("OPENROUTER_CHAT_COMPLETIONS_URL", &chat_completions_url)?;

        Ok(Self {
            chat_completions_url,
            api_key: require_non_empty_env("OPENROUTER_API_KEY")?,
            default_model: string_env_or("OPENROUTER_DEFAULT_MODEL", DEFAULT_MODEL_ID),
            http_referer: string_env_or("RELAY_HTTP_REFERER", DEFAULT_HTTP_REFERER),
            app_title: string_env_or("RELAY_APP_TITLE", DEFAULT_APP_TITLE),
            sampling: SamplingParams {
                temperature: parse_f32_env("OPENROUTER_TEMPERATURE", DEFAULT_TEMPERATURE)?,
                max_tokens: parse_u32_env("OPENROUTER_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
                top_p: parse_f32_env("OPENROUTER_TOP_P", DEFAULT_TOP_P)?,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub upstream: UpstreamConfig,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: string_env_or("RELAY_BIND_ADDR", DEFAULT_RELAY_BIND_ADDR),
            upstream: UpstreamConfig::from_env()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    pub model: String,
    pub framing: LineFraming,
    pub export_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_CHAT_URL.to_string(),
            model: DEFAULT_MODEL_ID.to_string(),
            framing: LineFraming::default(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|_| None)
    }

    /// Reads the client settings, asking `overrides` for each key before the
    /// environment. Values are validated only after the two are merged.
    pub fn from_env_with<O>(overrides: O) -> Result<Self, ConfigError>
    where
        O: Fn(&str) -> Option<String>,
    {
        Self::from_sources(overrides, optional_trimmed_env)
    }

    fn from_sources<O, E>(overrides: O, env: E) -> Result<Self, ConfigError>
    where
        O: Fn(&str) -> Option<String>,
        E: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| overrides(key).or_else(|| env(key));

        let relay_url =
            lookup(CHAT_RELAY_URL_VAR).unwrap_or_else(|| DEFAULT_RELAY_CHAT_URL.to_string());
        validate_http_url(CHAT_RELAY_URL_VAR, &relay_url)?;

        let model = lookup(CHAT_MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());
        if find_model(&model).is_none() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "{CHAT_MODEL_VAR} '{model}' is not one of the offered models"
            )));
        }

        let framing = match lookup(CHAT_STREAM_FRAMING_VAR) {
            Some(raw) => raw.parse::<LineFraming>().map_err(|_| {
                ConfigError::InvalidConfiguration(format!(
                    "{CHAT_STREAM_FRAMING_VAR} must be buffered or per-chunk, got '{raw}'"
                ))
            })?,
            None => LineFraming::default(),
        };

        Ok(Self {
            relay_url,
            model,
            framing,
            export_dir: lookup(CHAT_EXPORT_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

/// Loads `.env` from the working directory when one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::InvalidConfiguration(format!(
            "failed to load .env file: {err}"
        ))),
    }
}

pub fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(value).map_err(|err| {
        ConfigError::InvalidConfiguration(format!("{key} is not a valid URL: {err}"))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidConfiguration(format!(
            "{key} must start with http:// or https://, got scheme '{other}'"
        ))),
    }
}
