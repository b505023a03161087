//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Groq endpoint (OpenAI-compatible).
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model.
pub const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";

/// IMAP account configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Read/write/connect timeout for the IMAP socket.
    pub timeout: Duration,
}

impl MailConfig {
    /// Build from `IMAP_SERVER`, `IMAP_PORT`, `EMAIL_USER`, `EMAIL_PASS`.
    /// All four are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: required("IMAP_SERVER")?,
            port: parse_required("IMAP_PORT")?,
            username: required("EMAIL_USER")?,
            password: SecretString::from(required("EMAIL_PASS")?),
            timeout: Duration::from_secs(parse_or("MAIL_TIMEOUT_SECS", 60)?),
        })
    }
}

/// Text-generation service configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `None` when `GROQ_API_KEY` is unset: the service still runs, with
    /// every AI call falling back to its placeholder.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: optional("GROQ_API_KEY").map(SecretString::from),
            base_url: optional("GROQ_API_BASE")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: optional("GROQ_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or("LLM_TIMEOUT_SECS", 60)?),
        })
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mail: MailConfig,
    pub llm: LlmConfig,
    /// Minimum spacing between AI calls.
    pub ai_cooldown: Duration,
    pub tags_file: PathBuf,
    pub port: u16,
}

impl AppConfig {
    /// Load everything from the environment. Fails on the first missing or
    /// malformed required value so the process never starts half-configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mail: MailConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            ai_cooldown: Duration::from_millis(parse_or("AI_COOLDOWN_MS", 2000)?),
            tags_file: optional("TAGS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tags.json")),
            port: parse_or("GREY_MAIL_PORT", 8000)?,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

fn parse_required<T>(key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &required(key)?)
}

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
