//! Error types for Grey Mail.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail server errors: transport, protocol and message decoding.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("{command} rejected by server: {reason}")]
    Rejected { command: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed by server")]
    Closed,

    #[error("Could not decode message {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("Mail worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text-generation provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: String },
}

/// Tag store errors.
#[derive(Debug, thiserror::Error)]
pub enum TagStoreError {
    #[error("Invalid tag name: {0:?}")]
    InvalidName(String),

    #[error("Invalid color {0:?}, expected #rgb or #rrggbb")]
    InvalidColor(String),

    #[error("Tag {0:?} is a standard tag")]
    StandardTag(String),

    #[error("Tag {0:?} not found")]
    UnknownTag(String),

    #[error("Failed to serialize tags: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
