//! Error types for Falcon Messenger

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FalconError>;

#[derive(Error, Debug)]
pub enum FalconError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FalconError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FalconError::InvalidInput(_) | FalconError::Validation(_) => 3,
            FalconError::Platform(PlatformError::Authentication(_)) => 2,
            FalconError::Platform(_) => 1,
            FalconError::Config(_) => 1,
            FalconError::Database(_) => 1,
            FalconError::Http(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Request-level rejections. These are the only failures that stop a
/// dispatch before any platform is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text cannot be empty")]
    EmptyMessage,

    #[error("Unknown target platform: {0}")]
    UnknownTarget(String),

    #[error("Only one of image_url or image_data may be provided")]
    ConflictingImageFields,

    #[error("No valid targets specified or no publishers configured")]
    NoTargetsConfigured,
}

impl ValidationError {
    /// Machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::EmptyMessage => "empty_message",
            ValidationError::UnknownTarget(_) => "unknown_target",
            ValidationError::ConflictingImageFields => "conflicting_image_fields",
            ValidationError::NoTargetsConfigured => "no_targets_configured",
        }
    }
}

/// Per-target failures raised by platform capabilities.
///
/// These never escape a dispatch; the engine turns each one into a
/// [`crate::PlatformResult::Failure`] entry for the target that raised it.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Content rejected: {0}")]
    Rejected(String),

    #[error("Publishing failed: {0}")]
    Posting(String),

    #[error("Platform not configured: {0}")]
    NotConfigured(String),
}

impl PlatformError {
    /// Stable classification reported to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Authentication(_) => ErrorKind::AuthFailure,
            PlatformError::Timeout(_) => ErrorKind::Timeout,
            PlatformError::RateLimit(_) => ErrorKind::RateLimited,
            PlatformError::Network(_) => ErrorKind::TransportError,
            PlatformError::Rejected(_) => ErrorKind::ContentRejected,
            PlatformError::Posting(_) => ErrorKind::PublishFailed,
            PlatformError::NotConfigured(_) => ErrorKind::NotConfigured,
        }
    }

    /// Transient errors are worth another attempt at the transport level
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::Network(_) | PlatformError::Timeout(_) | PlatformError::RateLimit(_)
        )
    }
}

/// Machine-readable failure classification carried in a dispatch response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthFailure,
    Timeout,
    RateLimited,
    TransportError,
    ContentRejected,
    PublishFailed,
    NotConfigured,
    /// The publish task itself died (panic or cancellation)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::ContentRejected => "content_rejected",
            ErrorKind::PublishFailed => "publish_failed",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert metadata that was tagged as a super-signal payload but did not
/// parse. Never fatal: the renderer falls back to plain text.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Malformed alert metadata: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Alert metadata is missing a ticker")]
    MissingTicker,

    #[error("Alert price must be a finite, non-negative number (got {0})")]
    InvalidPrice(f64),
}
