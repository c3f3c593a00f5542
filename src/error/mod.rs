//! Error types for sluice.

use thiserror::Error;

/// Primary error type for all orchestrator operations.
///
/// Tool failures are deliberately absent: they are reported to the model as
/// [`ToolOutcome::Error`](crate::tools::ToolOutcome) and never surface here.
#[derive(Error, Debug)]
pub enum SluiceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Stream error: {0}")]
    Stream(String),

    /// A delta addressed a slot that no earlier `added` event allocated.
    #[error("Malformed stream at {event_type}: {message}")]
    MalformedStream { event_type: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation canceled")]
    Canceled,
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Server,
    Api,
    Protocol,
    Configuration,
    Canceled,
    Unknown,
}

impl SluiceError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedStream {
            event_type: event_type.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::MalformedStream { .. } | Self::Serialization(_) | Self::Stream(_) => {
                ErrorCategory::Protocol
            }
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Canceled => ErrorCategory::Canceled,
        }
    }

    /// Whether the caller may retry the whole turn.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SluiceError>;
