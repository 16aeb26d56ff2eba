//! Error types for event delivery.
//!
//! Covers configuration problems detected at construction, transport
//! failures absorbed by the client, and serialization failures that indicate
//! a broken event and are surfaced to the caller.

use std::{fmt, time::Duration};

use flare_core::CoreError;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error types for the delivery pipeline.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Invalid DSN, unsupported transport scheme or bad settings.
    #[error("invalid configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// Request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// Collector rejected the event (4xx).
    #[error("collector rejected event: HTTP {status_code}: {body}")]
    ClientError {
        /// HTTP status code (4xx)
        status_code: u16,
        /// Error detail from the collector
        body: String,
    },

    /// Collector failed to process the event (5xx).
    #[error("collector error: HTTP {status_code}: {body}")]
    ServerError {
        /// HTTP status code (5xx)
        status_code: u16,
        /// Error detail from the collector
        body: String,
    },

    /// Collector asked us to back off.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before sending again
        retry_after_seconds: u64,
    },

    /// Local write failed (stdout transport).
    #[error("write failed: {message}")]
    IoError {
        /// I/O error message
        message: String,
    },

    /// The async dispatch hook refused the event.
    #[error("async dispatch failed: {message}")]
    AsyncDispatch {
        /// Error reported by the hook
        message: String,
    },

    /// Event could not be serialized or encoded.
    #[error("event serialization failed: {message}")]
    Serialization {
        /// Serialization error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a client error from an HTTP response.
    pub fn client_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ClientError { status_code, body: body.into() }
    }

    /// Creates a server error from an HTTP response.
    pub fn server_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ServerError { status_code, body: body.into() }
    }

    /// Creates a rate limit error.
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited { retry_after_seconds }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::IoError { message: message.into() }
    }

    /// Creates an async dispatch error.
    pub fn async_dispatch(message: impl Into<String>) -> Self {
        Self::AsyncDispatch { message: message.into() }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Whether this error came out of a delivery attempt and should count
    /// against the send gate.
    pub fn is_delivery_failure(&self) -> bool {
        match self {
            Self::NetworkError { .. }
            | Self::Timeout { .. }
            | Self::ClientError { .. }
            | Self::ServerError { .. }
            | Self::RateLimited { .. }
            | Self::IoError { .. }
            | Self::AsyncDispatch { .. } => true,

            Self::ConfigurationError { .. } | Self::Serialization { .. } => false,
        }
    }

    /// Back-off requested by the collector, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_seconds } => {
                Some(Duration::from_secs(*retry_after_seconds))
            },
            _ => None,
        }
    }
}

impl From<CoreError> for DeliveryError {
    fn from(error: CoreError) -> Self {
        Self::serialization(error.to_string())
    }
}

/// Category of delivery error for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network connectivity issues.
    Network,
    /// Collector rejected the payload (4xx).
    Client,
    /// Collector errors (5xx).
    Server,
    /// Rate limiting.
    RateLimit,
    /// Local I/O.
    Io,
    /// Async hand-off.
    Dispatch,
    /// Configuration problems.
    Configuration,
    /// Serialization of the event.
    Serialization,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::NetworkError { .. } | DeliveryError::Timeout { .. } => Self::Network,
            DeliveryError::ClientError { .. } => Self::Client,
            DeliveryError::ServerError { .. } => Self::Server,
            DeliveryError::RateLimited { .. } => Self::RateLimit,
            DeliveryError::IoError { .. } => Self::Io,
            DeliveryError::AsyncDispatch { .. } => Self::Dispatch,
            DeliveryError::ConfigurationError { .. } => Self::Configuration,
            DeliveryError::Serialization { .. } => Self::Serialization,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Io => write!(f, "io"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Configuration => write!(f, "configuration"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}
