//! Error types for relight.
//!
//! Per-request outcomes are reported as [`ResultCode`](crate::code::ResultCode)
//! values and never surface here. These types cover the library-level failures
//! around the core: bad configuration and background service faults.

use thiserror::Error;

/// Configuration errors raised while loading or validating [`EngineConfig`](crate::config::EngineConfig).
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("Failed to parse configuration: {message}")]
    Parse {
        message: String,
    },
}

/// Background service errors.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to spawn thread '{name}': {message}")]
    SpawnFailed {
        name: String,
        message: String,
    },

    #[error("Worker pool queue is full (capacity {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Worker pool is disconnected")]
    Disconnected,

    #[error("Background service is shut down")]
    ShutDown,
}

/// Top-level error type for relight.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RelightError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

impl RelightError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a service error.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Returns true if retrying the same call could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Service(e) => matches!(e, ServiceError::SpawnFailed { .. } | ServiceError::QueueFull { .. }),
        }
    }
}

/// Result type alias for relight operations.
pub type RelightResult<T> = Result<T, RelightError>;
