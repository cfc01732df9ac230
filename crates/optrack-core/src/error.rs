//! Unified error handling for optrack-core
//!
//! Two layers of errors exist:
//!
//! - [`ServiceError`] is what an [`OperationService`](crate::OperationService)
//!   implementation reports when the status round-trip itself fails.
//! - [`CoreError`] is what handle operations return. Service errors are carried
//!   through unmodified in [`CoreError::Service`].
//!
//! An operation that *finished unsuccessfully* is not an error at this level;
//! it is reported as data through `OperationHandle::is_error`.
//!
//! # Example
//!
//! ```rust
//! use optrack_core::{CoreError, ServiceError};
//!
//! let err: CoreError = ServiceError::NotFound {
//!     message: "operations/op-1".to_string(),
//! }
//! .into();
//! assert!(err.is_not_found());
//! assert!(!err.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::operation::OperationId;

/// Errors reported by an operation service when fetching status fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The operation does not exist (or is no longer retained by the server)
    #[error("Operation not found: {message}")]
    NotFound { message: String },

    /// Credentials were rejected or lack permission to read the operation
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The request never produced a response (connection reset, DNS, TLS...)
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The server answered with an internal failure
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Anything else the service wants to surface
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Returns true if the operation could not be found
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Returns true if this is an authentication/authorization failure
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServiceError::Unauthorized { .. })
    }

    /// Returns true if the same call might succeed if issued again later
    ///
    /// This is only a hint for callers; the handle itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Transport { .. } => true,
            ServiceError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Core error type returned by handle operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// The status round-trip failed
    #[error("Operation service error: {0}")]
    Service(#[from] ServiceError),

    /// The service answered with a snapshot for a different operation
    #[error("Expected status for operation {expected}, got {actual}")]
    OperationMismatch {
        expected: OperationId,
        actual: OperationId,
    },

    /// A wait was aborted through its cancellation token
    #[error("Wait for operation {0} was cancelled")]
    Cancelled(OperationId),

    /// A wait exceeded the deadline given in its options
    #[error("Operation did not complete within {0:?}")]
    Timeout(Duration),

    /// A success payload could not be decoded into the requested type
    #[error("Failed to decode operation result: {0}")]
    Decode(#[from] serde_json::Error),

    /// Polling configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Returns true if the operation could not be found
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::Service(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Returns true if this is an authentication/authorization error
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            CoreError::Service(e) => e.is_unauthorized(),
            _ => false,
        }
    }

    /// Returns true if this error came from the caller giving up on a wait
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled(_))
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Timeout(_))
    }

    /// Returns true if this error is potentially retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Service(e) => e.is_retryable(),
            CoreError::Timeout(_) => true, // the operation may still finish
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_from_service() {
        let service_err = ServiceError::NotFound {
            message: "operations/op-1".to_string(),
        };
        let core_err: CoreError = service_err.clone().into();

        assert!(core_err.is_not_found());
        assert!(!core_err.is_unauthorized());
        assert!(!core_err.is_retryable());
        assert!(matches!(core_err, CoreError::Service(inner) if inner == service_err));
    }

    #[test]
    fn test_service_error_retryable() {
        let reset = ServiceError::Transport {
            message: "connection reset by peer".to_string(),
        };
        assert!(reset.is_retryable());

        let unavailable = ServiceError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(unavailable.is_retryable());

        let bad_request = ServiceError::Server {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!bad_request.is_retryable());

        let denied = ServiceError::Unauthorized {
            message: "token expired".to_string(),
        };
        assert!(denied.is_unauthorized());
        assert!(!denied.is_retryable());
    }

    #[test]
    fn test_core_error_wait_variants() {
        let cancelled = CoreError::Cancelled(OperationId::from("op-1"));
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_retryable());
        assert!(cancelled.to_string().contains("op-1"));

        let timeout = CoreError::Timeout(Duration::from_secs(60));
        assert!(timeout.is_timeout());
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("60s"));
    }

    #[test]
    fn test_core_error_from_config() {
        let err: CoreError = ConfigError::InvalidBackoff("multiplier must be >= 1.0".to_string()).into();
        assert!(matches!(err, CoreError::Config(ConfigError::InvalidBackoff(_))));
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_core_error_display() {
        let err: CoreError = ServiceError::Transport {
            message: "connection reset".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Operation service error: Transport error: connection reset"
        );

        let mismatch = CoreError::OperationMismatch {
            expected: OperationId::from("op-1"),
            actual: OperationId::from("op-2"),
        };
        assert_eq!(
            mismatch.to_string(),
            "Expected status for operation op-1, got op-2"
        );
    }
}
