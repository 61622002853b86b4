//! Error types for ledger helper operations.
//!
//! Two layers of errors exist:
//!
//! - [`ServiceError`] is what SDK adapters return from the [`TransactionExecutor`],
//!   [`ControlPlaneClient`] and [`SessionClient`] seams. It carries a
//!   [`ServiceErrorKind`] so the driver can tell transient failures apart.
//! - [`HelperError`] is what every public operation returns. Each variant is one
//!   failure category and is tagged with the operation that produced it.
//!
//! [`TransactionExecutor`]: crate::TransactionExecutor
//! [`ControlPlaneClient`]: crate::ControlPlaneClient
//! [`SessionClient`]: crate::SessionClient

use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for helper operations.
pub type Result<T> = std::result::Result<T, HelperError>;

/// Classification of a failure reported by the ledger service or its SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ServiceErrorKind {
    /// Optimistic concurrency conflict on commit.
    Conflict,
    /// Request rate or capacity limit hit.
    Throttled,
    /// Network or connection failure.
    Transport,
    /// The call did not complete in time.
    Timeout,
    /// The session backing the transaction expired or was invalidated.
    InvalidSession,
    /// The request was rejected as malformed.
    BadRequest,
    /// Missing or insufficient credentials.
    AccessDenied,
    /// The ledger or resource does not exist.
    NotFound,
    /// The driver or client has been closed.
    Shutdown,
    /// Any other service-side failure.
    Internal,
}

impl ServiceErrorKind {
    /// Returns `true` if a fresh transaction attempt may succeed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Conflict | Self::Throttled | Self::Transport | Self::InvalidSession
        )
    }
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Conflict => "conflict",
            Self::Throttled => "throttled",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::InvalidSession => "invalid session",
            Self::BadRequest => "bad request",
            Self::AccessDenied => "access denied",
            Self::NotFound => "not found",
            Self::Shutdown => "shutdown",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Failure reported by an SDK adapter.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    /// Failure classification.
    pub kind: ServiceErrorKind,
    /// Message from the service or SDK.
    pub message: String,
    /// The underlying SDK error, if any.
    #[source]
    pub source: Option<BoxError>,
}

impl ServiceError {
    /// Creates a service error without an underlying source.
    #[must_use]
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Creates a service error wrapping the SDK's own error.
    #[must_use]
    pub fn with_source(
        kind: ServiceErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` if the failure is transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors returned by helper operations.
///
/// Marked `#[non_exhaustive]`; match with a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HelperError {
    /// The query ran but matched nothing.
    #[error("[{operation}] {message}")]
    NotFound {
        /// Operation that produced the error.
        operation: &'static str,
        /// What was looked up.
        message: String,
    },

    /// Input was rejected before any call was made.
    #[error("[{operation}] {message}")]
    Validation {
        /// Operation that produced the error.
        operation: &'static str,
        /// Why the input was rejected.
        message: String,
    },

    /// The ledger service or SDK failed.
    #[error("[{operation}] {kind} failure: {message}")]
    Upstream {
        /// Operation that produced the error.
        operation: &'static str,
        /// Failure classification.
        kind: ServiceErrorKind,
        /// Message from the service or SDK.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// Invalid driver configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HelperError {
    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound { operation, message: message.into() }
    }

    /// Creates a `Validation` error.
    #[must_use]
    pub fn validation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { operation, message: message.into() }
    }

    /// Creates an `Upstream` error with no underlying source.
    #[must_use]
    pub fn upstream(
        operation: &'static str,
        kind: ServiceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Upstream { operation, kind, message: message.into(), source: None }
    }

    /// Wraps a [`ServiceError`] as an `Upstream` error for `operation`.
    #[must_use]
    pub fn from_service(operation: &'static str, err: ServiceError) -> Self {
        let kind = err.kind;
        let message = err.message.clone();
        Self::Upstream { operation, kind, message, source: Some(Arc::new(err)) }
    }

    /// Returns the name of the operation that failed, if tagged.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { operation, .. }
            | Self::Validation { operation, .. }
            | Self::Upstream { operation, .. } => Some(*operation),
            Self::Config(_) => None,
        }
    }

    /// Re-tags the error with `operation`. `Config` errors are returned as is.
    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        match &mut self {
            Self::NotFound { operation: op, .. }
            | Self::Validation { operation: op, .. }
            | Self::Upstream { operation: op, .. } => *op = operation,
            Self::Config(_) => {},
        }
        self
    }

    /// Returns `true` if the error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the error is `Validation`.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns the upstream failure kind, if this is an `Upstream` error.
    #[must_use]
    pub fn service_kind(&self) -> Option<ServiceErrorKind> {
        match self {
            Self::Upstream { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` if re-running the enclosing transaction may succeed.
    ///
    /// Only upstream failures with a retryable [`ServiceErrorKind`] qualify.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.service_kind().is_some_and(ServiceErrorKind::is_retryable)
    }
}
