//! Error types for the core crate.

use thiserror::Error;

/// Errors raised by the [`Container`](crate::Container).
///
/// All of them describe programming mistakes in how services were wired
/// rather than conditions worth retrying, so they are returned straight to the
/// caller of `resolve`/`make`.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No binding and no cached instance exist for the token.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// A declared dependency of `owner` could not be satisfied.
    #[error("cannot resolve dependency #{position} of '{owner}': {reason}")]
    UnresolvableDependency {
        owner: &'static str,
        position: usize,
        reason: String,
    },

    /// Constructing a service ended up requiring itself.
    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    /// The stored service is not of the requested type.
    #[error("service '{token}' is not of type '{expected}'")]
    TypeMismatch {
        token: String,
        expected: &'static str,
    },

    /// The constructor itself reported a failure.
    #[error("failed to construct '{owner}': {message}")]
    Construction {
        owner: &'static str,
        message: String,
    },
}

impl ContainerError {
    /// Creates a construction error for `owner`.
    pub fn construction(owner: &'static str, message: impl Into<String>) -> Self {
        Self::Construction {
            owner,
            message: message.into(),
        }
    }

    pub(crate) fn unresolvable(
        owner: &'static str,
        position: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnresolvableDependency {
            owner,
            position,
            reason: reason.into(),
        }
    }
}

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors raised while building a [`Response`](crate::Response).
#[derive(Debug, Error)]
pub enum ResponseError {
    /// A terminal method (`json`, `html`, `send`, `redirect`, `download`) was
    /// called after the response had already been sent.
    #[error("response already sent")]
    AlreadySent,

    /// The JSON payload could not be serialized.
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for response building.
pub type ResponseResult<T> = Result<T, ResponseError>;
