//! Error types for the framework, and how any error maps onto a response.

use std::error::Error as StdError;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use cosy_core::{ContainerError, HttpError, Response, StatusCode};

pub use tower::BoxError;

/// Errors raised while compiling or registering a route.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The template could not be turned into a valid pattern.
    #[error("invalid route pattern '{template}': {reason}")]
    InvalidPattern { template: String, reason: String },

    /// A parameter constraint contains its own capturing group.
    #[error("constraint for parameter '{param}' in '{template}' must not contain capturing groups")]
    CapturingConstraint { template: String, param: String },

    /// The same parameter name appears twice in one template.
    #[error("parameter '{param}' appears more than once in '{template}'")]
    DuplicateParameter { template: String, param: String },

    /// A constraint was given for a parameter the template does not have.
    #[error("route '{template}' has no parameter named '{param}'")]
    UnknownParameter { template: String, param: String },

    /// No route carries this name.
    #[error("no route named '{0}'")]
    UnknownRoute(String),

    /// URL generation lacked a value for a required parameter.
    #[error("route '{route}' requires parameter '{param}'")]
    MissingParameter { route: String, param: String },
}

impl RouteError {
    pub(crate) fn invalid(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors that can occur during handler argument extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A required route parameter is absent.
    #[error("missing route parameter '{0}'")]
    MissingParameter(String),

    /// A route parameter could not be parsed into the requested type.
    #[error("invalid route parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The query string does not fit the requested type.
    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    /// The body does not fit the requested type.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Nothing was stored in the context state under this type.
    #[error("no request state of type '{0}'")]
    MissingState(&'static str),

    /// An injected service could not be resolved.
    #[error(transparent)]
    Service(#[from] ContainerError),
}

impl ExtractError {
    /// Client mistakes map to 400, wiring mistakes to 500.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidParameter { .. }
            | Self::InvalidQuery(_)
            | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingState(_) | Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised by the dispatch machinery itself.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The request was cancelled before the chain finished.
    #[error("request cancelled")]
    Cancelled,

    /// A route referenced a middleware name nobody registered.
    #[error("middleware not found: {0}")]
    MiddlewareNotFound(String),
}

// =============================================================================
// Error rendering
// =============================================================================

/// The status an error should be answered with.
///
/// Known error types carry their own status; everything else is a 500.
pub fn status_for(error: &(dyn StdError + 'static)) -> StatusCode {
    if let Some(http) = error.downcast_ref::<HttpError>() {
        return http.status();
    }
    if let Some(extract) = error.downcast_ref::<ExtractError>() {
        return extract.status();
    }
    if let Some(DispatchError::Cancelled) = error.downcast_ref::<DispatchError>() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

/// JSON payload describing `error`.
///
/// `details` (the chain of underlying causes) is only included when
/// `expose_details` is set. Without it, server errors other than an explicit
/// [`HttpError`] only carry the status reason phrase.
pub fn error_payload(error: &(dyn StdError + 'static), expose_details: bool) -> Value {
    let status = status_for(error);
    let message = if expose_details || !status.is_server_error() || error.is::<HttpError>() {
        error.to_string()
    } else {
        status
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_string()
    };

    let mut payload = json!({ "error": message });
    if expose_details {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }
        payload["details"] = Value::Array(causes);
    }
    payload
}

/// A fresh response describing `error`.
pub fn error_response(error: &(dyn StdError + 'static), expose_details: bool) -> Response {
    let mut response = Response::new();
    response.status(status_for(error));
    if let Err(e) = response.json(&error_payload(error, expose_details)) {
        warn!(error = %e, "Failed to render error response");
    }
    response
}
