//! Application error types.

use thiserror::Error;

use cosy_framework::{BoxError, DispatchError, RouteError};
use cosy_transport::TransportError;

use crate::config::ConfigError;
use crate::hooks::LifecycleHook;

/// Errors raised while assembling, booting, starting or stopping an
/// [`Application`](crate::Application).
///
/// Nothing here is produced while serving a request: dispatch failures are
/// rendered into responses instead.
#[derive(Error, Debug)]
pub enum ApplicationError {
    /// `start` was called while the listener is already up.
    #[error("application is already running")]
    AlreadyRunning,

    /// A service provider's `boot` failed.
    #[error("failed to boot provider '{provider}'")]
    Boot {
        provider: String,
        #[source]
        source: BoxError,
    },

    /// A lifecycle hook failed.
    #[error("{hook} hook failed")]
    Hook {
        hook: LifecycleHook,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Middleware(#[from] DispatchError),
}

/// Result type for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
