//! Cosy Runtime - the application layer of the Cosy web framework.
//!
//! This crate provides:
//! - The [`Application`] façade: routes, middleware, services, providers
//! - Lifecycle management (`boot`, `start`, `stop`, `run`) with hooks
//! - Configuration loading (figment) and the dotted-key [`Config`] repository
//! - Logging configuration
//!
//! ```ignore
//! use cosy_runtime::Application;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut app = Application::new();
//!     app.get("/api/status", || async { Json(json!({ "status": "ok" })) })?;
//!
//!     // Serves until Ctrl+C
//!     Arc::new(app).run(None).await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;

// Re-exports
pub use application::{Application, ApplicationBuilder};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, CosyConfig, Profile};
pub use error::{ApplicationError, ApplicationResult};
pub use hooks::{Hooks, LifecycleHook};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
