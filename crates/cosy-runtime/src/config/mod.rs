//! Configuration module for the Cosy runtime.
//!
//! Settings are loaded with figment into the typed [`CosyConfig`] and then
//! exposed at runtime through the dotted-key [`Config`] repository.

pub mod error;
pub mod loader;
pub mod repository;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use repository::Config;
pub use schema::{
    AppConfig, CorsConfig, CosyConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    RateLimitConfig, SpanEventConfig,
};
pub use validation::validate_config;
