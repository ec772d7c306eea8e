//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CosyConfig {
    /// Application identity and listener settings.
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

// =============================================================================
// Application
// =============================================================================

/// Application settings, readable through the repository as `app.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Environment name (development, production, ...).
    #[serde(default = "default_env")]
    pub env: String,

    /// Exposes error details in responses when set.
    #[serde(default)]
    pub debug: bool,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            env: default_env(),
            debug: false,
            host: default_host(),
            port: default_port(),
            timezone: default_timezone(),
            locale: default_locale(),
        }
    }
}

fn default_name() -> String {
    "Cosy Application".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Writes to [`LoggingConfig::file_path`].
    File,
}

/// Rollover period for file output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread IDs in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line in log lines.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// How often the log file rolls over.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Rolled files to keep; `0` keeps all of them.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-module levels, e.g. `cosy_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: HashMap::new(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}

// =============================================================================
// Middleware defaults
// =============================================================================

/// Settings for the CORS middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// `*` or a comma-separated list of origins.
    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_credentials")]
    pub credentials: bool,

    #[serde(default = "default_cors_methods")]
    pub methods: Vec<String>,

    #[serde(default = "default_cors_headers")]
    pub headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            credentials: default_credentials(),
            methods: default_cors_methods(),
            headers: default_cors_headers(),
        }
    }
}

fn default_origin() -> String {
    "*".to_string()
}

fn default_credentials() -> bool {
    true
}

fn default_cors_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
        .map(String::from)
        .to_vec()
}

fn default_cors_headers() -> Vec<String> {
    ["Content-Type", "Authorization", "X-Requested-With"]
        .map(String::from)
        .to_vec()
}

/// Settings for the rate-limit middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    #[serde(default = "default_max_requests")]
    pub max: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    15 * 60
}
