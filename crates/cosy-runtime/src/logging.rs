//! Global `tracing` subscriber setup.
//!
//! Request dispatch runs inside a `dispatch` span carrying the method and
//! path, so [`SpanEvents::Lifecycle`] prints one line when a request starts
//! and one (with timings) when it finishes.
//!
//! ```rust,ignore
//! use cosy_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::from_config(&settings.logging)
//!     .directive("cosy_framework=debug")
//!     .span_events(SpanEvents::Lifecycle)
//!     .init();
//! ```

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Which span lifecycle events produce log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpanEvents {
    #[default]
    Off,
    /// Creation and close.
    Lifecycle,
    /// Enter and exit.
    Active,
    Full,
    Custom {
        new: bool,
        enter: bool,
        exit: bool,
        close: bool,
    },
}

impl SpanEvents {
    fn fmt_span(self) -> FmtSpan {
        match self {
            Self::Off => FmtSpan::NONE,
            Self::Lifecycle => FmtSpan::NEW | FmtSpan::CLOSE,
            Self::Active => FmtSpan::ACTIVE,
            Self::Full => FmtSpan::FULL,
            Self::Custom {
                new,
                enter,
                exit,
                close,
            } => [
                (new, FmtSpan::NEW),
                (enter, FmtSpan::ENTER),
                (exit, FmtSpan::EXIT),
                (close, FmtSpan::CLOSE),
            ]
            .into_iter()
            .filter(|(on, _)| *on)
            .fold(FmtSpan::NONE, |acc, (_, span)| acc | span),
        }
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self::Custom {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// A subscriber that is already installed is left in place.
pub fn init_from_config(config: &LoggingConfig) {
    LoggingBuilder::from_config(config).init();
}

/// Assembles an env filter, a formatting layer and a writer, then installs
/// them as the global subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    span_events: SpanEvents,
    extra_directives: Vec<String>,
    with_target: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            span_events: SpanEvents::from(&config.span_events),
            extra_directives: Vec::new(),
            with_target: true,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Adds a filter directive such as `cosy_runtime=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.extra_directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Writes to `path`, rolling over every `rotation`.
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self.config.rotation = rotation;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn thread_ids(mut self, enabled: bool) -> Self {
        self.config.thread_ids = enabled;
        self
    }

    pub fn file_location(mut self, enabled: bool) -> Self {
        self.config.file_location = enabled;
        self
    }

    /// Per-module directives from the config, then the ones added here.
    fn directives(&self) -> Vec<String> {
        let mut modules: Vec<_> = self.config.filters.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        modules
            .into_iter()
            .map(|(module, level)| format!("{module}={level}"))
            .chain(self.extra_directives.iter().cloned())
            .collect()
    }

    /// `RUST_LOG`, when set, replaces the configured base level.
    fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));

        for directive in self.directives() {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    fn writer(&self) -> BoxMakeWriter {
        match self.config.output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File => {
                let Some(path) = self.config.file_path.as_deref() else {
                    eprintln!("Log output is `file` but no file_path is set, using stdout");
                    return BoxMakeWriter::new(std::io::stdout);
                };
                match rolling_appender(path, self.config.rotation, self.config.max_files) {
                    Ok(appender) => BoxMakeWriter::new(appender),
                    Err(e) => {
                        eprintln!("Cannot open log file {}: {e}, using stdout", path.display());
                        BoxMakeWriter::new(std::io::stdout)
                    }
                }
            }
        }
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.config.thread_ids)
            .with_file(self.config.file_location)
            .with_line_number(self.config.file_location);

        match self.config.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }

    /// Installs the subscriber, ignoring one that is already installed.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let layer = self.fmt_layer(self.writer());
        tracing_subscriber::registry()
            .with(layer)
            .with(self.filter())
            .try_init()
    }
}

/// `max_files == 0` keeps every rolled file.
fn rolling_appender(
    path: &Path,
    rotation: LogRotation,
    max_files: u32,
) -> Result<RollingFileAppender, InitError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .map_or_else(|| "cosy.log".to_string(), |name| name.to_string_lossy().into_owned());

    let mut builder = RollingFileAppender::builder()
        .rotation(match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        })
        .filename_prefix(prefix);
    if max_files > 0 {
        builder = builder.max_log_files(max_files as usize);
    }
    builder.build(dir)
}
