//! Layered configuration loading with figment.
//!
//! Sources, lowest priority first:
//!
//! 1. [`CosyConfig::default`]
//! 2. `cosy.<profile>.<ext>` next to the base file, if present
//! 3. the base file: the first `cosy.<ext>` or `config.<ext>` found in the
//!    search directories (or the file given to [`ConfigLoader::file`])
//! 4. `COSY_*` environment variables, `__` separating nested keys
//!    (`COSY_APP__PORT=8080` sets `app.port`)
//! 5. values passed to [`ConfigLoader::merge`] / [`ConfigLoader::set`]
//!
//! TOML files need the `toml-config` feature (on by default), YAML files
//! the `yaml-config` feature.
//!
//! ```rust,ignore
//! let settings = ConfigLoader::new()
//!     .profile("production")
//!     .search_path("./config")
//!     .set("app.port", 8080)
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CosyConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "COSY_";

/// File stems tried in each search directory, in order.
const BASE_NAMES: [&str; 2] = ["cosy", "config"];

// =============================================================================
// Profile
// =============================================================================

/// Selects the optional `cosy.<profile>.<ext>` overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Parses a profile name; `dev` and `prod` are accepted as shorthands.
    pub fn named(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The profile from `COSY_PROFILE`, or development.
    pub fn from_env() -> Self {
        std::env::var(format!("{ENV_PREFIX}PROFILE"))
            .map(|name| Self::named(&name))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// File formats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    /// Formats compiled in, in lookup order.
    const ENABLED: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    #[allow(unused_variables)]
    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
        use figment::providers::Format as _;

        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(figment::providers::Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(figment::providers::Yaml::file(path)),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Builds a [`CosyConfig`] from defaults, files, environment and overrides.
#[derive(Debug)]
pub struct ConfigLoader {
    profile: Profile,
    search_dirs: Vec<PathBuf>,
    /// Explicit file; disables discovery.
    file: Option<PathBuf>,
    read_env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_dirs: Vec::new(),
            file: None,
            read_env: true,
            overrides: Figment::new(),
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::named(&profile.into());
        self
    }

    /// Adds a directory to look for configuration files in.
    pub fn search_path<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.search_dirs.push(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/cosy`, e.g. `~/.config/cosy`.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("cosy")),
            None => self,
        }
    }

    /// Loads exactly this file. A missing file is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.read_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Merges a whole configuration over every other source.
    pub fn merge(mut self, config: CosyConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Overrides one dotted key, e.g. `set("app.port", 8080)`.
    pub fn set<V: Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<CosyConfig> {
        let config: CosyConfig = self.figment()?.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            app = %config.app.name,
            port = config.app.port,
            logging_level = config.logging.level.as_str(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// The merged sources, before extraction.
    pub fn figment(&self) -> ConfigResult<Figment> {
        let files = match &self.file {
            Some(path) if !path.is_file() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => vec![path.clone()],
            None => self.discover(),
        };
        if files.is_empty() {
            warn!("No configuration file found, using defaults");
        }

        let mut figment = Figment::from(Serialized::defaults(CosyConfig::default()));
        for path in &files {
            let format = FileFormat::for_path(path).ok_or_else(|| {
                ConfigError::ParseError(format!(
                    "unsupported or disabled configuration format: {}",
                    path.display()
                ))
            })?;
            info!(path = %path.display(), "Loading configuration file");
            figment = format.merge_into(figment, path);
        }

        if self.read_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment.merge(self.overrides.clone()))
    }

    /// Directories searched when none were added: the working directory and
    /// the user config directory.
    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_dirs.is_empty() {
            return self.search_dirs.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("cosy")))
            .collect()
    }

    /// The first base file found, preceded by its profile overlay if one
    /// sits next to it.
    fn discover(&self) -> Vec<PathBuf> {
        for dir in self.search_dirs() {
            for stem in BASE_NAMES {
                for format in FileFormat::ENABLED {
                    for ext in format.extensions() {
                        let base = dir.join(format!("{stem}.{ext}"));
                        if !base.is_file() {
                            continue;
                        }
                        let overlay = dir.join(format!("{stem}.{}.{ext}", self.profile));
                        if overlay.is_file() {
                            return vec![overlay, base];
                        }
                        return vec![base];
                    }
                }
            }
        }
        Vec::new()
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CosyConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CosyConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.app.port, CosyConfig::default().app.port);
            assert_eq!(config.logging.level, LogLevel::Info);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cosy.toml",
                r#"
                [app]
                name = "Shop"
                port = 8080

                [logging]
                level = "debug"
                "#,
            )?;
            jail.set_env("COSY_APP__PORT", "9090");
            jail.set_env("COSY_APP__DEBUG", "true");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .set("app.locale", "fr")
                .load()
                .unwrap();

            assert_eq!(config.app.name, "Shop");
            assert_eq!(config.app.port, 9090);
            assert!(config.app.debug);
            assert_eq!(config.app.locale, "fr");
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_base_file_wins_over_profile_overlay() {
        Jail::expect_with(|jail| {
            jail.create_file("cosy.production.toml", "[app]\nname = \"Prod\"\nport = 80")?;
            jail.create_file("cosy.toml", "[app]\nport = 8000")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.app.name, "Prod");
            assert_eq!(config.app.port, 8000);
            Ok(())
        });
    }

    #[test]
    fn test_config_toml_fallback() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[app]\nname = \"Fallback\"")?;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.app.name, "Fallback");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/cosy.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("cosy.ini", "port = 1")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("cosy.ini"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("cosy.toml", "[rate_limit]\nmax = 0")?;
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::named("PROD"), Profile::Production);
        assert_eq!(Profile::named(" dev "), Profile::Development);
        assert_eq!(Profile::named("staging").to_string(), "staging");
    }
}
