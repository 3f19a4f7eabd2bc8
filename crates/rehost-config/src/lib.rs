//! Configuration management for rehost.
//!
//! Parses `rehost.toml` with serde and discovers the file in the current
//! directory or its parents. CLI settings are applied after loading via
//! [`CliSettings`].
//!
//! ```toml
//! [fetch]
//! timeout_secs = 30
//! max_redirects = 10
//! max_bytes = 26214400
//! user_agent = "rehost/0.1"
//! concurrency = 4
//!
//! [store]
//! root_dir = "."
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `fetch.user_agent` and `store.root_dir` support `${VAR}` and
//! `${VAR:-default}`.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Override concurrent fetch count.
    pub concurrency: Option<usize>,
    /// Override the directory images are stored under.
    pub root_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "rehost.toml";

/// Upper bound for `fetch.concurrency`.
const MAX_CONCURRENCY: usize = 64;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP fetch settings.
    pub fetch: FetchSettings,
    /// Storage settings (paths are relative strings from TOML).
    store: StoreConfigRaw,

    /// Resolved storage configuration (set after loading).
    #[serde(skip)]
    pub store_resolved: StoreConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// HTTP fetch settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Timeout for one image request, in seconds.
    pub timeout_secs: u64,
    /// Redirects followed before giving up.
    pub max_redirects: u32,
    /// Largest accepted image body, in bytes.
    pub max_bytes: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Number of images fetched concurrently.
    pub concurrency: usize,
}

impl FetchSettings {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 10,
            max_bytes: 25 * 1024 * 1024,
            user_agent: concat!("rehost/", env!("CARGO_PKG_VERSION")).to_owned(),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreConfigRaw {
    root_dir: Option<String>,
}

/// Resolved storage configuration with an absolute root.
#[derive(Debug, Default)]
pub struct StoreConfig {
    /// Directory that `issue-N-images/` directories are created in.
    pub root_dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`store.root_dir`").
        field: String,
        /// Error message (e.g., "${`IMAGES_ROOT`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `rehost.toml` in the current directory and its parents, falling
    /// back to defaults relative to the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting values are invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(timeout) = settings.timeout_secs {
            self.fetch.timeout_secs = timeout;
        }
        if let Some(concurrency) = settings.concurrency {
            self.fetch.concurrency = concurrency;
        }
        if let Some(root_dir) = &settings.root_dir {
            self.store_resolved.root_dir.clone_from(root_dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            fetch: FetchSettings::default(),
            store: StoreConfigRaw::default(),
            store_resolved: StoreConfig {
                root_dir: base.to_path_buf(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        if self.fetch.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_bytes must be greater than 0".to_owned(),
            ));
        }
        if self.fetch.concurrency == 0 || self.fetch.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Validation(format!(
                "fetch.concurrency must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fetch.user_agent cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.fetch.user_agent = expand::expand_env(&self.fetch.user_agent, "fetch.user_agent")?;
        if let Some(ref root) = self.store.root_dir {
            self.store.root_dir = Some(expand::expand_env(root, "store.root_dir")?);
        }
        Ok(())
    }

    /// Resolve the store root relative to the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.store_resolved = StoreConfig {
            root_dir: config_dir.join(self.store.root_dir.as_deref().unwrap_or(".")),
        };
    }
}
