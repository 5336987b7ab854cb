//! `hotpage.toml` loading.
//!
//! A config file is either passed explicitly or found by walking up from the
//! working directory. Without one, built-in defaults apply with directories
//! relative to the working directory.
//!
//! ```toml
//! [server]
//! host = "${HOTPAGE_HOST:-127.0.0.1}"
//! port = 8080
//!
//! [live_reload]
//! enabled = true
//! route = "/dev/reload"
//! max_age = 3600
//! watch_dir = "web"
//! static_dir = "web/static"
//! ```
//!
//! `server.host`, `live_reload.watch_dir` and `live_reload.static_dir` go
//! through `${VAR}` / `${VAR:-default}` expansion. Directories are relative
//! to the file that names them. Command-line values from [`CliSettings`]
//! are layered on last.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use hotpage::{DEFAULT_ROUTE, ReloadConfig};
use serde::Deserialize;

/// File name looked up during discovery.
const CONFIG_FILENAME: &str = "hotpage.toml";

const DEFAULT_WATCH_DIR: &str = "web";
const DEFAULT_STATIC_DIR: &str = "web/static";

/// Values from the command line. `None` keeps whatever the file says.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Replaces the resolved watch directory as given, without rebasing.
    pub watch_dir: Option<PathBuf>,
    pub live_reload_enabled: Option<bool>,
}

/// Loaded configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub live_reload: LiveReloadConfig,

    /// Directories after expansion and rebasing; not read from TOML.
    #[serde(skip)]
    pub dirs: DirsConfig,
    /// File the configuration came from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_dirs_under(Path::new("."))
    }
}

/// `[server]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// `[live_reload]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    pub enabled: bool,
    /// Path the event stream is mounted at.
    pub route: String,
    /// Asset cache lifetime in seconds while enabled.
    pub max_age: u64,
    watch_dir: Option<String>,
    static_dir: Option<String>,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            route: DEFAULT_ROUTE.to_owned(),
            max_age: 3600,
            watch_dir: None,
            static_dir: None,
        }
    }
}

/// Absolute (or cwd-relative) directories derived from `[live_reload]`.
#[derive(Debug, Default)]
pub struct DirsConfig {
    /// Tree polled for changes.
    pub watch_dir: PathBuf,
    /// Root served under `/static`.
    pub static_dir: PathBuf,
}

/// Failure to produce a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("No config file at {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid TOML in config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but is out of range.
    #[error("Invalid config value: {0}")]
    Validation(String),
    /// `${VAR}` referenced a variable that is not set.
    #[error("Cannot expand {field}: {message}")]
    EnvVar { field: String, message: String },
}

impl Config {
    /// Load from `config_path`, or from the nearest `hotpage.toml` above the
    /// working directory, then apply `cli_settings`.
    ///
    /// # Errors
    ///
    /// Fails when an explicit path is missing, or when a file is found but
    /// cannot be read, parsed, expanded or validated.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let source = match config_path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_upwards(),
        };

        let mut config = match source {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No {CONFIG_FILENAME} above working directory, using defaults");
                Self::with_dirs_under(&std::env::current_dir().unwrap_or_default())
            }
        };

        if let Some(settings) = cli_settings {
            config.override_with(settings);
        }
        Ok(config)
    }

    /// [`ReloadConfig`] for a reloader logging under `span`.
    pub fn reload_config(&self, span: tracing::Span) -> ReloadConfig {
        ReloadConfig {
            span,
            route: self.live_reload.route.clone(),
            enabled: self.live_reload.enabled,
            max_age: Duration::from_secs(self.live_reload.max_age),
        }
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Validation(msg.to_owned()))
        };

        if self.server.host.is_empty() {
            return invalid("server.host is empty");
        }
        if self.server.port == 0 {
            return invalid("server.port must be non-zero");
        }

        let route = self.live_reload.route.as_str();
        if !route.starts_with('/') {
            return invalid("live_reload.route must begin with '/'");
        }
        // "/" would shadow every page of the application.
        if route == "/" {
            return invalid("live_reload.route must not be '/'");
        }
        Ok(())
    }

    fn override_with(&mut self, settings: &CliSettings) {
        let CliSettings {
            host,
            port,
            watch_dir,
            live_reload_enabled,
        } = settings;

        if let Some(host) = host {
            self.server.host.clone_from(host);
        }
        self.server.port = port.unwrap_or(self.server.port);
        if let Some(dir) = watch_dir {
            self.dirs.watch_dir.clone_from(dir);
        }
        self.live_reload.enabled = live_reload_enabled.unwrap_or(self.live_reload.enabled);
    }

    fn find_upwards() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        cwd.ancestors()
            .map(|dir| dir.join(CONFIG_FILENAME))
            .find(|candidate| candidate.is_file())
    }

    fn with_dirs_under(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            live_reload: LiveReloadConfig::default(),
            dirs: DirsConfig {
                watch_dir: base.join(DEFAULT_WATCH_DIR),
                static_dir: base.join(DEFAULT_STATIC_DIR),
            },
            config_path: None,
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(&std::fs::read_to_string(path)?)?;

        // Expansion first: a variable may hold a relative directory.
        config.expand_env_vars()?;
        config.rebase_dirs(path.parent().unwrap_or(Path::new(".")));
        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        tracing::debug!(path = %path.display(), "Read {CONFIG_FILENAME}");
        Ok(config)
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        let live_reload = &mut self.live_reload;
        for (value, field) in [
            (&mut live_reload.watch_dir, "live_reload.watch_dir"),
            (&mut live_reload.static_dir, "live_reload.static_dir"),
        ] {
            if let Some(raw) = value.as_deref() {
                *value = Some(expand::expand_env(raw, field)?);
            }
        }
        Ok(())
    }

    fn rebase_dirs(&mut self, base: &Path) {
        let live_reload = &self.live_reload;
        self.dirs = DirsConfig {
            watch_dir: base.join(live_reload.watch_dir.as_deref().unwrap_or(DEFAULT_WATCH_DIR)),
            static_dir: base.join(live_reload.static_dir.as_deref().unwrap_or(DEFAULT_STATIC_DIR)),
        };
    }
}
