//! Configuration loading, validation, and management for abwright.
//!
//! Loads configuration from `~/.abwright/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup;
//! the resulting [`AppConfig`] is built once and passed by reference to the
//! assignment engine, catalog loader and gateway.

use abwright_core::{CookieOptions, Experiment};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.abwright/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cookie persistence and remote catalog settings
    #[serde(default)]
    pub assignment: AssignmentConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Local experiment catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<Experiment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Remote catalog URL. Empty disables the remote fetch.
    #[serde(default)]
    pub remote_source: String,

    /// Name of the cookie holding the assignment token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie `Domain` attribute. Empty omits it.
    #[serde(default)]
    pub cookie_domain: String,

    /// Default cookie lifetime in seconds
    #[serde(default = "default_max_age")]
    pub max_age: u64,

    /// Client side: decode the remote catalog from the streamed response
    /// instead of buffering the body first
    #[serde(default)]
    pub use_fetch: bool,

    /// Upper bound for the remote catalog fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_cookie_name() -> String {
    "exp".into()
}
fn default_max_age() -> u64 {
    60 * 60 * 24 * 7
}
fn default_fetch_timeout_secs() -> u64 {
    5
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            remote_source: String::new(),
            cookie_name: default_cookie_name(),
            cookie_domain: String::new(),
            max_age: default_max_age(),
            use_fetch: false,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl AssignmentConfig {
    /// Attributes for the assignment cookie; `max_age` overrides the default.
    pub fn cookie_options(&self, max_age: Option<u64>) -> CookieOptions {
        CookieOptions {
            path: "/".into(),
            domain: (!self.cookie_domain.is_empty()).then(|| self.cookie_domain.clone()),
            max_age: Some(max_age.unwrap_or(self.max_age)),
        }
    }

    pub fn has_remote_source(&self) -> bool {
        !self.remote_source.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.abwright/config.toml).
    ///
    /// Environment variables override file values:
    /// - `ABWRIGHT_REMOTE_SOURCE`
    /// - `ABWRIGHT_COOKIE_NAME`
    /// - `ABWRIGHT_COOKIE_DOMAIN`
    /// - `ABWRIGHT_MAX_AGE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(source) = lookup("ABWRIGHT_REMOTE_SOURCE") {
            self.assignment.remote_source = source;
        }
        if let Some(name) = lookup("ABWRIGHT_COOKIE_NAME") {
            self.assignment.cookie_name = name;
        }
        if let Some(domain) = lookup("ABWRIGHT_COOKIE_DOMAIN") {
            self.assignment.cookie_domain = domain;
        }
        if let Some(max_age) = lookup("ABWRIGHT_MAX_AGE") {
            self.assignment.max_age = max_age.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "ABWRIGHT_MAX_AGE must be a non-negative integer, got '{max_age}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".abwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.assignment.cookie_name;
        if name.is_empty() || !name.chars().all(is_cookie_name_char) {
            return Err(ConfigError::ValidationError(format!(
                "cookie_name '{name}' is not a valid cookie name"
            )));
        }

        if self.assignment.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_timeout_secs must be > 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for exp in &self.experiments {
            if exp.id.is_empty() || exp.id.contains('.') {
                return Err(ConfigError::ValidationError(format!(
                    "experimentID '{}' must be non-empty and must not contain '.'",
                    exp.id
                )));
            }
            if !seen.insert(exp.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate experimentID '{}'",
                    exp.id
                )));
            }
            let weights = std::iter::once(exp.weight)
                .chain(exp.variants.iter().map(|v| v.weight))
                .flatten();
            for weight in weights {
                if !weight.is_finite() || weight < 0.0 {
                    return Err(ConfigError::ValidationError(format!(
                        "experiment '{}' has an invalid weight: {weight}",
                        exp.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// RFC 6265 token characters.
fn is_cookie_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
