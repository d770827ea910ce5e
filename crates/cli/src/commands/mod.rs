pub mod assign;
pub mod catalog;
pub mod onboard;
pub mod serve;

use std::path::{Path, PathBuf};

use abwright_config::AppConfig;

/// The config file a command should use.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path)
        .map_err(|e| format!("Failed to load config from {}: {e}", path.display()).into())
}
