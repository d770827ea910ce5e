//! `abwright onboard`: write a default config file.

use std::path::Path;

use abwright_config::AppConfig;

/// Outcome of an onboarding run.
#[derive(Debug, PartialEq, Eq)]
pub enum Onboarded {
    Created,
    AlreadyPresent,
}

/// Create the config file at `path` unless one already exists.
pub fn write_default_config(path: &Path) -> std::io::Result<Onboarded> {
    if path.exists() {
        return Ok(Onboarded::AlreadyPresent);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(Onboarded::Created)
}

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    println!("abwright setup");
    println!("==============\n");

    match write_default_config(&path)? {
        Onboarded::Created => {
            println!("Created config at: {}", path.display());
            println!("\nNext steps:");
            println!("   1. Add [[experiments]] entries or set assignment.remote_source");
            println!("   2. Run: abwright catalog");
            println!("   3. Run: abwright serve\n");
        }
        Onboarded::AlreadyPresent => {
            println!("Config already exists at: {}", path.display());
            println!("   Edit it manually or delete and re-run onboard.\n");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(write_default_config(&path).unwrap(), Onboarded::Created);
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.assignment.cookie_name, "exp");
        assert_eq!(config.assignment.max_age, 604_800);
    }

    #[test]
    fn existing_config_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[assignment]\ncookie_name = \"ab\"\n").unwrap();

        assert_eq!(write_default_config(&path).unwrap(), Onboarded::AlreadyPresent);
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.assignment.cookie_name, "ab");
    }
}
