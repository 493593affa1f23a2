//! Config loading.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::error::SessionError;

/// Load configuration from the given path, or the default location.
///
/// A missing file at the default location yields the defaults; a missing
/// file at an explicit path is an error.
pub fn load_config(path: Option<&str>) -> Result<Config, SessionError> {
    match path {
        Some(p) => read_config(Path::new(p)),
        None => {
            let config_path = default_config_path();
            if config_path.exists() {
                read_config(&config_path)
            } else {
                info!("no config file found, using defaults");
                Ok(Config::default())
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Config, SessionError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SessionError::Config(format!("failed to read config: {e}")))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| SessionError::Config(format!("failed to parse config: {e}")))?;
    validate(&config)?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

fn validate(config: &Config) -> Result<(), SessionError> {
    if config.dispatch.actuators == 0 {
        return Err(SessionError::Config(
            "dispatch.actuators must be at least 1".to_string(),
        ));
    }
    if config.session.turn_ms == 0 {
        return Err(SessionError::Config(
            "session.turn_ms must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("platter-control")
}

/// Get the default config file path.
fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "platter-setup-{}-{name}.toml",
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn explicit_path_is_loaded() {
        let path = write_temp("ok", "[dispatch]\ndebounce_ms = 100\n");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.dispatch.debounce_ms, 100);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let result = load_config(Some("/nonexistent/platter/config.toml"));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = write_temp("zero", "[dispatch]\nactuators = 0\n");
        assert!(matches!(
            load_config(path.to_str()),
            Err(SessionError::Config(_))
        ));
        std::fs::remove_file(path).unwrap();
    }
}
