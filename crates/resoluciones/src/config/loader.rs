use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "RESOLUCIONES_CONFIG";

const DEFAULT_CONFIG_FILENAME: &str = "config.json";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Picks the config file: an explicit argument wins, then
/// `RESOLUCIONES_CONFIG`, then `config.json` in the working directory.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.cleanup_days == 0 {
        return Err(ConfigError::Validation {
            message: "cleanup_days must be greater than zero".to_string(),
        });
    }

    if let Some(step) = config.progress_steps.iter().find(|s| **s > 100) {
        return Err(ConfigError::Validation {
            message: format!("progress step {} exceeds 100", step),
        });
    }

    if config.progress_steps.windows(2).any(|w| w[0] > w[1]) {
        return Err(ConfigError::Validation {
            message: "progress_steps must be non-decreasing".to_string(),
        });
    }

    if config.backup_dir == config.temp_dir {
        return Err(ConfigError::Validation {
            message: "backup_dir must differ from temp_dir".to_string(),
        });
    }

    Ok(())
}
