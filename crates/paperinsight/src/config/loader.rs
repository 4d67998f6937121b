//! Config loading and validation.

use std::path::Path;

use crate::error::ConfigError;

use super::schema::Config;

/// Environment variable consulted when the config file leaves the API
/// key empty.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Loads and validates a JSON config file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: Config = serde_json::from_str(&contents)?;

    if config.llm.api_key.is_empty() {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.llm.api_key = key;
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }
    if config.prompt.max_chars == 0 {
        return Err(ConfigError::Validation {
            message: "prompt.max_chars must be at least 1".to_string(),
        });
    }
    Ok(())
}
