//! Application configuration schema.
//!
//! Every field is serde-defaulted so an empty JSON object is a valid
//! config; deployments override only what they need.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::prompt::PromptConfig;
use crate::worker::RetryPolicy;

fn default_database_path() -> PathBuf {
    crate::db::default_database_path().unwrap_or_else(|| PathBuf::from("data/paperinsight.db"))
}

fn default_upload_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".paperinsight").join("uploads"))
        .unwrap_or_else(|| PathBuf::from("data/uploads"))
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Root directory of the document store.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            upload_dir: default_upload_dir(),
            worker_count: default_worker_count(),
            llm: LlmConfig::default(),
            retry: RetryPolicy::default(),
            prompt: PromptConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_a_valid_config() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.worker_count >= 1);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.llm.api_key.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let config: Config = serde_json::from_str(
            r#"{"worker_count": 8, "retry": {"max_attempts": 5}, "prompt": {"language": "German"}}"#,
        )
        .unwrap();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.prompt.language, "German");
        // untouched sections keep their defaults
        assert_eq!(config.retry.multiplier, 2.0);
    }
}
