//! Runtime configuration shared by hosts of the notes core.
//!
//! # Invariants
//! - A validated config carries a canonical lowercase log level.
//! - `log_dir`, when present, is absolute.
//! - `store_path == None` means an in-memory store.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            store_path: None,
        }
    }
}

impl CoreConfig {
    /// Normalizes the level and checks the log directory.
    ///
    /// # Errors
    /// - Unknown log level.
    /// - Empty or relative log directory.
    pub fn validate(mut self) -> Result<Self, String> {
        self.log_level = normalize_level(&self.log_level)?.to_string();
        if let Some(dir) = self.log_dir.take() {
            self.log_dir = Some(normalize_log_dir(&dir.to_string_lossy())?);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;
    use std::path::PathBuf;

    #[test]
    fn default_uses_build_level_and_memory_store() {
        let config = CoreConfig::default();
        assert!(config.log_level == "debug" || config.log_level == "info");
        assert!(config.log_dir.is_none());
        assert!(config.store_path.is_none());
    }

    #[test]
    fn validate_normalizes_level() {
        let config = CoreConfig {
            log_level: " WARNING ".to_string(),
            ..CoreConfig::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn validate_rejects_relative_log_dir_and_unknown_level() {
        let relative = CoreConfig {
            log_dir: Some(PathBuf::from("logs")),
            ..CoreConfig::default()
        };
        assert!(relative.validate().unwrap_err().contains("absolute"));

        let noisy = CoreConfig {
            log_level: "loud".to_string(),
            ..CoreConfig::default()
        };
        assert!(noisy.validate().is_err());
    }
}
