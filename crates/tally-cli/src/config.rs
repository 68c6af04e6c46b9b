//! Configuration file for the CLI.
//!
//! One TOML file covers every component:
//!
//! ```toml
//! categories = ["Office Supplies", "Travel"]
//!
//! [monitor]
//! watch_dir = "/home/me/Receipts/inbox"
//! archive_dir = "/home/me/Receipts/archive"
//!
//! [provider]
//! kind = "anthropic"
//!
//! [processor]
//! review_confidence_threshold = 0.6
//!
//! [processor.retry]
//! max_retries = 2
//! ```

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tally_llm::ProviderConfig;
use tally_monitor::MonitorConfig;
use tally_processor::ProcessorConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Valid transaction categories sent to the provider
    pub categories: Vec<String>,

    /// Watch and archive directories, debounce and workers
    pub monitor: MonitorConfig,

    /// Extraction backend
    pub provider: ProviderConfig,

    /// Preprocessing, retry and validation settings
    pub processor: ProcessorConfig,
}

impl AppConfig {
    /// Default configuration file path (`~/.tally/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".tally").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Read and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(CliError::Config("categories must not be blank".into()));
        }
        self.monitor.validate()?;
        self.provider.validate()?;
        self.processor.validate()?;
        Ok(())
    }

    /// Trimmed, de-duplicated category list.
    pub fn category_list(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for category in &self.categories {
            let category = category.trim();
            if !categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                categories.push(category.to_string());
            }
        }
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_llm::ProviderKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.categories.is_empty());
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
    }

    #[test]
    fn test_nested_sections() {
        let config = AppConfig::from_toml(
            r#"
            categories = ["Office Supplies", "Travel"]

            [monitor]
            watch_dir = "/data/inbox"
            archive_dir = "/data/archive"
            debounce_ms = 500

            [provider]
            kind = "ollama"
            model = "llava:13b"

            [processor]
            review_confidence_threshold = 0.6

            [processor.retry]
            max_retries = 1

            [processor.validation]
            validate_date_format = false
            "#,
        )
        .unwrap();

        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.monitor.debounce_ms, 500);
        assert_eq!(config.monitor.workers, 1);
        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert_eq!(config.provider.model(), "llava:13b");
        assert_eq!(config.processor.retry.max_retries, 1);
        assert_eq!(config.processor.retry.initial_delay_ms, 1000);
        assert!(!config.processor.validation.validate_date_format);
        assert_eq!(config.processor.review_confidence_threshold, 0.6);
    }

    #[test]
    fn test_invalid_section_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [monitor]
            workers = 0
            "#,
        );
        assert!(matches!(result, Err(CliError::Monitor(_))));

        let result = AppConfig::from_toml(
            r#"
            [processor.retry]
            backoff_multiplier = 0.5
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = AppConfig::default();
        config.categories = vec!["Travel".into()];
        config.monitor.workers = 3;

        let toml = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "categories = [\"Meals\"]\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.categories, vec!["Meals".to_string()]);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(AppConfig::load(Some(&missing)), Err(CliError::Config(_))));
    }

    #[test]
    fn test_category_list_dedupes() {
        let config = AppConfig {
            categories: vec![" Travel ".into(), "travel".into(), "Meals".into()],
            ..AppConfig::default()
        };
        assert_eq!(config.category_list(), vec!["Travel".to_string(), "Meals".to_string()]);
    }
}
