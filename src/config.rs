//! Configuration handling for the command line tool

use crate::forms::FormConfig;
use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User configuration for `form-studio`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudioConfig {
    /// Tracing filter used when `RUST_LOG` is not set
    pub log_filter: Option<String>,
    /// Autosave interval in seconds, replacing the form's own setting
    pub auto_save_interval: Option<u64>,
    /// Session timeout in seconds, replacing the form's own setting
    pub session_timeout: Option<u64>,
    /// Pretty-print JSON output
    pub pretty_output: Option<bool>,
}

impl StudioConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "form-studio", "form-studio")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if let Some(path) = path {
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                let config: StudioConfig = serde_json::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(&path, content)?;
        }
        Ok(())
    }

    pub fn pretty(&self) -> bool {
        self.pretty_output.unwrap_or(true)
    }

    /// Apply user overrides to a form config before it is compiled
    pub fn apply(&self, form: &mut FormConfig) {
        if let Some(interval) = self.auto_save_interval {
            form.settings.auto_save_interval = interval;
        }
        if let Some(timeout) = self.session_timeout {
            form.settings.session_timeout = Some(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{FieldDefinition, Layout};

    #[test]
    fn test_default_config() {
        let config = StudioConfig::default();
        assert!(config.log_filter.is_none());
        assert!(config.auto_save_interval.is_none());
        assert!(config.session_timeout.is_none());
        assert!(config.pretty_output.is_none());
        assert!(config.pretty());
    }

    #[test]
    fn test_serialization() {
        let config = StudioConfig {
            log_filter: Some("form_studio=debug".to_string()),
            auto_save_interval: Some(5),
            session_timeout: Some(600),
            pretty_output: Some(false),
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: StudioConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.log_filter, Some("form_studio=debug".to_string()));
        assert_eq!(parsed.auto_save_interval, Some(5));
        assert_eq!(parsed.session_timeout, Some(600));
        assert!(!parsed.pretty());
    }

    #[test]
    fn test_deserialize_from_empty_json() {
        let parsed: StudioConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.log_filter.is_none());
    }

    #[test]
    fn test_deserialize_with_extra_fields() {
        // Should ignore unknown fields
        let json = r#"{"log_filter": "warn", "unknown_field": "value"}"#;
        let parsed: StudioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.log_filter, Some("warn".to_string()));
    }

    #[test]
    fn test_apply_overrides_form_settings() {
        let mut form = FormConfig::new(
            "f",
            "F",
            Layout::Single,
            vec![FieldDefinition::text("a", "A")],
        );
        let config = StudioConfig {
            auto_save_interval: Some(3),
            ..Default::default()
        };
        config.apply(&mut form);
        assert_eq!(form.settings.auto_save_interval, 3);
        assert_eq!(form.settings.session_timeout, None);
    }

    #[test]
    fn test_load_returns_ok() {
        // Returns defaults when no config file exists
        let result = StudioConfig::load();
        assert!(result.is_ok());
    }
}
