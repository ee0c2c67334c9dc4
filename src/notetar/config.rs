use crate::error::{NotetarError, Result};
use crate::export::{ExportFormat, ExportOptions, DEFAULT_EXCLUDE_LABEL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILENAME: &str = "config.json";

/// Export defaults, stored in `<store>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotetarConfig {
    /// Format used when `--format` is not given
    #[serde(default)]
    pub default_format: ExportFormat,

    /// Notes carrying this label are left out of exports
    #[serde(default = "default_exclude_label")]
    pub exclude_label: String,

    /// Compress archives with gzip
    #[serde(default)]
    pub gzip: bool,
}

fn default_exclude_label() -> String {
    DEFAULT_EXCLUDE_LABEL.to_string()
}

impl Default for NotetarConfig {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::default(),
            exclude_label: default_exclude_label(),
            gzip: false,
        }
    }
}

impl NotetarConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(NotetarError::Io)?;
        let config: NotetarConfig =
            serde_json::from_str(&content).map_err(NotetarError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(NotetarError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(NotetarError::Serialization)?;
        fs::write(config_path, content).map_err(NotetarError::Io)?;
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &["default-format", "exclude-label", "gzip"]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "default-format" => Some(self.default_format.to_string()),
            "exclude-label" => Some(self.exclude_label.clone()),
            "gzip" => Some(self.gzip.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "default-format" => {
                self.default_format = value.parse().map_err(|e: NotetarError| e.to_string())?;
            }
            "exclude-label" => {
                let label = value.trim();
                if label.is_empty() {
                    return Err("exclude-label cannot be empty".to_string());
                }
                self.exclude_label = label.to_string();
            }
            "gzip" => {
                self.gzip = match value.to_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    _ => return Err(format!("Invalid boolean for gzip: {}", value)),
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    /// Export options from config, with per-call overrides applied on top.
    pub fn export_options(&self, format: Option<ExportFormat>, gzip: bool) -> ExportOptions {
        ExportOptions {
            format: format.unwrap_or(self.default_format),
            exclude_label: self.exclude_label.clone(),
            gzip: gzip || self.gzip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = NotetarConfig::default();
        assert_eq!(config.default_format, ExportFormat::Html);
        assert_eq!(config.exclude_label, "excludeFromExport");
        assert!(!config.gzip);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempdir().unwrap();
        let config = NotetarConfig::load(dir.path().join("nowhere")).unwrap();
        assert_eq!(config, NotetarConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut config = NotetarConfig::default();
        config.set("default-format", "markdown").unwrap();
        config.set("gzip", "yes").unwrap();
        config.save(dir.path()).unwrap();

        let loaded = NotetarConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.default_format, ExportFormat::Markdown);
        assert!(loaded.gzip);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), r#"{"gzip": true}"#).unwrap();
        let loaded = NotetarConfig::load(dir.path()).unwrap();
        assert!(loaded.gzip);
        assert_eq!(loaded.exclude_label, "excludeFromExport");
        assert_eq!(loaded.default_format, ExportFormat::Html);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = NotetarConfig::default();
        assert!(config.set("default-format", "pdf").is_err());
        assert!(config.set("gzip", "maybe").is_err());
        assert!(config.set("exclude-label", "  ").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert_eq!(config, NotetarConfig::default());
    }

    #[test]
    fn test_get_known_keys() {
        let config = NotetarConfig::default();
        for key in NotetarConfig::keys() {
            assert!(config.get(key).is_some());
        }
        assert_eq!(config.get("default-format").as_deref(), Some("html"));
        assert_eq!(config.get("nope"), None);
    }

    #[test]
    fn test_export_options_overrides() {
        let config = NotetarConfig {
            default_format: ExportFormat::Markdown,
            exclude_label: "private".to_string(),
            gzip: false,
        };
        let options = config.export_options(Some(ExportFormat::Raw), true);
        assert_eq!(options.format, ExportFormat::Raw);
        assert_eq!(options.exclude_label, "private");
        assert!(options.gzip);

        let options = config.export_options(None, false);
        assert_eq!(options.format, ExportFormat::Markdown);
        assert!(!options.gzip);
    }
}
