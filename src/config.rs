// ABOUTME: Configuration loading and validation for the worldlog binary.
// ABOUTME: Reads the YAML config file, warning and falling back on bad values.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use worldlog_core::format::{FormatterTable, template_formatter};

const DEFAULT_ENTRIES_PER_PAGE: u32 = 25;

/// Errors that can occur while loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize)]
struct RawActionFormat {
    action: String,
    format: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "entries-per-page")]
    entries_per_page: Option<u32>,

    #[serde(rename = "enabled-actions")]
    enabled_actions: Option<Vec<String>>,

    #[serde(rename = "action-formats")]
    action_formats: Option<Vec<RawActionFormat>>,
}

/// Validated configuration for the worldlog binary.
#[derive(Debug)]
pub struct WorldlogConfig {
    pub entries_per_page: u32,
    pub enabled_actions: Vec<String>,
    pub action_formats: Vec<(String, String)>,
}

impl Default for WorldlogConfig {
    fn default() -> Self {
        Self {
            entries_per_page: DEFAULT_ENTRIES_PER_PAGE,
            enabled_actions: Vec::new(),
            action_formats: Vec::new(),
        }
    }
}

impl WorldlogConfig {
    /// Load configuration from a YAML file. A missing file yields defaults
    /// with a warning; an unreadable or unparseable file is an error; bad
    /// individual values warn and fall back.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw: RawConfig = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;

        let entries_per_page = match raw.entries_per_page {
            Some(n) if n >= 1 => n,
            Some(n) => {
                tracing::warn!("'entries-per-page' is improperly configured: an integer >= 1 is required, but {n} was supplied");
                tracing::warn!("a fallback value of {DEFAULT_ENTRIES_PER_PAGE} will be used");
                DEFAULT_ENTRIES_PER_PAGE
            }
            None => DEFAULT_ENTRIES_PER_PAGE,
        };

        Ok(Self {
            entries_per_page,
            enabled_actions: raw.enabled_actions.unwrap_or_default(),
            action_formats: raw
                .action_formats
                .unwrap_or_default()
                .into_iter()
                .map(|f| (f.action, f.format))
                .collect(),
        })
    }

    /// Build the per-action formatter table from the configured templates.
    pub fn formatter_table(&self) -> FormatterTable {
        let mut table = FormatterTable::new();
        for (action, format) in &self.action_formats {
            table.register(action.clone(), template_formatter(format.clone()));
        }
        table
    }
}
