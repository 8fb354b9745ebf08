//! Configuration management with YAML support

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shortcut::Shortcut;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scan timing, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_backstop_interval_ms")]
    pub backstop_interval_ms: u64,

    #[serde(default = "default_workspace_poll_ms")]
    pub workspace_poll_ms: u64,
}

/// Media placeholder heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Inline-encoded sources shorter than this are blurred placeholders.
    #[serde(default = "default_placeholder_max_len")]
    pub placeholder_max_len: usize,

    /// Both rendered dimensions must exceed this to count as full size.
    #[serde(default = "default_min_dimension_px")]
    pub min_dimension_px: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    #[serde(default)]
    pub format: ExportFormat,

    #[serde(default = "default_shortcut")]
    pub shortcut: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_debounce_ms() -> u64 {
    1_000
}

fn default_backstop_interval_ms() -> u64 {
    5_000
}

fn default_workspace_poll_ms() -> u64 {
    1_000
}

fn default_placeholder_max_len() -> usize {
    1_000
}

fn default_min_dimension_px() -> u32 {
    100
}

fn default_output_dir() -> String {
    "~/Downloads".to_string()
}

fn default_filename_prefix() -> String {
    "chat_export".to_string()
}

fn default_shortcut() -> String {
    "ctrl+shift+e".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            backstop_interval_ms: default_backstop_interval_ms(),
            workspace_poll_ms: default_workspace_poll_ms(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            placeholder_max_len: default_placeholder_max_len(),
            min_dimension_px: default_min_dimension_px(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            filename_prefix: default_filename_prefix(),
            format: ExportFormat::default(),
            shortcut: default_shortcut(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./chatwatch.yaml (current directory)
    /// 3. ~/.config/chatwatch/chatwatch.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "chatwatch.yaml".to_string(),
            shellexpand::tilde("~/.config/chatwatch/chatwatch.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("Failed to read config {}", search_path))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config {}", search_path))?;
                config.validate()?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Reject timing and shortcut settings the watcher cannot run with
    pub fn validate(&self) -> Result<()> {
        let scheduler = &self.scheduler;
        if scheduler.debounce_ms == 0 || scheduler.workspace_poll_ms == 0 {
            bail!("scheduler intervals must be greater than zero");
        }
        if scheduler.backstop_interval_ms <= scheduler.debounce_ms {
            bail!(
                "backstop_interval_ms ({}) must be coarser than debounce_ms ({})",
                scheduler.backstop_interval_ms,
                scheduler.debounce_ms
            );
        }
        self.shortcut()?;
        Ok(())
    }

    /// Get the export directory, expanding ~ to home directory
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.export.output_dir).to_string())
    }

    /// Parse the configured export shortcut
    pub fn shortcut(&self) -> Result<Shortcut> {
        self.export
            .shortcut
            .parse()
            .with_context(|| format!("Invalid export shortcut {:?}", self.export.shortcut))
    }
}
