//! Settings management.
//!
//! Configuration is a TOML file (default `blobsync.toml` in the working
//! directory, overridable with `--config`). Every section except `[azure]`
//! has sensible defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use blobsync_discovery::FileFilters;
use blobsync_pipeline::PipelineSettings;

/// Destination container and authentication.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureSettings {
    /// Full container URL, without the SAS token.
    #[serde(default)]
    pub container_url: String,

    /// SAS token, with or without the leading `?`.
    #[serde(default)]
    pub sas_token: String,

    /// Optional blob name prefix (virtual folder). Empty = container root.
    #[serde(default)]
    pub blob_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleSettings {
    #[serde(default = "default_delay_ms")]
    pub delay_between_files_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            delay_between_files_ms: default_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// The periodic status reporter (the in-process observer).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_ms: default_refresh_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub azure: AzureSettings,

    #[serde(default)]
    pub source_folders: Vec<PathBuf>,

    #[serde(default = "default_true")]
    pub scan_recursively: bool,

    #[serde(default)]
    pub file_filters: FileFilters,

    #[serde(default)]
    pub throttling: ThrottleSettings,

    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    /// Walk everything up front for accurate totals and per-folder
    /// progress before the first upload.
    #[serde(default = "default_true")]
    pub pre_enumerate: bool,

    #[serde(default)]
    pub status: StatusSettings,
}

fn default_true() -> bool {
    true
}

fn default_delay_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_refresh_ms() -> u64 {
    1000
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("upload-progress.json")
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("cannot parse config {}: {e}", path.display()))?;
        Ok(settings)
    }

    /// Checks the fatal configuration errors up front; warns (but does not
    /// fail) about source folders that do not exist — discovery skips them.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.azure.container_url.trim().is_empty()
            || self.azure.container_url.contains("<account>")
        {
            errors.push("azure.container_url is not configured".to_string());
        }
        if self.azure.sas_token.trim().is_empty() || self.azure.sas_token == "?sv=..." {
            errors.push("azure.sas_token is not configured".to_string());
        }
        if self.source_folders.is_empty() {
            errors.push("no source folders configured".to_string());
        }

        for folder in &self.source_folders {
            if !folder.is_dir() {
                warn!(folder = %folder.display(), "source folder does not exist");
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            source_folders: self.source_folders.clone(),
            recursive: self.scan_recursively,
            filters: self.file_filters.clone(),
            delay_between_files_ms: self.throttling.delay_between_files_ms,
            max_retries: self.throttling.max_retries,
            blob_prefix: self.azure.blob_prefix.clone(),
            progress_path: self.progress_file.clone(),
            destination: self.azure.container_url.clone(),
            pre_enumerate: self.pre_enumerate,
        }
    }
}
