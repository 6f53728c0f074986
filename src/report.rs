//! The per-run result record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::MirrorConfig;
use crate::contract::ArchiveResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// The mirror was salvaged from a tool run that reported problems.
    Warning,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub url: String,
    pub output_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_file: Option<String>,
    pub file_count: u64,
    pub total_size: u64,
    pub archive_size: u64,
    pub compression_ratio: f64,
    pub timestamp: DateTime<Utc>,
    pub config: MirrorConfig,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    pub fn completed(
        url: &str,
        output_name: &str,
        archive: &ArchiveResult,
        config: &MirrorConfig,
        status: RunStatus,
    ) -> Self {
        Self {
            url: url.to_string(),
            output_name: output_name.to_string(),
            archive_file: archive
                .archive_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            file_count: archive.file_count,
            total_size: archive.total_size,
            archive_size: archive.archive_size,
            compression_ratio: archive.compression_ratio,
            timestamp: Utc::now(),
            config: config.clone(),
            status,
            error: None,
        }
    }

    pub fn failed(url: &str, output_name: &str, config: &MirrorConfig, error: String) -> Self {
        Self {
            url: url.to_string(),
            output_name: output_name.to_string(),
            archive_file: None,
            file_count: 0,
            total_size: 0,
            archive_size: 0,
            compression_ratio: 0.0,
            timestamp: Utc::now(),
            config: config.clone(),
            status: RunStatus::Failed,
            error: Some(error),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run record")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write run record to {}", path.display()))?;
        info!(path = %path.display(), status = ?self.status, "Run record written");
        Ok(())
    }
}
