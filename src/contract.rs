//! # contract: seams between the orchestrator and its collaborators
//!
//! The orchestrator in [`crate::pipeline`] only talks to the mirroring tool
//! and the archiver through the [`Mirrorer`] and [`Archiver`] traits. The
//! concrete implementations are [`crate::mirror::HttrackMirrorer`] and
//! [`crate::archive::ZipArchiver`]; tests plug in the `mockall` generated
//! `MockMirrorer` / `MockArchiver` instead.
//!
//! Swapping the external tool (or replacing it with an in-process crawler)
//! means implementing [`Mirrorer`]; nothing else has to change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;

use crate::error::{ArchiveError, MirrorError};

/// One execution of the mirroring tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorInvocation {
    /// Full argument vector, `args[0]` being the tool name.
    pub args: Vec<String>,
    /// Directory the tool writes into; inspected on non-zero exit.
    pub output_dir: PathBuf,
    /// `None` waits for as long as the tool runs.
    pub timeout: Option<Duration>,
}

/// How a mirror run ended when it produced something usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The tool exited with status 0.
    Complete { output_dir: PathBuf },
    /// The tool reported problems but left content behind (soft success).
    Partial {
        output_dir: PathBuf,
        exit_code: Option<i32>,
        detail: String,
    },
}

impl MirrorOutcome {
    pub fn output_dir(&self) -> &Path {
        match self {
            MirrorOutcome::Complete { output_dir } | MirrorOutcome::Partial { output_dir, .. } => {
                output_dir
            }
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, MirrorOutcome::Partial { .. })
    }
}

/// Statistics of a finished archive. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResult {
    pub archive_path: PathBuf,
    pub archive_size: u64,
    pub file_count: u64,
    pub total_size: u64,
    pub compression_ratio: f64,
}

impl ArchiveResult {
    pub fn new(archive_path: PathBuf, archive_size: u64, file_count: u64, total_size: u64) -> Self {
        Self {
            compression_ratio: compression_ratio(archive_size, total_size),
            archive_path,
            archive_size,
            file_count,
            total_size,
        }
    }
}

/// `1 - archive/source`, 0 for an empty source. Archives larger than their
/// source (tiny inputs, zip overhead) report 0 rather than a negative ratio.
pub fn compression_ratio(archive_size: u64, total_size: u64) -> f64 {
    if total_size == 0 {
        return 0.0;
    }
    (1.0 - archive_size as f64 / total_size as f64).max(0.0)
}

/// Runs the external mirroring tool.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Mirrorer: Send + Sync {
    /// One-shot availability check; returns the tool's version line.
    async fn probe(&self) -> Result<String, MirrorError>;

    /// Execute one mirror run and classify how it ended.
    async fn invoke(&self, invocation: MirrorInvocation) -> Result<MirrorOutcome, MirrorError>;
}

/// Packages a directory tree into a single archive file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, source: &Path, dest: &Path) -> Result<ArchiveResult, ArchiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_zero_for_empty_source() {
        assert_eq!(compression_ratio(22, 0), 0.0);
    }

    #[test]
    fn ratio_stays_in_unit_interval() {
        assert!((compression_ratio(250, 1000) - 0.75).abs() < f64::EPSILON);
        assert_eq!(compression_ratio(1500, 1000), 0.0);
        let r = compression_ratio(22, 1_000_000);
        assert!((0.0..1.0).contains(&r));
    }
}
