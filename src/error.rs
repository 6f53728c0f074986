//! Error types for the mirror, archive and orchestration steps.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Failures of the external mirroring tool.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("httrack is not installed or not runnable ({program})")]
    ToolNotInstalled {
        program: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("httrack did not finish within {0:?} and was terminated")]
    Timeout(Duration),
    #[error("network unreachable while mirroring: {detail}")]
    NetworkUnreachable { detail: String },
    #[error("domain could not be resolved: {detail}")]
    DomainNotFound { detail: String },
    #[error("httrack exited with code {exit_code:?} and produced no content in {}", .output_dir.display())]
    NoContent {
        output_dir: PathBuf,
        exit_code: Option<i32>,
    },
    #[error("failed to run httrack")]
    Spawn(#[source] io::Error),
    #[error("i/o failure while supervising httrack")]
    Io(#[source] io::Error),
}

/// Failures while packaging a mirror into a ZIP archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot read archive source {}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write archive {}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn source_unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// Post-run cleanup failure. Only ever logged: the archive is already in place.
#[derive(Debug, Error)]
#[error("cleanup of {} failed", .path.display())]
pub struct CleanupFailed {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Coarse classification of a failed run, as surfaced to callers and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUrl,
    InvalidConfig,
    ToolNotInstalled,
    Timeout,
    NetworkUnreachable,
    DomainNotFound,
    NoContent,
    ToolFailed,
    OutputDirectory,
    SourceUnreadable,
    WriteFailed,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("cannot create output directory {}", .path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::InvalidConfig,
            Self::Mirror(err) => match err {
                MirrorError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
                MirrorError::ToolNotInstalled { .. } => ErrorKind::ToolNotInstalled,
                MirrorError::Timeout(_) => ErrorKind::Timeout,
                MirrorError::NetworkUnreachable { .. } => ErrorKind::NetworkUnreachable,
                MirrorError::DomainNotFound { .. } => ErrorKind::DomainNotFound,
                MirrorError::NoContent { .. } => ErrorKind::NoContent,
                MirrorError::Spawn(_) | MirrorError::Io(_) => ErrorKind::ToolFailed,
            },
            Self::Archive(err) => match err {
                ArchiveError::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
                ArchiveError::WriteFailed { .. } => ErrorKind::WriteFailed,
            },
            Self::OutputDirectory { .. } => ErrorKind::OutputDirectory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn kinds_follow_the_wrapped_error() {
        let err = PipelineError::from(MirrorError::Timeout(Duration::from_secs(5)));
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err = PipelineError::from(ArchiveError::write_failed(
            "out.zip",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ));
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        assert!(err.source().is_some());
    }
}
