//! Running `httrack` as a supervised subprocess.
//!
//! [`HttrackMirrorer`] implements [`Mirrorer`]: it validates the target URL,
//! spawns the tool non-interactively with its output captured, enforces the
//! timeout budget and classifies a non-zero exit into a typed error or a
//! soft success.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::command::{normalize_url, render_command, HTTRACK_PROGRAM};
use crate::config::MirrorConfig;
use crate::contract::{MirrorInvocation, MirrorOutcome, Mirrorer};
use crate::error::MirrorError;

/// Environment variable naming the tool binary to run instead of `httrack` on `PATH`.
pub const HTTRACK_BIN_ENV: &str = "HTTRACK_BIN";

/// Extra time granted on top of httrack's own `-E` limit before we kill it.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(60);

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const DETAIL_LINES: usize = 20;

// Matched case-insensitively against captured output. DNS markers are checked first;
// network markers only fail a run that left nothing behind.
const DNS_MARKERS: &[&str] = &[
    "could not resolve",
    "cannot resolve",
    "can't resolve",
    "unable to get server's address",
    "name or service not known",
    "temporary failure in name resolution",
    "nodename nor servname",
    "unknown host",
    "host not found",
];
const NETWORK_MARKERS: &[&str] = &[
    "network is unreachable",
    "no route to host",
    "connection refused",
    "could not connect",
    "unable to connect",
    "connection timed out",
];

/// Wall-clock budget for a run: httrack's own limit plus [`TIMEOUT_GRACE`], or unbounded.
pub fn timeout_budget(config: &MirrorConfig) -> Option<Duration> {
    (config.max_time_seconds > 0)
        .then(|| Duration::from_secs(u64::from(config.max_time_seconds)) + TIMEOUT_GRACE)
}

/// Normalize and check a target URL: http(s) scheme and a non-empty host.
pub fn validate_url(raw: &str) -> Result<Url, MirrorError> {
    let invalid = |reason: String| MirrorError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL is empty".to_string()));
    }
    // An explicit foreign scheme must not be "fixed" by the https:// prefix.
    if let Some((scheme, _)) = trimmed.split_once("://") {
        let looks_like_scheme = scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if looks_like_scheme
            && !scheme.eq_ignore_ascii_case("http")
            && !scheme.eq_ignore_ascii_case("https")
        {
            return Err(invalid(format!("unsupported scheme {scheme}")));
        }
    }
    let url = Url::parse(&normalize_url(trimmed)).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// What a non-zero exit most likely means, judged from the tool's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDiagnosis {
    DomainNotFound,
    NetworkUnreachable,
    /// The tool ran but complained; unmatched output always lands here.
    ToolWarning,
}

pub fn classify_failure(output: &str) -> FailureDiagnosis {
    let lower = output.to_lowercase();
    if DNS_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureDiagnosis::DomainNotFound
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureDiagnosis::NetworkUnreachable
    } else {
        FailureDiagnosis::ToolWarning
    }
}

pub(crate) fn dir_has_content(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

async fn drain<R>(stream: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            debug!(error = ?e, "Stopped reading httrack output");
        }
    }
    buf
}

/// Runs the real `httrack` binary.
#[derive(Debug, Clone)]
pub struct HttrackMirrorer {
    program: PathBuf,
}

impl Default for HttrackMirrorer {
    fn default() -> Self {
        Self::new(HTTRACK_PROGRAM)
    }
}

impl HttrackMirrorer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses `$HTTRACK_BIN` when set, `httrack` from `PATH` otherwise.
    pub fn from_env() -> Self {
        match std::env::var(HTTRACK_BIN_ENV) {
            Ok(program) if !program.trim().is_empty() => {
                info!(program = %program, "Using httrack binary from {}", HTTRACK_BIN_ENV);
                Self::new(program)
            }
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn spawn_error(&self, err: std::io::Error) -> MirrorError {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                MirrorError::ToolNotInstalled {
                    program: self.program_name(),
                    source: Some(err),
                }
            }
            _ => MirrorError::Spawn(err),
        }
    }
}

#[async_trait]
impl Mirrorer for HttrackMirrorer {
    async fn probe(&self) -> Result<String, MirrorError> {
        let mut command = Command::new(&self.program);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(error = ?e, program = %self.program.display(), "httrack could not be started");
                return Err(MirrorError::ToolNotInstalled {
                    program: self.program_name(),
                    source: Some(e),
                });
            }
            Err(_) => {
                error!(program = %self.program.display(), "httrack version probe hung");
                return Err(MirrorError::ToolNotInstalled {
                    program: self.program_name(),
                    source: None,
                });
            }
        };

        if !output.status.success() {
            error!(
                program = %self.program.display(),
                status = ?output.status,
                "httrack version probe failed"
            );
            return Err(MirrorError::ToolNotInstalled {
                program: self.program_name(),
                source: None,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("unknown version")
            .to_string();
        info!(program = %self.program.display(), version = %version, "httrack is installed");
        Ok(version)
    }

    async fn invoke(&self, invocation: MirrorInvocation) -> Result<MirrorOutcome, MirrorError> {
        let target = invocation.args.get(1).map(String::as_str).unwrap_or_default();
        let url = validate_url(target)?;

        let mut command = Command::new(&self.program);
        command
            .args(invocation.args.iter().skip(1))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            url = %url,
            output_dir = %invocation.output_dir.display(),
            timeout = ?invocation.timeout,
            command = %render_command(&invocation.args),
            "Starting httrack"
        );

        let mut child = command.spawn().map_err(|e| {
            error!(error = ?e, program = %self.program.display(), "Failed to launch httrack process");
            self.spawn_error(e)
        })?;

        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let waited = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(url = %url, ?limit, "httrack exceeded its time budget, terminating");
                    // kill() also reaps the child, so nothing is left running.
                    if let Err(e) = child.kill().await {
                        error!(error = ?e, "Failed to terminate httrack");
                    }
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(MirrorError::Timeout(limit));
                }
            },
            None => child.wait().await,
        };
        let status = waited.map_err(|e| {
            error!(error = ?e, "Failed waiting for httrack");
            MirrorError::Io(e)
        })?;

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            info!(url = %url, output_dir = %invocation.output_dir.display(), "httrack completed successfully");
            return Ok(MirrorOutcome::Complete {
                output_dir: invocation.output_dir,
            });
        }

        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&stderr),
            String::from_utf8_lossy(&stdout)
        );
        let detail = tail_lines(&combined, DETAIL_LINES);
        let exit_code = status.code();

        let has_content = dir_has_content(&invocation.output_dir);
        // Connection errors also show up per link; they only sink the run
        // when nothing was mirrored at all.
        match classify_failure(&combined) {
            FailureDiagnosis::DomainNotFound => {
                error!(url = %url, ?exit_code, "httrack could not resolve the domain");
                Err(MirrorError::DomainNotFound { detail })
            }
            diagnosis @ (FailureDiagnosis::NetworkUnreachable | FailureDiagnosis::ToolWarning)
                if has_content =>
            {
                warn!(
                    url = %url,
                    ?exit_code,
                    ?diagnosis,
                    detail = %detail,
                    "httrack completed with warnings, keeping partial mirror"
                );
                Ok(MirrorOutcome::Partial {
                    output_dir: invocation.output_dir,
                    exit_code,
                    detail,
                })
            }
            FailureDiagnosis::NetworkUnreachable => {
                error!(url = %url, ?exit_code, "httrack could not reach the network");
                Err(MirrorError::NetworkUnreachable { detail })
            }
            FailureDiagnosis::ToolWarning => {
                error!(url = %url, ?exit_code, detail = %detail, "httrack failed without producing content");
                Err(MirrorError::NoContent {
                    output_dir: invocation.output_dir,
                    exit_code,
                })
            }
        }
    }
}
