//! High-level pipeline: resolve configuration, mirror, archive, report.
//!
//! [`Pipeline`] drives one job through an explicit state machine:
//!
//! ```text
//! Idle -> ConfigResolved -> Mirroring -> Archiving -> Reporting -> Done
//!   \__________\_______________\____________\______________\-> Failed(kind)
//! ```
//!
//! Every mirror or archive error aborts the run and is returned verbatim;
//! the only tolerated failures are cleanup failures, which are logged.
//! No retries happen here; transient network problems are left to
//! httrack's own retry count.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde_json::json;
use tracing::{error, info, warn};
use url::Url;

use crate::command::{build_args, normalize_url, render_command};
use crate::config::{ConfigOverrides, MirrorConfig};
use crate::contract::{Archiver, MirrorInvocation, MirrorOutcome, Mirrorer};
use crate::error::{CleanupFailed, ConfigError, ErrorKind, PipelineError};
use crate::mirror::{timeout_budget, validate_url};
use crate::report::{RunRecord, RunStatus};

pub const DEFAULT_OUTPUT_BASE: &str = "scraped_websites";
/// Written into every mirror before archiving: url, timestamp, config and command.
pub const JOB_METADATA_FILE: &str = "scrape_config.json";

/// What to delete once the record has been produced. Deletion cannot be undone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub remove_source: bool,
    pub remove_archive: bool,
}

/// Caller input for one run.
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    pub url: String,
    /// Explicit directory/archive name; uniqueness is then the caller's concern.
    pub output_name: Option<String>,
    pub output_base: PathBuf,
    pub persisted: ConfigOverrides,
    pub overrides: ConfigOverrides,
    pub cleanup: CleanupPolicy,
}

impl MirrorRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_name: None,
            output_base: PathBuf::from(DEFAULT_OUTPUT_BASE),
            persisted: ConfigOverrides::default(),
            overrides: ConfigOverrides::default(),
            cleanup: CleanupPolicy::default(),
        }
    }

    /// The configuration this request resolves to, ignoring validity.
    pub fn resolved_config(&self) -> MirrorConfig {
        MirrorConfig::resolve(&self.persisted, &self.overrides)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    SucceededWithWarnings,
    Failed,
}

/// One mirroring job. Owns its output directory for its lifetime.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    pub url: Url,
    /// The URL as handed to httrack.
    pub target: String,
    pub output_name: String,
    pub output_dir: PathBuf,
    pub config: MirrorConfig,
    pub state: JobState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ConfigResolved,
    Mirroring,
    Archiving,
    Reporting,
    Done,
    Failed(ErrorKind),
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

/// Replace everything but `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned = unsafe_chars().replace_all(raw, "_");
    let trimmed = cleaned.trim_matches(|c: char| c == '_' || c == '.');
    if trimmed.is_empty() {
        "site".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<host>[_<port>]_<YYYYmmdd_HHMMSS>`
pub fn derive_output_name(url: &Url, at: DateTime<Local>) -> String {
    let host = url.host_str().unwrap_or_default();
    let base = match url.port() {
        Some(port) => format!("{host}_{port}"),
        None => host.to_string(),
    };
    format!("{}_{}", sanitize_name(&base), at.format("%Y%m%d_%H%M%S"))
}

fn check_explicit_name(name: &str) -> Result<(), ConfigError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\')
        && !name.chars().any(char::is_control);
    if plain {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: "outputName",
            reason: "must be a plain directory name",
        })
    }
}

/// The name the job asks for: the validated explicit one, or one derived from
/// host and current time. Nothing is touched on disk.
fn planned_name(request: &MirrorRequest, url: &Url) -> Result<String, ConfigError> {
    match &request.output_name {
        Some(name) => {
            check_explicit_name(name)?;
            Ok(name.clone())
        }
        None => Ok(derive_output_name(url, Local::now())),
    }
}

/// Claim the job's directory below `output_base`.
///
/// Derived names are claimed with `create_dir`, so two jobs racing for the
/// same second never share a directory: the loser moves on to `_1`, `_2`, ...
/// Explicit names are reused as-is.
fn reserve_output(request: &MirrorRequest, planned: &str) -> Result<(String, PathBuf), PipelineError> {
    let base: &Path = &request.output_base;
    let dir_error = |path: &Path, source: std::io::Error| {
        error!(error = ?source, path = %path.display(), "[PIPELINE][ERROR] Cannot create output directory");
        PipelineError::OutputDirectory {
            path: path.to_path_buf(),
            source,
        }
    };

    fs::create_dir_all(base).map_err(|e| dir_error(base, e))?;

    if request.output_name.is_some() {
        let dir = base.join(planned);
        fs::create_dir_all(&dir).map_err(|e| dir_error(&dir, e))?;
        return Ok((planned.to_string(), dir));
    }

    let mut name = planned.to_string();
    let mut suffix = 1;
    loop {
        let dir = base.join(&name);
        if !base.join(format!("{name}.zip")).exists() {
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((name, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(dir_error(&dir, e)),
            }
        }
        name = format!("{planned}_{suffix}");
        suffix += 1;
    }
}

/// Best effort: a mirror without metadata is still a mirror.
fn write_job_metadata(output_dir: &Path, target: &str, config: &MirrorConfig, command: &str) {
    let path = output_dir.join(JOB_METADATA_FILE);
    let metadata = json!({
        "url": target,
        "timestamp": Utc::now(),
        "config": config,
        "command": command,
    });
    let written = serde_json::to_string_pretty(&metadata)
        .map_err(std::io::Error::from)
        .and_then(|body| fs::write(&path, body));
    if let Err(e) = written {
        warn!(error = ?e, path = %path.display(), "Could not write job metadata");
    }
}

/// Apply the cleanup policy. Returns what could not be removed.
pub fn cleanup(policy: CleanupPolicy, source_dir: &Path, archive: &Path) -> Vec<CleanupFailed> {
    let mut failures = Vec::new();
    if policy.remove_source {
        match fs::remove_dir_all(source_dir) {
            Ok(()) => info!(path = %source_dir.display(), "Removed mirror directory"),
            Err(source) => failures.push(CleanupFailed {
                path: source_dir.to_path_buf(),
                source,
            }),
        }
    }
    if policy.remove_archive {
        match fs::remove_file(archive) {
            Ok(()) => info!(path = %archive.display(), "Removed archive"),
            Err(source) => failures.push(CleanupFailed {
                path: archive.to_path_buf(),
                source,
            }),
        }
    }
    failures
}

/// Drives a single job. Not reusable: create one per run.
pub struct Pipeline<'a, M, A> {
    mirrorer: &'a M,
    archiver: &'a A,
    state: PipelineState,
    job: Option<MirrorJob>,
    tool_version: Option<String>,
}

impl<'a, M, A> Pipeline<'a, M, A>
where
    M: Mirrorer,
    A: Archiver,
{
    pub fn new(mirrorer: &'a M, archiver: &'a A) -> Self {
        Self {
            mirrorer,
            archiver,
            state: PipelineState::Idle,
            job: None,
            tool_version: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn job(&self) -> Option<&MirrorJob> {
        self.job.as_ref()
    }

    /// Version line of the mirroring tool, once the probe has succeeded.
    pub fn tool_version(&self) -> Option<&str> {
        self.tool_version.as_deref()
    }

    pub async fn run(&mut self, request: &MirrorRequest) -> Result<RunRecord, PipelineError> {
        info!(url = %request.url, "[PIPELINE] Starting mirror job");
        match self.execute(request).await {
            Ok(record) => {
                info!(
                    url = %record.url,
                    status = ?record.status,
                    archive = ?record.archive_file,
                    "[PIPELINE] Job finished"
                );
                Ok(record)
            }
            Err(err) => {
                let kind = err.kind();
                error!(?kind, error = %err, "[PIPELINE][ERROR] Job failed");
                self.set_job_state(JobState::Failed);
                self.transition(PipelineState::Failed(kind));
                Err(err)
            }
        }
    }

    /// Record describing a run that ended in `err`.
    pub fn failure_record(&self, request: &MirrorRequest, err: &PipelineError) -> RunRecord {
        match &self.job {
            Some(job) => RunRecord::failed(&job.target, &job.output_name, &job.config, err.to_string()),
            None => RunRecord::failed(
                &normalize_url(&request.url),
                request.output_name.as_deref().unwrap_or_default(),
                &request.resolved_config(),
                err.to_string(),
            ),
        }
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = ?self.state, to = ?next, "[PIPELINE] State transition");
        self.state = next;
    }

    fn set_job_state(&mut self, state: JobState) {
        if let Some(job) = self.job.as_mut() {
            job.state = state;
        }
    }

    async fn execute(&mut self, request: &MirrorRequest) -> Result<RunRecord, PipelineError> {
        // --- Idle -> ConfigResolved ---
        let url = validate_url(&request.url)?;
        let target = normalize_url(&request.url);
        let config = request.resolved_config();
        config.validate()?;
        config.trace_loaded();
        let planned = planned_name(request, &url)?;
        self.job = Some(MirrorJob {
            url,
            target: target.clone(),
            output_name: planned.clone(),
            output_dir: request.output_base.join(&planned),
            config: config.clone(),
            state: JobState::Pending,
        });
        self.transition(PipelineState::ConfigResolved);

        // --- ConfigResolved -> Mirroring ---
        // Probe first: a missing tool must not leave directories behind.
        let version = self.mirrorer.probe().await?;
        info!(version = %version, "[PIPELINE] Mirroring tool available");
        self.tool_version = Some(version);

        let (output_name, output_dir) = reserve_output(request, &planned)?;
        if let Some(job) = self.job.as_mut() {
            job.output_name = output_name.clone();
            job.output_dir = output_dir.clone();
        }
        info!(path = %output_dir.display(), "[PIPELINE] Output directory reserved");

        let args = build_args(&target, &output_dir, &config);
        let command = render_command(&args);
        self.set_job_state(JobState::Running);
        self.transition(PipelineState::Mirroring);

        let outcome = self
            .mirrorer
            .invoke(MirrorInvocation {
                args,
                output_dir: output_dir.clone(),
                timeout: timeout_budget(&config),
            })
            .await?;
        if let MirrorOutcome::Partial {
            exit_code, detail, ..
        } = &outcome
        {
            warn!(?exit_code, detail = %detail, "[PIPELINE] Continuing with partial mirror");
        }
        write_job_metadata(outcome.output_dir(), &target, &config, &command);

        // --- Mirroring -> Archiving ---
        self.transition(PipelineState::Archiving);
        let archive_path = request.output_base.join(format!("{output_name}.zip"));
        let archive = self
            .archiver
            .archive(outcome.output_dir(), &archive_path)
            .await?;

        // --- Archiving -> Reporting ---
        self.transition(PipelineState::Reporting);
        let (status, job_state) = if outcome.is_partial() {
            (RunStatus::Warning, JobState::SucceededWithWarnings)
        } else {
            (RunStatus::Success, JobState::Succeeded)
        };
        self.set_job_state(job_state);
        let record = RunRecord::completed(&target, &output_name, &archive, &config, status);

        for failure in cleanup(request.cleanup, outcome.output_dir(), &archive.archive_path) {
            warn!(error = %failure, cause = ?failure.source, "[PIPELINE] CleanupFailed, ignoring");
        }

        // --- Reporting -> Done ---
        self.transition(PipelineState::Done);
        Ok(record)
    }
}
