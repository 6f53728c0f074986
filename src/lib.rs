//! # httrack-zip
//!
//! Mirror a website with the external `httrack` tool and package the mirror
//! as a ZIP archive, producing a JSON run record.
//!
//! - [`command`]: deterministic httrack argument vectors from a [`config::MirrorConfig`].
//! - [`mirror`]: supervised httrack subprocess ([`mirror::HttrackMirrorer`]).
//! - [`archive`]: atomic ZIP packaging ([`archive::ZipArchiver`]).
//! - [`pipeline`]: the per-job state machine tying the steps together.
//!
//! The [`contract`] traits are the seams; with the `test-export-mocks` feature
//! their `mockall` mocks are exported for downstream tests.

pub mod archive;
pub mod cli;
pub mod command;
pub mod config;
pub mod contract;
pub mod error;
pub mod load_config;
pub mod mirror;
pub mod pipeline;
pub mod report;

pub use config::{ConfigOverrides, MirrorConfig};
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{MirrorRequest, Pipeline, PipelineState};
pub use report::{RunRecord, RunStatus};
