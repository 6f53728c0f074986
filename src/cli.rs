//! Command-line front end: argument parsing and the async `run` entrypoint.
//!
//! Only glue lives here. The pipeline and its parts are in the library
//! modules; this module builds a [`MirrorRequest`] from flags, runs it, prints
//! the resulting record and maps the outcome to the process exit status.
use crate::archive::ZipArchiver;
use crate::config::ConfigOverrides;
use crate::contract::Mirrorer;
use crate::load_config::{load_config, save_config};
use crate::mirror::HttrackMirrorer;
use crate::pipeline::{CleanupPolicy, MirrorRequest, Pipeline, DEFAULT_OUTPUT_BASE};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for httrack-zip: mirror a website with httrack and package it as a ZIP.
#[derive(Parser)]
#[clap(
    name = "httrack-zip",
    version,
    about = "Mirror a website with httrack and package the result as a ZIP archive"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror a site, archive it and print the run record as JSON
    Mirror {
        /// Target URL; `https://` is assumed when no scheme is given
        url: String,
        /// Name for the mirror directory and archive (derived from host and time otherwise)
        #[clap(long)]
        output: Option<String>,
        /// Directory receiving mirrors and archives
        #[clap(long, default_value = DEFAULT_OUTPUT_BASE)]
        output_base: PathBuf,
        /// Persisted configuration layer (YAML or JSON)
        #[clap(long)]
        config: Option<PathBuf>,
        /// Write the resolved configuration here before running
        #[clap(long)]
        save_config: Option<PathBuf>,
        /// Delete the mirror directory once archived
        #[clap(long)]
        cleanup: bool,
        /// Delete the archive too (the record is all that remains)
        #[clap(long)]
        cleanup_archive: bool,
        /// Also write the run record to this file, for failed runs as well
        #[clap(long)]
        record: Option<PathBuf>,
        #[clap(flatten)]
        overrides: OverrideArgs,
    },
    /// Check that httrack is installed and print its version
    Check,
}

/// Per-field run-time overrides. Unset flags leave lower layers untouched.
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    #[clap(long)]
    pub depth: Option<u32>,
    #[clap(long)]
    pub external_depth: Option<u32>,
    #[clap(long, value_name = "BOOL")]
    pub stay_on_domain: Option<bool>,
    #[clap(long)]
    pub connections: Option<u32>,
    #[clap(long)]
    pub timeout_seconds: Option<u32>,
    #[clap(long)]
    pub retries: Option<u32>,
    /// Bandwidth cap in KB/s, 0 for unlimited
    #[clap(long)]
    pub max_rate_kbps: Option<u32>,
    /// Total size cap in MB, 0 for unlimited
    #[clap(long)]
    pub max_size_mb: Option<u32>,
    /// Wall-clock cap in seconds, 0 for unlimited
    #[clap(long)]
    pub max_time_seconds: Option<u32>,
    #[clap(long, value_name = "BOOL")]
    pub fetch_images: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub fetch_videos: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub fetch_audio: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub follow_robots: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub accept_cookies: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub parse_scripts: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub update_existing: Option<bool>,
    #[clap(long, value_name = "BOOL")]
    pub verbose: Option<bool>,
    #[clap(long)]
    pub user_agent: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            depth: args.depth,
            external_depth: args.external_depth,
            stay_on_domain: args.stay_on_domain,
            connections: args.connections,
            timeout_seconds: args.timeout_seconds,
            retries: args.retries,
            max_rate_kbps: args.max_rate_kbps,
            max_size_mb: args.max_size_mb,
            max_time_seconds: args.max_time_seconds,
            fetch_images: args.fetch_images,
            fetch_videos: args.fetch_videos,
            fetch_audio: args.fetch_audio,
            follow_robots: args.follow_robots,
            accept_cookies: args.accept_cookies,
            parse_scripts: args.parse_scripts,
            update_existing: args.update_existing,
            verbose: args.verbose,
            user_agent: args.user_agent,
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Check => {
            let mirrorer = HttrackMirrorer::from_env();
            let version = mirrorer.probe().await?;
            println!("{version}");
            Ok(())
        }
        Commands::Mirror {
            url,
            output,
            output_base,
            config,
            save_config: save_path,
            cleanup,
            cleanup_archive,
            record,
            overrides,
        } => {
            let persisted = match config {
                Some(path) => load_config(path)?,
                None => ConfigOverrides::default(),
            };
            let request = MirrorRequest {
                url,
                output_name: output,
                output_base,
                persisted,
                overrides: overrides.into(),
                cleanup: CleanupPolicy {
                    remove_source: cleanup,
                    remove_archive: cleanup_archive,
                },
            };

            tracing::info!(command = "mirror", url = %request.url, "Starting mirror run");
            let mirrorer = HttrackMirrorer::from_env();
            let archiver = ZipArchiver;
            let mut pipeline = Pipeline::new(&mirrorer, &archiver);
            let outcome = pipeline.run(&request).await;

            // Only persist once httrack is known to be installed.
            if let (Some(path), Some(_), Some(job)) =
                (&save_path, pipeline.tool_version(), pipeline.job())
            {
                match save_config(path, &job.config) {
                    Ok(()) => {}
                    Err(e) if outcome.is_ok() => return Err(e),
                    Err(e) => tracing::error!(error = %e, "Could not save configuration"),
                }
            }

            match outcome {
                Ok(run_record) => {
                    if let Some(path) = &record {
                        run_record.write_to(path)?;
                    }
                    println!("{}", run_record.to_json()?);
                    Ok(())
                }
                Err(e) => {
                    if let Some(path) = &record {
                        let failed = pipeline.failure_record(&request, &e);
                        if let Err(write_err) = failed.write_to(path) {
                            tracing::error!(error = %write_err, "Could not write failure record");
                        }
                    }
                    eprintln!("[ERROR] Mirror failed: {}", e);
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
