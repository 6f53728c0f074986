//! Translation of a [`MirrorConfig`] into an `httrack` argument vector.
//!
//! The order of the emitted flags is fixed so that logged commands are
//! reproducible and comparable between runs.

use std::path::Path;

use crate::config::MirrorConfig;

pub const HTTRACK_PROGRAM: &str = "httrack";

const IMAGE_EXCLUSION: &[&str] = &["-*", "+*.html", "+*.css", "+*.js"];
const VIDEO_EXCLUSION: &[&str] = &["-*.mp4", "-*.avi", "-*.mov", "-*.wmv", "-*.flv", "-*.webm"];
const AUDIO_EXCLUSION: &[&str] = &["-*.mp3", "-*.wav", "-*.ogg", "-*.m4a"];

/// Keep original structure, keep relative links, write error pages, extended parsing.
const STRUCTURE_FLAGS: &[&str] = &["-N0", "-K0", "-o", "-%P"];
const NON_INTERACTIVE_FLAG: &str = "-q";

/// Prefix `https://` when the URL carries no http(s) scheme.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

pub fn build_args(url: &str, output_dir: &Path, config: &MirrorConfig) -> Vec<String> {
    let mut args = vec![
        HTTRACK_PROGRAM.to_string(),
        normalize_url(url),
        "-O".to_string(),
        output_dir.to_string_lossy().into_owned(),
        format!("-r{}", config.depth),
        format!("%e{}", config.external_depth),
    ];

    if config.stay_on_domain {
        args.push("-a".to_string());
        args.push("-D".to_string());
    }

    args.push(format!("-c{}", config.connections));
    args.push(format!("-T{}", config.timeout_seconds));
    args.push(format!("-R{}", config.retries));

    // httrack expects bytes; the config speaks KB/s and MB.
    if config.max_rate_kbps > 0 {
        args.push(format!("-A{}", u64::from(config.max_rate_kbps) * 1_000));
    }
    if config.max_size_mb > 0 {
        args.push(format!("-M{}", u64::from(config.max_size_mb) * 1_000_000));
    }
    if config.max_time_seconds > 0 {
        args.push(format!("-E{}", config.max_time_seconds));
    }

    let exclusions = [
        (config.fetch_images, IMAGE_EXCLUSION),
        (config.fetch_videos, VIDEO_EXCLUSION),
        (config.fetch_audio, AUDIO_EXCLUSION),
    ];
    for (wanted, patterns) in exclusions {
        if !wanted {
            args.extend(patterns.iter().map(|p| p.to_string()));
        }
    }

    args.push(if config.follow_robots { "-s2" } else { "-s0" }.to_string());
    args.push(if config.accept_cookies { "-b1" } else { "-b0" }.to_string());

    if config.parse_scripts {
        args.push("-j".to_string());
    }
    if config.update_existing {
        args.push("-i".to_string());
    }
    if config.verbose {
        args.push("-v".to_string());
    }

    args.push(format!("-F{}", config.user_agent));
    args.extend(STRUCTURE_FLAGS.iter().map(|f| f.to_string()));
    args.push(NON_INTERACTIVE_FLAG.to_string());

    args
}

/// Shell-ish rendering for logs and job metadata.
pub fn render_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn out() -> PathBuf {
        PathBuf::from("scraped_websites/example.com_20240101_120000")
    }

    #[test]
    fn default_config_emits_fixed_sequence() {
        let args = build_args("https://example.com", &out(), &MirrorConfig::default());
        let expected: Vec<String> = [
            "httrack",
            "https://example.com",
            "-O",
            "scraped_websites/example.com_20240101_120000",
            "-r2",
            "%e0",
            "-a",
            "-D",
            "-c4",
            "-T30",
            "-R2",
            "-s2",
            "-b1",
            "-j",
            "-v",
            "-FMozilla/5.0 (compatible; HTTrack)",
            "-N0",
            "-K0",
            "-o",
            "-%P",
            "-q",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn bare_host_gets_https_prefix() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com/a"), "http://example.com/a");
        assert_eq!(normalize_url("HTTPS://Example.com"), "HTTPS://Example.com");
    }

    #[test]
    fn scenario_rate_limited_without_videos() {
        let config = MirrorConfig {
            depth: 2,
            connections: 4,
            max_rate_kbps: 500,
            fetch_videos: false,
            ..Default::default()
        };
        let args = build_args("example.com", &out(), &config);

        assert_eq!(args[1], "https://example.com");
        assert!(args.contains(&"-r2".to_string()));
        assert!(args.contains(&"-A500000".to_string()));
        for pattern in VIDEO_EXCLUSION {
            assert!(args.contains(&pattern.to_string()), "missing {pattern}");
        }
        assert!(!args.iter().any(|a| a.starts_with("-M") || a.starts_with("-E")));
    }

    #[test]
    fn zero_limits_emit_no_limit_flags() {
        let args = build_args("example.com", &out(), &MirrorConfig::default());
        assert!(!args.iter().any(|a| a.starts_with("-A")));
        assert!(!args.iter().any(|a| a.starts_with("-M")));
        assert!(!args.iter().any(|a| a.starts_with("-E")));
    }

    #[test]
    fn limits_and_negative_toggles_keep_their_slots() {
        let config = MirrorConfig {
            stay_on_domain: false,
            max_rate_kbps: 1,
            max_size_mb: 3,
            max_time_seconds: 90,
            fetch_images: false,
            fetch_audio: false,
            follow_robots: false,
            accept_cookies: false,
            parse_scripts: false,
            update_existing: true,
            verbose: false,
            ..Default::default()
        };
        let args = build_args("example.com", &out(), &config);
        let tail: Vec<&str> = args[6..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "-c4", "-T30", "-R2", "-A1000", "-M3000000", "-E90", "-*", "+*.html", "+*.css",
                "+*.js", "-*.mp3", "-*.wav", "-*.ogg", "-*.m4a", "-s0", "-b0", "-i",
                "-FMozilla/5.0 (compatible; HTTrack)", "-N0", "-K0", "-o", "-%P", "-q",
            ]
        );
    }

    #[test]
    fn identical_inputs_build_identical_args() {
        let config = MirrorConfig {
            max_size_mb: 10,
            ..Default::default()
        };
        assert_eq!(
            build_args("example.com", &out(), &config),
            build_args("example.com", &out(), &config)
        );
    }

    #[test]
    fn render_quotes_arguments_with_spaces() {
        let rendered = render_command(&["httrack".into(), "-FMy Agent".into()]);
        assert_eq!(rendered, "httrack \"-FMy Agent\"");
    }
}
