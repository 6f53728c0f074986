/// `load_config` module: reads and writes the persisted configuration layer.
///
/// A persisted layer is a sparse [`ConfigOverrides`] record stored as YAML or
/// JSON (JSON is read through the YAML parser, writing picks the format from
/// the file extension). It sits between the built-in defaults and the
/// run-time flags, see [`MirrorConfig::resolve`].
///
/// # Errors
/// Everything here returns `anyhow::Error` with the offending path in the
/// message; these errors surface at the CLI boundary.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::{ConfigOverrides, MirrorConfig};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConfigOverrides> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(ConfigOverrides::default());
    }

    let overrides: ConfigOverrides = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config");
            return Err(anyhow::anyhow!(
                "Failed to parse config {:?} as YAML/JSON: {e}",
                path_ref
            ));
        }
    };

    Ok(overrides)
}

/// Persist a resolved configuration so later runs start from it.
pub fn save_config<P: AsRef<Path>>(path: P, config: &MirrorConfig) -> Result<()> {
    let path_ref = path.as_ref();
    let layer = ConfigOverrides::from(config);
    let is_json = path_ref
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let body = if is_json {
        serde_json::to_string_pretty(&layer).context("Failed to serialize config as JSON")?
    } else {
        serde_yaml::to_string(&layer).context("Failed to serialize config as YAML")?
    };

    if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    fs::write(path_ref, body).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to write config file");
        anyhow::anyhow!("Failed to write config file {:?}: {}", path_ref, e)
    })?;
    info!(config_path = ?path_ref, "Configuration saved");
    Ok(())
}
