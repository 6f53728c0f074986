//! Mirror configuration: defaults, override layers and validation.
//!
//! A run's configuration is resolved explicitly from three layers, lowest
//! precedence first:
//!   1. [`MirrorConfig::default`]
//!   2. a persisted [`ConfigOverrides`] record (see [`crate::load_config`])
//!   3. run-time [`ConfigOverrides`] (CLI flags)

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; HTTrack)";

/// Everything that shapes a single `httrack` run.
///
/// Limit fields use 0 for "unlimited".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    pub depth: u32,
    pub external_depth: u32,
    pub stay_on_domain: bool,
    pub connections: u32,
    pub timeout_seconds: u32,
    pub retries: u32,
    #[serde(rename = "maxRateKBps")]
    pub max_rate_kbps: u32,
    #[serde(rename = "maxSizeMB")]
    pub max_size_mb: u32,
    pub max_time_seconds: u32,
    pub fetch_images: bool,
    pub fetch_videos: bool,
    pub fetch_audio: bool,
    pub follow_robots: bool,
    pub accept_cookies: bool,
    pub parse_scripts: bool,
    /// Continue an interrupted mirror instead of starting over.
    pub update_existing: bool,
    pub verbose: bool,
    pub user_agent: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            depth: 2,
            external_depth: 0,
            stay_on_domain: true,
            connections: 4,
            timeout_seconds: 30,
            retries: 2,
            max_rate_kbps: 0,
            max_size_mb: 0,
            max_time_seconds: 0,
            fetch_images: true,
            fetch_videos: true,
            fetch_audio: true,
            follow_robots: true,
            accept_cookies: true,
            parse_scripts: true,
            update_existing: false,
            verbose: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl MirrorConfig {
    /// Resolve `defaults <- persisted <- runtime`.
    pub fn resolve(persisted: &ConfigOverrides, runtime: &ConfigOverrides) -> Self {
        let mut config = Self::default();
        persisted.apply(&mut config);
        runtime.apply(&mut config);
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connections == 0 {
            return Err(ConfigError::Invalid {
                field: "connections",
                reason: "must be positive",
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "timeoutSeconds",
                reason: "must be positive",
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "userAgent",
                reason: "must not be empty",
            });
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            depth = self.depth,
            external_depth = self.external_depth,
            stay_on_domain = self.stay_on_domain,
            connections = self.connections,
            max_time_seconds = self.max_time_seconds,
            "Resolved mirror configuration"
        );
        debug!(?self, "Resolved mirror configuration (full debug)");
    }
}

/// A sparse configuration layer. Present fields replace the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stay_on_domain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, rename = "maxRateKBps", skip_serializing_if = "Option::is_none")]
    pub max_rate_kbps: Option<u32>,
    #[serde(default, rename = "maxSizeMB", skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_videos: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_robots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_cookies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_scripts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_existing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut MirrorConfig) {
        macro_rules! layer {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = &self.$field {
                        config.$field = value.clone();
                    }
                )*
            };
        }
        layer!(
            depth,
            external_depth,
            stay_on_domain,
            connections,
            timeout_seconds,
            retries,
            max_rate_kbps,
            max_size_mb,
            max_time_seconds,
            fetch_images,
            fetch_videos,
            fetch_audio,
            follow_robots,
            accept_cookies,
            parse_scripts,
            update_existing,
            verbose,
            user_agent,
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&MirrorConfig> for ConfigOverrides {
    /// A fully populated layer, used when persisting a resolved config.
    fn from(config: &MirrorConfig) -> Self {
        Self {
            depth: Some(config.depth),
            external_depth: Some(config.external_depth),
            stay_on_domain: Some(config.stay_on_domain),
            connections: Some(config.connections),
            timeout_seconds: Some(config.timeout_seconds),
            retries: Some(config.retries),
            max_rate_kbps: Some(config.max_rate_kbps),
            max_size_mb: Some(config.max_size_mb),
            max_time_seconds: Some(config.max_time_seconds),
            fetch_images: Some(config.fetch_images),
            fetch_videos: Some(config.fetch_videos),
            fetch_audio: Some(config.fetch_audio),
            follow_robots: Some(config.follow_robots),
            accept_cookies: Some(config.accept_cookies),
            parse_scripts: Some(config.parse_scripts),
            update_existing: Some(config.update_existing),
            verbose: Some(config.verbose),
            user_agent: Some(config.user_agent.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_layer_wins_over_persisted_layer() {
        let persisted = ConfigOverrides {
            depth: Some(5),
            connections: Some(8),
            ..Default::default()
        };
        let runtime = ConfigOverrides {
            depth: Some(1),
            ..Default::default()
        };

        let config = MirrorConfig::resolve(&persisted, &runtime);

        assert_eq!(config.depth, 1);
        assert_eq!(config.connections, 8);
        assert_eq!(config.retries, 2, "untouched fields keep defaults");
    }

    #[test]
    fn validate_rejects_zero_connections() {
        let config = MirrorConfig {
            connections: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "connections",
                ..
            }
        ));
    }

    #[test]
    fn overrides_reject_unknown_fields() {
        let parsed: Result<ConfigOverrides, _> = serde_json::from_str(r#"{"deepness": 3}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn full_layer_round_trips_to_the_same_config() {
        let config = MirrorConfig {
            max_rate_kbps: 250,
            fetch_audio: false,
            ..Default::default()
        };
        let layer = ConfigOverrides::from(&config);
        assert_eq!(MirrorConfig::resolve(&layer, &ConfigOverrides::default()), config);
    }
}
