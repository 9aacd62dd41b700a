//! Startup configuration, read once and handed to each component

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RelayError, Result};

const DEFAULT_PORT: u16 = 80;
const DEFAULT_CI_API_BASE: &str = "https://build-api.cloud.unity3d.com/";
const DEFAULT_SHARE_LINK_BASE: &str = "https://developer.cloud.unity3d.com/share/";
const DEFAULT_HOCKEYAPP_UPLOAD_URL: &str = "https://rink.hockeyapp.net/api/2/apps/upload";
const DEFAULT_CHANNELS: &str = "hockeyapp";
const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_address: String,
    pub ci: CiConfig,
    pub distribution: DistributionConfig,
    /// Optional permalink service; absence disables only the notification step
    pub notification_url: Option<String>,
    pub artifact_dir: PathBuf,
    pub timeouts: Timeouts,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CiConfig {
    pub api_base: String,
    pub api_key: String,
    pub share_link_base: String,
}

#[derive(Debug, Clone)]
pub struct DistributionConfig {
    /// Channel names in the order they were configured
    pub channels: Vec<String>,
    pub hockeyapp_api_key: Option<String>,
    pub hockeyapp_upload_url: String,
    pub release: ReleaseSettings,
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// CI detail fetch, share link creation, notification POST
    pub request: Duration,
    /// Artifact download and channel uploads
    pub transfer: Duration,
}

/// Fixed metadata sent along with every channel upload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReleaseSettings {
    pub notes: String,
    /// 0 = Textile, 1 = Markdown
    pub notes_type: u8,
    pub visible: bool,
    pub notify_testers: bool,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            notes: "Automated release triggered from a CI build.".to_string(),
            notes_type: 0,
            visible: true,
            notify_testers: false,
        }
    }
}

impl RelayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = match get("BIND_ADDRESS") {
            Some(addr) => addr,
            None => {
                let port = match get("PORT") {
                    Some(raw) => raw.parse::<u16>().map_err(|e| {
                        RelayError::ConfigError(format!("Invalid PORT '{}': {}", raw, e))
                    })?,
                    None => DEFAULT_PORT,
                };
                format!("0.0.0.0:{}", port)
            }
        };

        let api_key = get("CI_API_KEY")
            .ok_or_else(|| RelayError::ConfigError("CI_API_KEY is not set".to_string()))?;

        let channels: Vec<String> = get("DISTRIBUTION_CHANNELS")
            .unwrap_or_else(|| DEFAULT_CHANNELS.to_string())
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        let release = match get("RELEASE_CONFIG") {
            Some(path) => load_release_settings(&path)?,
            None => ReleaseSettings::default(),
        };

        let timeouts = Timeouts {
            request: Duration::from_secs(parse_secs(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            transfer: Duration::from_secs(parse_secs(
                get("TRANSFER_TIMEOUT_SECS"),
                "TRANSFER_TIMEOUT_SECS",
                DEFAULT_TRANSFER_TIMEOUT_SECS,
            )?),
        };

        Ok(Self {
            bind_address,
            ci: CiConfig {
                api_base: get("CI_API_BASE").unwrap_or_else(|| DEFAULT_CI_API_BASE.to_string()),
                api_key,
                share_link_base: get("CI_SHARE_LINK_BASE")
                    .unwrap_or_else(|| DEFAULT_SHARE_LINK_BASE.to_string()),
            },
            distribution: DistributionConfig {
                channels,
                hockeyapp_api_key: get("HOCKEYAPP_KEY"),
                hockeyapp_upload_url: get("HOCKEYAPP_UPLOAD_URL")
                    .unwrap_or_else(|| DEFAULT_HOCKEYAPP_UPLOAD_URL.to_string()),
                release,
            },
            notification_url: get("PERMALINK_API_URL"),
            artifact_dir: get("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
            timeouts,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_secs(raw: Option<String>, key: &str, default: u64) -> Result<u64> {
    match raw {
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(RelayError::ConfigError(format!("{} must be positive", key))),
            Ok(secs) => Ok(secs),
            Err(e) => Err(RelayError::ConfigError(format!(
                "Invalid {} '{}': {}",
                key, raw, e
            ))),
        },
        None => Ok(default),
    }
}

/// Load and parse the release settings file
pub fn load_release_settings(path: impl AsRef<Path>) -> Result<ReleaseSettings> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        RelayError::ConfigError(format!(
            "Failed to read release config '{}': {}",
            path.display(),
            e
        ))
    })?;

    let settings: ReleaseSettings = toml::from_str(&content)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = RelayConfig::from_lookup(lookup(&[("CI_API_KEY", "secret")])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:80");
        assert_eq!(config.ci.api_base, DEFAULT_CI_API_BASE);
        assert_eq!(config.ci.share_link_base, DEFAULT_SHARE_LINK_BASE);
        assert_eq!(config.distribution.channels, vec!["hockeyapp".to_string()]);
        assert!(config.notification_url.is_none());
        assert_eq!(config.timeouts.request, Duration::from_secs(30));
        assert_eq!(config.distribution.release, ReleaseSettings::default());
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = RelayConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap_err();
        assert!(matches!(err, RelayError::ConfigError(_)));
    }

    #[test]
    fn port_and_channels_are_parsed() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("CI_API_KEY", "secret"),
            ("PORT", "8080"),
            ("DISTRIBUTION_CHANNELS", "HockeyApp, playstore,"),
            ("PERMALINK_API_URL", "https://permalink.example/hook"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.distribution.channels, vec!["hockeyapp", "playstore"]);
        assert_eq!(
            config.notification_url.as_deref(),
            Some("https://permalink.example/hook")
        );
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[
            ("CI_API_KEY", "secret"),
            ("TRANSFER_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TRANSFER_TIMEOUT_SECS"));
    }

    #[test]
    fn release_settings_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "notes = \"Nightly\"\nnotify_testers = true").unwrap();

        let settings = load_release_settings(file.path()).unwrap();
        assert_eq!(settings.notes, "Nightly");
        assert!(settings.notify_testers);
        assert!(settings.visible);
        assert_eq!(settings.notes_type, 0);
    }
}
