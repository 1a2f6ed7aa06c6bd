use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hoard_fetch::{Backoff, DEFAULT_DOWNLOAD_URL, DEFAULT_INITIATE_URL, Endpoints, HttpTimeouts};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "hoard.toml";
pub const ENV_PREFIX: &str = "HOARD_";

/// Run settings, layered: defaults, then `<dest>/hoard.toml`, then `HOARD_*`
/// variables (`__` separates nested keys, e.g. `HOARD_BACKOFF__BASE_MS`).
/// Command-line flags are applied on top by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub concurrency:  usize,
    pub max_attempts: u32,
    pub backoff:      BackoffSettings,
    pub endpoints:    EndpointSettings,
    pub timeouts:     TimeoutSettings,
    pub token:        Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub base_ms: u64,
    pub max_ms:  u64,
    pub jitter:  f64,
}

/// Seconds. `stall_secs` bounds every wait on the remote, including the gap
/// between two body chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub connect_secs: u64,
    pub request_secs: u64,
    pub stall_secs:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub initiate: String,
    pub download: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency:  4,
            max_attempts: 5,
            backoff:      BackoffSettings::default(),
            endpoints:    EndpointSettings::default(),
            timeouts:     TimeoutSettings::default(),
            token:        None,
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_ms:  30_000,
            jitter:  0.5,
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
            stall_secs:   60,
        }
    }
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            initiate: DEFAULT_INITIATE_URL.to_string(),
            download: DEFAULT_DOWNLOAD_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn load(dest: &Path) -> Result<Self, figment::Error> {
        Self::figment(dest).merge(Env::prefixed(ENV_PREFIX).split("__")).extract()
    }

    /// Defaults plus the config file, without the environment.
    pub fn figment(dest: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dest.join(CONFIG_FILE)))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(
            Duration::from_millis(self.backoff.base_ms),
            Duration::from_millis(self.backoff.max_ms),
        )
        .with_jitter(self.backoff.jitter)
    }

    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.timeouts.connect_secs),
            request: Duration::from_secs(self.timeouts.request_secs),
        }
    }

    pub fn stall_timeout(&self) -> Duration { Duration::from_secs(self.timeouts.stall_secs) }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            initiate: self.endpoints.initiate.clone(),
            download: self.endpoints.download.clone(),
        }
    }
}
