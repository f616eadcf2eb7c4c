//! Application configuration: settings, credentials, OS profiles, devices.
//!
//! Everything is read from a single TOML file. See `netbackup.example.toml`
//! in the repository root for the full layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::error::{ConfigError, Result};
use crate::platform::{OsProfile, ProfileRegistry};
use crate::transport::{Credential, SshSettings};

/// Default number of simultaneous connection setups.
pub const DEFAULT_MAX_STARTUPS: usize = 100;

/// Per-phase time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Connecting and authenticating one credential.
    #[serde(rename = "connect_timeout", deserialize_with = "seconds")]
    pub connect: Duration,

    /// Waiting for the first prompt after login.
    #[serde(rename = "prompt_timeout", deserialize_with = "seconds")]
    pub prompt_sync: Duration,

    /// Running all paging-disable commands.
    #[serde(rename = "paging_timeout", deserialize_with = "seconds")]
    pub disable_paging: Duration,

    /// Running the show-command.
    #[serde(rename = "show_timeout", deserialize_with = "seconds")]
    pub show_command: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(60),
            prompt_sync: Duration::from_secs(30),
            disable_paging: Duration::from_secs(30),
            show_command: Duration::from_secs(120),
        }
    }
}

/// The `[defaults]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Directory receiving `<device>.cfg` files.
    pub configs_dir: PathBuf,

    /// Limit on simultaneous connection setups.
    pub max_startups: usize,

    #[serde(flatten)]
    pub timeouts: Timeouts,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            configs_dir: PathBuf::from("configs"),
            max_startups: DEFAULT_MAX_STARTUPS,
            timeouts: Timeouts::default(),
        }
    }
}

/// Application-wide settings shared by every backup session.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: Defaults,

    /// SSH transport settings.
    pub ssh: SshSettings,

    /// Credentials tried, in order, against every device.
    pub credentials: Vec<Credential>,

    /// OS profiles keyed by OS name.
    pub os_profiles: IndexMap<String, OsProfile>,
}

impl AppConfig {
    /// Build the profile registry: built-ins overlaid with configured profiles.
    pub fn profile_registry(&self) -> Result<ProfileRegistry> {
        let mut registry = ProfileRegistry::with_builtins();
        for (name, profile) in &self.os_profiles {
            let mut profile = profile.clone();
            profile.name = name.clone();
            registry.register(profile)?;
        }
        Ok(registry)
    }
}

/// One device to back up.
#[derive(Debug, Deserialize)]
pub struct DeviceTarget {
    /// Host name; also names the device in logs and the save file.
    #[serde(default)]
    pub host: Option<String>,

    /// Address to connect to instead of `host`.
    #[serde(default)]
    pub ipaddr: Option<String>,

    /// OS profile name.
    #[serde(default = "default_os_name")]
    pub os_name: String,

    /// Host-specific credential tried before the global list.
    #[serde(default)]
    pub credential: Option<Credential>,
}

impl DeviceTarget {
    /// Create a target for `host` using the given OS profile.
    pub fn new(host: impl Into<String>, os_name: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ipaddr: None,
            os_name: os_name.into(),
            credential: None,
        }
    }

    /// Connect to this address instead of the host name.
    pub fn with_ipaddr(mut self, ipaddr: impl Into<String>) -> Self {
        self.ipaddr = Some(ipaddr.into());
        self
    }

    /// Set the host-specific credential.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Device name for logs and the save file: host, else address.
    pub fn name(&self) -> &str {
        self.host
            .as_deref()
            .or(self.ipaddr.as_deref())
            .unwrap_or_default()
    }

    /// Address to connect to: address, else host.
    pub fn address(&self) -> &str {
        self.ipaddr
            .as_deref()
            .or(self.host.as_deref())
            .unwrap_or_default()
    }
}

/// A fully loaded configuration file.
#[derive(Debug)]
pub struct Config {
    pub app: AppConfig,
    pub devices: Vec<DeviceTarget>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(flatten)]
    app: AppConfig,

    #[serde(default)]
    devices: Vec<DeviceTarget>,
}

impl Config {
    /// Read and validate a TOML configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text).map_err(ConfigError::from)?;
        let config = Self {
            app: raw.app,
            devices: raw.devices,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.app.defaults.max_startups == 0 {
            return Err(invalid("defaults.max_startups must be at least 1"));
        }
        if let Some(index) = self.devices.iter().position(|d| d.name().is_empty()) {
            return Err(invalid(&format!(
                "devices[{index}] needs a host or an ipaddr"
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> crate::Error {
    ConfigError::Invalid {
        message: message.to_string(),
    }
    .into()
}

fn default_os_name() -> String {
    crate::platform::DEFAULT_PROFILE.to_string()
}

fn seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
