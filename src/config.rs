// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for passbolt-setup
//!
//! Every field has a default, so running without a configuration file uses
//! the official Passbolt download locations and the stock compose layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SetupError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote artifacts and where they land locally
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Compose stack layout
    #[serde(default)]
    pub compose: ComposeConfig,

    /// Database readiness polling
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Admin bootstrap settings
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Host identification files
    #[serde(default)]
    pub host: HostConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Download locations and local destinations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Repository setup script for package installs
    #[serde(default = "default_installer_url")]
    pub installer_url: String,

    /// Official compose file
    #[serde(default = "default_compose_url")]
    pub compose_url: String,

    /// SHA512 manifest published alongside the compose file
    #[serde(default = "default_checksum_url")]
    pub checksum_url: String,

    #[serde(default = "default_installer_path")]
    pub installer_path: PathBuf,

    #[serde(default = "default_compose_path")]
    pub compose_path: PathBuf,

    #[serde(default = "default_checksum_path")]
    pub checksum_path: PathBuf,

    /// Smallest installer script size accepted as a complete download
    #[serde(default = "default_installer_min_bytes")]
    pub installer_min_bytes: u64,
}

/// Service names inside the compose file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    #[serde(default = "default_app_service")]
    pub app_service: String,

    #[serde(default = "default_db_service")]
    pub db_service: String,

    /// Port probed when the db service does not declare `MYSQL_PORT`
    #[serde(default = "default_db_port")]
    pub db_port: u16,
}

/// Readiness gate timings, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_readiness_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

/// Admin bootstrap settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Fixed wait after `up -d` before registering the admin (0 disables)
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

/// Host identification files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_os_release")]
    pub os_release: PathBuf,

    /// Legacy file whose presence alone implies openSUSE
    #[serde(default = "default_legacy_release")]
    pub legacy_release: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            installer_url: default_installer_url(),
            compose_url: default_compose_url(),
            checksum_url: default_checksum_url(),
            installer_path: default_installer_path(),
            compose_path: default_compose_path(),
            checksum_path: default_checksum_path(),
            installer_min_bytes: default_installer_min_bytes(),
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            app_service: default_app_service(),
            db_service: default_db_service(),
            db_port: default_db_port(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_readiness_timeout(),
            attempt_timeout_secs: default_attempt_timeout(),
            interval_secs: default_interval(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            os_release: default_os_release(),
            legacy_release: default_legacy_release(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ReadinessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl BootstrapConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SetupError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file when it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.compose.app_service.is_empty() || self.compose.db_service.is_empty() {
            return Err(invalid("compose service names cannot be empty"));
        }

        if self.compose.app_service == self.compose.db_service {
            return Err(invalid("app_service and db_service must differ"));
        }

        if self.artifacts.compose_path.as_os_str().is_empty()
            || self.artifacts.checksum_path.as_os_str().is_empty()
            || self.artifacts.installer_path.as_os_str().is_empty()
        {
            return Err(invalid("artifact paths cannot be empty"));
        }

        if self.compose.db_port == 0 {
            return Err(invalid("db_port must be non-zero"));
        }

        if self.readiness.timeout_secs == 0 || self.readiness.attempt_timeout_secs == 0 {
            return Err(invalid("readiness timeouts must be non-zero"));
        }

        if self.readiness.interval_secs == 0 {
            return Err(invalid("readiness interval must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> SetupError {
    SetupError::InvalidConfig {
        message: message.to_string(),
    }
}

// Default value functions

fn default_installer_url() -> String {
    "https://download.passbolt.com/ce/installer/passbolt-repo-setup.ce.sh".to_string()
}

fn default_compose_url() -> String {
    "https://download.passbolt.com/ce/docker/docker-compose-ce.yaml".to_string()
}

fn default_checksum_url() -> String {
    "https://github.com/passbolt/passbolt_docker/releases/latest/download/docker-compose-ce-SHA512SUM.txt"
        .to_string()
}

fn default_installer_path() -> PathBuf {
    PathBuf::from("/tmp/passbolt-repo-setup.ce.sh")
}

fn default_compose_path() -> PathBuf {
    PathBuf::from("docker-compose-ce.yaml")
}

fn default_checksum_path() -> PathBuf {
    PathBuf::from("docker-compose-ce-SHA512SUM.txt")
}

fn default_installer_min_bytes() -> u64 {
    1000
}

fn default_app_service() -> String {
    "passbolt".to_string()
}

fn default_db_service() -> String {
    "db".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_readiness_timeout() -> u64 {
    60
}

fn default_attempt_timeout() -> u64 {
    2
}

fn default_interval() -> u64 {
    2
}

fn default_settle_secs() -> u64 {
    10
}

fn default_os_release() -> PathBuf {
    PathBuf::from("/etc/os-release")
}

fn default_legacy_release() -> PathBuf {
    PathBuf::from("/etc/SuSE-release")
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
