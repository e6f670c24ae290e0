// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host environment detection
//!
//! Maps `/etc/os-release` onto the closed set of distributions the
//! installer knows how to drive. Anything else is a hard error; there is
//! no default guess.

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, SetupError};

/// Supported host distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Debian,
    Ubuntu,
    Rocky,
    AlmaLinux,
    OpenSuse,
}

/// Package manager dialect spoken by an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Apt,
    Dnf,
    Zypper,
}

/// Installation path chosen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DeploymentMode {
    /// Docker Compose stack
    Container,
    /// Native OS packages
    Package,
}

impl Environment {
    pub const ALL: [Environment; 5] = [
        Environment::Debian,
        Environment::Ubuntu,
        Environment::Rocky,
        Environment::AlmaLinux,
        Environment::OpenSuse,
    ];

    /// Canonical identifier, as found in `ID=`
    pub fn identifier(self) -> &'static str {
        match self {
            Environment::Debian => "debian",
            Environment::Ubuntu => "ubuntu",
            Environment::Rocky => "rocky",
            Environment::AlmaLinux => "almalinux",
            Environment::OpenSuse => "opensuse",
        }
    }

    pub fn package_manager(self) -> PackageManager {
        match self {
            Environment::Debian | Environment::Ubuntu => PackageManager::Apt,
            Environment::Rocky | Environment::AlmaLinux => PackageManager::Dnf,
            Environment::OpenSuse => PackageManager::Zypper,
        }
    }

    /// Resolve a raw `ID` value, collapsing family spellings
    ///
    /// openSUSE ships several IDs (`opensuse-leap`, `opensuse-tumbleweed`);
    /// all of them map to [`Environment::OpenSuse`].
    pub fn from_identifier(raw: &str) -> Option<Self> {
        let id = raw.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();

        if id.contains("opensuse") {
            return Some(Environment::OpenSuse);
        }

        Environment::ALL
            .into_iter()
            .find(|env| env.identifier() == id)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Container => f.write_str("container"),
            DeploymentMode::Package => f.write_str("package"),
        }
    }
}

/// Extract the `ID` field from os-release contents
pub fn parse_os_release_id(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ID=")?;
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        Some(value.to_lowercase())
    })
}

/// Detect the host environment
///
/// # Arguments
///
/// * `os_release` - Path to the os-release file (normally `/etc/os-release`)
/// * `legacy_release` - Legacy marker whose mere presence implies openSUSE
///
/// # Returns
///
/// The detected environment or `UnsupportedEnvironment`
pub fn detect<P: AsRef<Path>, Q: AsRef<Path>>(os_release: P, legacy_release: Q) -> Result<Environment> {
    let os_release = os_release.as_ref();
    let legacy_release = legacy_release.as_ref();

    let mut detected = if os_release.exists() {
        let contents = std::fs::read_to_string(os_release)?;
        parse_os_release_id(&contents)
    } else {
        debug!(path = %os_release.display(), "os-release not found");
        None
    };

    if detected.is_none() && legacy_release.exists() {
        debug!(path = %legacy_release.display(), "Legacy release file present");
        detected = Some(Environment::OpenSuse.identifier().to_string());
    }

    let raw = detected.unwrap_or_else(|| "none".to_string());
    match Environment::from_identifier(&raw) {
        Some(env) => {
            info!(environment = %env, raw = %raw, "Detected environment");
            Ok(env)
        }
        None => Err(SetupError::UnsupportedEnvironment { detected: raw }),
    }
}

/// Whether the process runs with an effective uid of 0
pub fn running_as_root() -> bool {
    rustix::process::geteuid().is_root()
}
