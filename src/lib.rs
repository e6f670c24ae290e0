// SPDX-License-Identifier: AGPL-3.0-or-later
//! passbolt-setup: guided installer for Passbolt CE
//!
//! Installs Passbolt on a Linux host either from the distribution's
//! native packages or as a Docker Compose stack.
//!
//! # Features
//!
//! * **Environment probing:** maps `/etc/os-release` to a supported distribution
//! * **Verified artifacts:** compose bundle checked against its published SHA-512 manifest
//! * **Compose editing:** interactive, validated edit of the database and mail settings
//! * **Bootstrap:** waits for the database and registers the first administrator

pub mod artifacts;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod environment;
pub mod error;
pub mod packages;
pub mod prompt;
pub mod readiness;
pub mod report;
pub mod runner;
pub mod workflow;

pub use config::Config;
pub use error::{Result, SetupError};
pub use workflow::{Installer, RunSummary};
