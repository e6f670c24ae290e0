// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker Compose file handling
//!
//! Parses the official compose file, exposes each service's environment as
//! an ordered map, and drives the interactive edit that fills in the
//! database, URL and SMTP settings.

mod document;
mod editor;

pub use document::{ComposeDocument, EnvMap};
pub use editor::{
    configure_compose_file, validate_db_host, ComposeEditor, DatabaseSettings, Field, HostRejection,
    APP_FIELDS, DB_HOST, DB_NAME, DB_PASSWORD, DB_ROOT_PASSWORD, DB_USER,
};

/// Variable in the db service naming the probe host
pub const MYSQL_HOST: &str = "MYSQL_HOST";

/// Variable in the db service naming the probe port
pub const MYSQL_PORT: &str = "MYSQL_PORT";
