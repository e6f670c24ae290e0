// SPDX-License-Identifier: AGPL-3.0-or-later
//! Interactive compose configuration
//!
//! Collects the settings the stock compose file cannot guess (base URL,
//! SMTP, database credentials) and writes them into both the application
//! and the database service.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use tracing::{debug, info, warn};

use super::document::{ComposeDocument, EnvMap};
use crate::config::ComposeConfig;
use crate::error::Result;
use crate::prompt::{is_secret, Prompter};
use crate::report::Reporter;

/// A prompted environment variable
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub default: &'static str,
}

const fn field(name: &'static str, description: &'static str, default: &'static str) -> Field {
    Field {
        name,
        description,
        default,
    }
}

pub const DB_HOST: Field = field("DATASOURCES_DEFAULT_HOST", "Database host", "db");
pub const DB_NAME: Field = field("DATASOURCES_DEFAULT_DATABASE", "Database name", "passboltdb");
pub const DB_USER: Field = field("DATASOURCES_DEFAULT_USERNAME", "Database user", "passboltadmin");
pub const DB_PASSWORD: Field = field("DATASOURCES_DEFAULT_PASSWORD", "Database password", "passworddb");
pub const DB_ROOT_PASSWORD: Field = field("MYSQL_ROOT_PASSWORD", "MySQL root password", "passboltdb");

/// Application-only settings, prompted after the database credentials
pub const APP_FIELDS: &[Field] = &[
    field(
        "APP_FULL_BASE_URL",
        "Full Passbolt URL (e.g.: https://passbolt.yourdomain.com)",
        "",
    ),
    field("EMAIL_DEFAULT_FROM", "Sender email (e.g.: passbolt@yourdomain.com)", ""),
    field("EMAIL_TRANSPORT_DEFAULT_HOST", "SMTP Host (e.g.: smtp.yourdomain.com)", ""),
    field("EMAIL_TRANSPORT_DEFAULT_PORT", "SMTP Port (e.g.: 587)", "587"),
    field(
        "EMAIL_TRANSPORT_DEFAULT_USERNAME",
        "SMTP User (leave blank if not using authentication)",
        "",
    ),
    field(
        "EMAIL_TRANSPORT_DEFAULT_PASSWORD",
        "SMTP Password (leave blank if not using authentication)",
        "",
    ),
    field(
        "EMAIL_TRANSPORT_DEFAULT_TLS",
        "SMTP TLS (true/false, leave blank for default)",
        "",
    ),
];

/// Database variable names on the db service side
pub const MYSQL_DATABASE: &str = "MYSQL_DATABASE";
pub const MYSQL_USER: &str = "MYSQL_USER";
pub const MYSQL_PASSWORD: &str = "MYSQL_PASSWORD";

/// Why a database host value was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRejection {
    Empty,
    Localhost,
    IpLiteral,
    NumericLabel,
}

impl fmt::Display for HostRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            HostRejection::Empty => "the host cannot be empty",
            HostRejection::Localhost => "localhost points at the container itself",
            HostRejection::IpLiteral => "IP addresses bypass the compose network",
            HostRejection::NumericLabel => "dotted names with digits look like IP addresses",
        };
        f.write_str(reason)
    }
}

/// Check that a database host names a compose service alias
///
/// Refuses `localhost`, any IP literal (loopback included), names with an
/// all-digit label, and dotted names containing digits.
pub fn validate_db_host(host: &str) -> std::result::Result<(), HostRejection> {
    let host = host.trim();
    let lowered = host.to_lowercase();

    if host.is_empty() {
        return Err(HostRejection::Empty);
    }
    if lowered == "localhost" || lowered.ends_with(".localhost") {
        return Err(HostRejection::Localhost);
    }
    if host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>().is_ok() {
        return Err(HostRejection::IpLiteral);
    }
    if host.split('.').any(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())) {
        return Err(HostRejection::NumericLabel);
    }
    if host.contains('.') && host.chars().any(|c| c.is_ascii_digit()) {
        return Err(HostRejection::NumericLabel);
    }
    Ok(())
}

/// Database credentials shared by both services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
}

/// Walks the operator through the compose settings
pub struct ComposeEditor<'a, P: Prompter + ?Sized> {
    prompter: &'a mut P,
    reporter: &'a Reporter,
    services: ComposeConfig,
}

impl<'a, P: Prompter + ?Sized> ComposeEditor<'a, P> {
    pub fn new(prompter: &'a mut P, reporter: &'a Reporter, services: ComposeConfig) -> Self {
        Self {
            prompter,
            reporter,
            services,
        }
    }

    /// Prompt for one field, showing the current value as the default
    fn prompt_field(&mut self, env: &EnvMap, field: &Field) -> Result<String> {
        let current = env
            .get(field.name)
            .filter(|v| !v.is_empty())
            .unwrap_or(field.default)
            .to_string();

        let answer = if is_secret(field.name, field.description) {
            let shown = if current.is_empty() { "" } else { "********" };
            self.prompter
                .ask_secret(&format!("{} [{}]: ", field.description, shown))?
        } else {
            self.prompter
                .ask(&format!("{} [{}]: ", field.description, current))?
        };

        Ok(if answer.is_empty() { current } else { answer })
    }

    /// Prompt for the database host until it names a service alias
    fn prompt_db_host(&mut self, env: &EnvMap) -> Result<String> {
        loop {
            let host = self.prompt_field(env, &DB_HOST)?;
            match validate_db_host(&host) {
                Ok(()) => return Ok(host),
                Err(reason) => {
                    warn!(host = %host, reason = %reason, "Rejected database host");
                    self.reporter.fail(&format!(
                        "ERROR: use only '{}' as the database host for Docker Compose to work ({})",
                        self.services.db_service, reason
                    ));
                }
            }
        }
    }

    /// Collect settings and apply them to a working copy of `document`
    pub fn edit(&mut self, mut document: ComposeDocument) -> Result<ComposeDocument> {
        let app = self.services.app_service.clone();
        let db = self.services.db_service.clone();

        let mut app_env = document.service_env(&app)?;
        let mut db_env = document.service_env(&db)?;

        self.reporter
            .heading("Interactive configuration of essential Passbolt Docker variables:");
        self.reporter.warn(&format!(
            "IMPORTANT: for the database host ALWAYS use '{}', the name of the database service in Docker Compose. Do NOT use an IP, localhost, or 127.0.0.1!",
            db
        ));

        let settings = DatabaseSettings {
            host: self.prompt_db_host(&app_env)?,
            name: self.prompt_field(&app_env, &DB_NAME)?,
            user: self.prompt_field(&app_env, &DB_USER)?,
            password: self.prompt_field(&app_env, &DB_PASSWORD)?,
        };

        for field in APP_FIELDS {
            let value = self.prompt_field(&app_env, field)?;
            app_env.set(field.name, value);
        }

        app_env.set(DB_HOST.name, settings.host.clone());
        app_env.set(DB_USER.name, settings.user.clone());
        app_env.set(DB_PASSWORD.name, settings.password.clone());
        app_env.set(DB_NAME.name, settings.name.clone());

        db_env.set(MYSQL_DATABASE, settings.name.clone());
        db_env.set(MYSQL_USER, settings.user.clone());
        db_env.set(MYSQL_PASSWORD, settings.password.clone());
        let root_password = self.prompt_field(&db_env, &DB_ROOT_PASSWORD)?;
        db_env.set(DB_ROOT_PASSWORD.name, root_password);

        document.set_service_env(&app, &app_env)?;
        document.set_service_env(&db, &db_env)?;

        debug!(
            app_vars = app_env.len(),
            db_vars = db_env.len(),
            "Compose environment updated"
        );
        Ok(document)
    }
}

/// Load, edit interactively and atomically rewrite a compose file
pub fn configure_compose_file<P: Prompter + ?Sized>(
    path: &Path,
    prompter: &mut P,
    reporter: &Reporter,
    services: &ComposeConfig,
) -> Result<ComposeDocument> {
    let document = ComposeDocument::load(path)?;
    let edited = ComposeEditor::new(prompter, reporter, services.clone()).edit(document)?;
    edited.save(path)?;

    info!(path = %path.display(), "Compose file configured");
    reporter.success(&format!("File {} updated successfully!", path.display()));
    Ok(edited)
}
