// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for passbolt-setup

use thiserror::Error;

/// Result type alias for setup operations
pub type Result<T> = std::result::Result<T, SetupError>;

/// Errors that abort the current installation run
#[derive(Error, Debug)]
pub enum SetupError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration values
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Host OS family is not one of the supported environments
    #[error("Distribution '{detected}' not supported")]
    UnsupportedEnvironment { detected: String },

    /// External command exited with a non-zero status
    #[error("{description} failed ({}): {stderr}", status_label(.status))]
    CommandFailed {
        description: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// External command could not be started at all
    #[error("Failed to start '{program}': {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote artifact could not be downloaded (retrying may help)
    #[error("Download of {url} failed: {message}")]
    DownloadFailed { url: String, message: String },

    /// Downloaded artifact does not match its published checksum
    #[error("Integrity check failed for {artifact}: {detail}")]
    IntegrityCheckFailed { artifact: String, detail: String },

    /// Compose document could not be parsed or lacks required structure
    #[error("Invalid compose document '{path}': {message}")]
    InvalidDocument { path: String, message: String },

    /// Required tool still unavailable after installation
    #[error("Required tool not available: {tool}")]
    MissingTool { tool: String },

    /// Operator input stream closed while a value was required
    #[error("Input closed while waiting for: {prompt}")]
    InputClosed { prompt: String },

    /// Operator declined a required step
    #[error("{what} cancelled by operator")]
    Declined { what: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl SetupError {
    /// Captured stdout/stderr for diagnostics, if this error carries any
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            SetupError::CommandFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message_includes_status_and_stderr() {
        let err = SetupError::CommandFailed {
            description: "Updating repositories".to_string(),
            status: Some(100),
            stdout: String::new(),
            stderr: "E: Could not get lock".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Updating repositories"));
        assert!(message.contains("exit 100"));
        assert!(message.contains("E: Could not get lock"));
    }

    #[test]
    fn test_signal_termination_label() {
        let err = SetupError::CommandFailed {
            description: "x".to_string(),
            status: None,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(err.captured_output(), Some(("out", "err")));
    }

    #[test]
    fn test_unsupported_environment_names_detected_value() {
        let err = SetupError::UnsupportedEnvironment {
            detected: "arch".to_string(),
        };
        assert_eq!(err.to_string(), "Distribution 'arch' not supported");
    }
}
