// SPDX-License-Identifier: AGPL-3.0-or-later
//! External command execution
//!
//! Every package-manager call, download, checksum check and compose command
//! goes through [`CommandExecutor`], so exit-status handling is the same
//! everywhere: zero is success, anything else is `CommandFailed`. Nothing is
//! retried here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{Result, SetupError};
use crate::report::Reporter;

/// Notice used as stderr when output was not captured
pub const UNCAPTURED_NOTICE: &str = "Check the output above";

/// Description of one external operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub description: String,
    /// Capture stdout/stderr instead of inheriting the terminal
    pub capture: bool,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new<I, S>(description: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            description: description.into(),
            capture: false,
            current_dir: None,
        }
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn in_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Program and arguments as one shell-like line, for display only
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.command_line())
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Turns an exit status into success or `CommandFailed`
///
/// `stderr` is kept verbatim. Without capture there is nothing to show, so
/// a generic notice is substituted.
pub fn interpret(invocation: &Invocation, status: Option<i32>, stdout: String, stderr: String) -> Result<Outcome> {
    match status {
        Some(0) => Ok(Outcome {
            status: 0,
            stdout,
            stderr,
        }),
        _ => Err(SetupError::CommandFailed {
            description: invocation.description.clone(),
            status,
            stdout,
            stderr: if invocation.capture {
                stderr
            } else {
                UNCAPTURED_NOTICE.to_string()
            },
        }),
    }
}

/// Uniform gateway to external processes
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run an invocation to completion
    async fn execute(&self, invocation: &Invocation) -> Result<Outcome>;

    /// Run an invocation as a probe, mapping any failure to `false`
    async fn succeeds(&self, invocation: &Invocation) -> bool {
        match self.execute(invocation).await {
            Ok(_) => true,
            Err(e) => {
                debug!(command = %invocation.command_line(), error = %e, "Probe failed");
                false
            }
        }
    }
}

/// Executor for real processes on the host
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    reporter: Reporter,
}

impl SystemRunner {
    pub fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl CommandExecutor for SystemRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<Outcome> {
        self.reporter.step(&invocation.description);
        info!(command = %invocation.command_line(), "Executing command");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);

        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        if invocation.capture {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
        } else {
            // passbolt-configure and friends may prompt the operator
            command.stdin(Stdio::inherit());
            command.stdout(Stdio::inherit());
            command.stderr(Stdio::inherit());
        }

        let output = command
            .output()
            .await
            .map_err(|source| SetupError::CommandSpawn {
                program: invocation.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        match interpret(invocation, output.status.code(), stdout, stderr) {
            Ok(outcome) => {
                self.reporter.success("Done!");
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    command = %invocation.command_line(),
                    status = ?output.status.code(),
                    "Command failed"
                );
                Err(e)
            }
        }
    }
}
