// SPDX-License-Identifier: AGPL-3.0-or-later
//! First administrator registration
//!
//! Runs Passbolt's `register_user` inside the application container and
//! pulls the setup link out of its output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::error::Result;
use crate::runner::{CommandExecutor, Invocation};

const CAKE_BIN: &str = "/usr/share/php/passbolt/bin/cake";
const WEB_USER: &str = "www-data";

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid URL pattern"));

/// Pulls a structured value out of free-form command output
pub trait LinkExtractor {
    fn extract(&self, text: &str) -> Option<String>;
}

/// Finds the first http(s) URL in a block of text
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlExtractor;

impl LinkExtractor for UrlExtractor {
    fn extract(&self, text: &str) -> Option<String> {
        extract_url(text).map(str::to_string)
    }
}

/// First `https?://` run of non-whitespace, minus trailing sentence punctuation
pub fn extract_url(text: &str) -> Option<&str> {
    let found = URL_PATTERN.find(text)?.as_str();
    let trimmed = found.trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | ')' | '"' | '\''));
    Some(trimmed)
}

/// How the compose CLI is invoked on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    /// Legacy `docker-compose` binary
    Standalone,
    /// `docker compose` plugin
    Plugin,
}

impl ComposeCommand {
    /// Build an invocation of the compose CLI with `args`
    pub fn invocation<I, S>(self, description: impl Into<String>, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = args.into_iter().map(Into::into);
        match self {
            ComposeCommand::Standalone => Invocation::new(description, "docker-compose", args),
            ComposeCommand::Plugin => Invocation::new(
                description,
                "docker",
                std::iter::once("compose".to_string()).chain(args),
            ),
        }
    }
}

/// A service inside a compose project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub compose: ComposeCommand,
    pub file: PathBuf,
    pub service: String,
}

impl ServiceHandle {
    pub fn new(compose: ComposeCommand, file: impl AsRef<Path>, service: impl Into<String>) -> Self {
        Self {
            compose,
            file: file.as_ref().to_path_buf(),
            service: service.into(),
        }
    }

    /// `up -d` for the whole project
    pub fn up(&self) -> Invocation {
        self.compose.invocation(
            "Starting Docker containers",
            ["-f".to_string(), self.file.display().to_string(), "up".to_string(), "-d".to_string()],
        )
    }

    /// Run `argv` inside this service without a TTY, output captured
    pub fn exec<I, S>(&self, description: impl Into<String>, argv: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let head = [
            "-f".to_string(),
            self.file.display().to_string(),
            "exec".to_string(),
            "-T".to_string(),
            self.service.clone(),
        ];
        self.compose
            .invocation(description, head.into_iter().chain(argv.into_iter().map(Into::into)))
            .captured()
    }
}

/// The administrator to register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Output of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapResult {
    pub output: String,
    pub link: Option<String>,
}

/// Quote a value for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// The `su -c` payload that registers an admin
pub fn register_user_command(account: &AdminAccount) -> String {
    format!(
        "{} passbolt register_user -u {} -f {} -l {} -r admin",
        CAKE_BIN,
        shell_quote(&account.email),
        shell_quote(&account.first_name),
        shell_quote(&account.last_name)
    )
}

/// Registers the first administrator in a running stack
pub struct BootstrapExecutor<'a, E: CommandExecutor + ?Sized, X: LinkExtractor = UrlExtractor> {
    runner: &'a E,
    extractor: X,
    settle: Duration,
}

impl<'a, E: CommandExecutor + ?Sized> BootstrapExecutor<'a, E, UrlExtractor> {
    pub fn new(runner: &'a E, settle: Duration) -> Self {
        Self {
            runner,
            extractor: UrlExtractor,
            settle,
        }
    }
}

impl<'a, E: CommandExecutor + ?Sized, X: LinkExtractor> BootstrapExecutor<'a, E, X> {
    pub fn with_extractor<Y: LinkExtractor>(self, extractor: Y) -> BootstrapExecutor<'a, E, Y> {
        BootstrapExecutor {
            runner: self.runner,
            extractor,
            settle: self.settle,
        }
    }

    /// Wait for the settle period, then register `account`
    ///
    /// The wait is a fixed delay after `up -d`, not a health check. A missing
    /// link in the output is not an error; the caller reports it.
    pub async fn create_administrator(&self, service: &ServiceHandle, account: &AdminAccount) -> Result<BootstrapResult> {
        if !self.settle.is_zero() {
            info!(seconds = self.settle.as_secs(), "Waiting for the Passbolt container to initialize");
            tokio::time::sleep(self.settle).await;
        }

        let invocation = service.exec(
            "Creating the admin user",
            [
                "su".to_string(),
                "-m".to_string(),
                "-c".to_string(),
                register_user_command(account),
                "-s".to_string(),
                "/bin/sh".to_string(),
                WEB_USER.to_string(),
            ],
        );

        let outcome = self.runner.execute(&invocation).await?;
        let output = format!("{}{}", outcome.stdout, outcome.stderr);
        let link = self.extractor.extract(&output);

        match &link {
            Some(link) => info!(link = %link, "Registration link found"),
            None => warn!("No registration link in register_user output"),
        }

        Ok(BootstrapResult { output, link })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SetupError;
    use crate::runner::Outcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedRunner {
        result: std::result::Result<String, (String, String)>,
        seen: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl CommandExecutor for CannedRunner {
        async fn execute(&self, invocation: &Invocation) -> Result<Outcome> {
            self.seen.lock().unwrap().push(invocation.clone());
            match &self.result {
                Ok(stdout) => Ok(Outcome {
                    status: 0,
                    stdout: stdout.clone(),
                    stderr: String::new(),
                }),
                Err((stdout, stderr)) => Err(SetupError::CommandFailed {
                    description: invocation.description.clone(),
                    status: Some(1),
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                }),
            }
        }
    }

    fn account() -> AdminAccount {
        AdminAccount {
            email: "admin@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "O'Neil".to_string(),
        }
    }

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("Please visit https://passbolt.example.com/setup/1234 to continue"),
            Some("https://passbolt.example.com/setup/1234")
        );
        assert_eq!(
            extract_url("Go to http://localhost/setup/start/abc."),
            Some("http://localhost/setup/start/abc")
        );
        assert_eq!(extract_url("User saved successfully."), None);
    }

    #[test]
    fn test_url_extractor_returns_first_match() {
        let text = "a https://first.example/one b https://second.example/two";
        assert_eq!(
            UrlExtractor.extract(text),
            Some("https://first.example/one".to_string())
        );
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("O'Neil"), r"'O'\''Neil'");
    }

    #[test]
    fn test_register_user_command() {
        assert_eq!(
            register_user_command(&account()),
            r"/usr/share/php/passbolt/bin/cake passbolt register_user -u 'admin@example.com' -f 'Ada' -l 'O'\''Neil' -r admin"
        );
    }

    #[test]
    fn test_compose_invocations() {
        let plugin = ServiceHandle::new(ComposeCommand::Plugin, "docker-compose-ce.yaml", "passbolt");
        assert_eq!(
            plugin.up().command_line(),
            "docker compose -f docker-compose-ce.yaml up -d"
        );

        let standalone = ServiceHandle::new(ComposeCommand::Standalone, "stack.yaml", "passbolt");
        let exec = standalone.exec("Listing", ["ls"]);
        assert_eq!(exec.command_line(), "docker-compose -f stack.yaml exec -T passbolt ls");
        assert!(exec.capture);
    }

    #[tokio::test]
    async fn test_create_administrator_extracts_link() {
        let runner = CannedRunner {
            result: Ok("User saved successfully.\nPlease visit https://passbolt.example.com/setup/1234 to continue\n".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let service = ServiceHandle::new(ComposeCommand::Plugin, "docker-compose-ce.yaml", "passbolt");

        let result = BootstrapExecutor::new(&runner, Duration::ZERO)
            .create_administrator(&service, &account())
            .await
            .unwrap();

        assert_eq!(result.link.as_deref(), Some("https://passbolt.example.com/setup/1234"));

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let args = &seen[0].args;
        assert_eq!(&args[..6], ["compose", "-f", "docker-compose-ce.yaml", "exec", "-T", "passbolt"]);
        assert_eq!(args.last().unwrap(), "www-data");
        assert!(seen[0].capture);
    }

    #[tokio::test]
    async fn test_create_administrator_without_link() {
        let runner = CannedRunner {
            result: Ok("Something unexpected happened\n".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let service = ServiceHandle::new(ComposeCommand::Plugin, "docker-compose-ce.yaml", "passbolt");

        let result = BootstrapExecutor::new(&runner, Duration::ZERO)
            .create_administrator(&service, &account())
            .await
            .unwrap();
        assert_eq!(result.link, None);
        assert!(result.output.contains("unexpected"));
    }

    #[tokio::test]
    async fn test_create_administrator_failure_keeps_both_streams() {
        let runner = CannedRunner {
            result: Err(("partial stdout".to_string(), "Error: user exists".to_string())),
            seen: Mutex::new(Vec::new()),
        };
        let service = ServiceHandle::new(ComposeCommand::Plugin, "docker-compose-ce.yaml", "passbolt");

        let err = BootstrapExecutor::new(&runner, Duration::ZERO)
            .create_administrator(&service, &account())
            .await
            .unwrap_err();
        assert_eq!(err.captured_output(), Some(("partial stdout", "Error: user exists")));
    }

    #[tokio::test]
    async fn test_custom_extractor() {
        struct TokenExtractor;
        impl LinkExtractor for TokenExtractor {
            fn extract(&self, text: &str) -> Option<String> {
                text.split_whitespace().find(|w| w.starts_with("token=")).map(str::to_string)
            }
        }

        let runner = CannedRunner {
            result: Ok("done token=abc".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let service = ServiceHandle::new(ComposeCommand::Plugin, "f.yaml", "passbolt");
        let result = BootstrapExecutor::new(&runner, Duration::ZERO)
            .with_extractor(TokenExtractor)
            .create_administrator(&service, &account())
            .await
            .unwrap();
        assert_eq!(result.link.as_deref(), Some("token=abc"));
    }
}
