// SPDX-License-Identifier: AGPL-3.0-or-later
//! Installation workflows
//!
//! Sequences the stages for each deployment mode. Every stage is a hard
//! gate: the first error ends the run. Readiness and missing-link
//! conditions become advisories instead, shown as soon as they arise and
//! kept in the summary.

use std::path::Path;

use tracing::{info, warn};

use crate::artifacts::{compose_artifacts, installer_artifact, ArtifactFetcher};
use crate::bootstrap::{AdminAccount, BootstrapExecutor, ComposeCommand, ServiceHandle};
use crate::compose::configure_compose_file;
use crate::config::Config;
use crate::environment::{self, DeploymentMode, Environment};
use crate::error::{Result, SetupError};
use crate::packages::{install_prerequisites, run_all, server_plan};
use crate::prompt::Prompter;
use crate::readiness::{ProbeTarget, ReadinessGate};
use crate::report::{Advisory, Reporter};
use crate::runner::{CommandExecutor, Invocation};

/// What a completed run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: DeploymentMode,
    pub environment: Option<Environment>,
    pub advisories: Vec<Advisory>,
    pub registration_link: Option<String>,
}

impl RunSummary {
    fn new(mode: DeploymentMode) -> Self {
        Self {
            mode,
            environment: None,
            advisories: Vec::new(),
            registration_link: None,
        }
    }
}

/// Tooling found on the host for the container path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tooling {
    curl: bool,
    docker: bool,
    compose: Option<ComposeCommand>,
}

impl Tooling {
    fn complete(&self) -> bool {
        self.curl && self.docker && self.compose.is_some()
    }
}

/// Drives one installation run
pub struct Installer<'a, E: CommandExecutor + ?Sized, P: Prompter + ?Sized> {
    config: &'a Config,
    runner: &'a E,
    prompter: &'a mut P,
    reporter: &'a Reporter,
}

impl<'a, E: CommandExecutor + ?Sized, P: Prompter + ?Sized> Installer<'a, E, P> {
    pub fn new(config: &'a Config, runner: &'a E, prompter: &'a mut P, reporter: &'a Reporter) -> Self {
        Self {
            config,
            runner,
            prompter,
            reporter,
        }
    }

    /// Run the workflow for `mode`
    pub async fn run(&mut self, mode: DeploymentMode) -> Result<RunSummary> {
        match mode {
            DeploymentMode::Container => self.install_with_containers().await,
            DeploymentMode::Package => self.install_with_packages().await,
        }
    }

    /// Show an advisory now and keep it for the summary
    fn raise(&self, summary: &mut RunSummary, advisory: Advisory) {
        self.reporter.advisory(&advisory);
        summary.advisories.push(advisory);
    }

    fn detect_environment(&self) -> Result<Environment> {
        let env = environment::detect(&self.config.host.os_release, &self.config.host.legacy_release)?;
        self.reporter
            .success(&format!("Distribution detected: {}", env));
        Ok(env)
    }

    /// Native package installation
    pub async fn install_with_packages(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::new(DeploymentMode::Package);
        let env = self.detect_environment()?;
        summary.environment = Some(env);

        self.reporter
            .heading(&format!("Installing dependencies for {}...", env));
        install_prerequisites(self.runner, env, DeploymentMode::Package).await?;

        self.reporter.heading("Downloading Passbolt CE installer...");
        let artifact = installer_artifact(&self.config.artifacts);
        let fetched = ArtifactFetcher::new(self.runner)
            .fetch_and_verify(std::slice::from_ref(&artifact))
            .await?;
        for advisory in fetched.advisories {
            self.raise(&mut summary, advisory);
        }

        let script = artifact.destination.display().to_string();
        let setup = [
            Invocation::new("Making installer executable", "chmod", ["+x".to_string(), script.clone()]),
            Invocation::new(
                "Preparing Passbolt installer",
                "bash",
                [script, "--accept-license".to_string()],
            ),
        ];
        run_all(self.runner, &setup).await?;
        run_all(self.runner, &server_plan(env)).await?;

        info!(environment = %env, "Passbolt package installation finished");
        self.reporter.success("Passbolt installed successfully!");
        self.reporter
            .info("Open the server's address in a browser to finish the Passbolt setup.");
        Ok(summary)
    }

    async fn probe_tooling(&self) -> Tooling {
        let probe = |description: &str, program: &str, args: &[&str]| {
            Invocation::new(description.to_string(), program.to_string(), args.iter().copied()).captured()
        };

        let curl = self
            .runner
            .succeeds(&probe("Checking for curl", "curl", &["--version"]))
            .await;
        let docker = self
            .runner
            .succeeds(&probe("Checking for Docker", "docker", &["--version"]))
            .await;

        let compose = if self
            .runner
            .succeeds(&probe("Checking for docker-compose", "docker-compose", &["--version"]))
            .await
        {
            Some(ComposeCommand::Standalone)
        } else if docker
            && self
                .runner
                .succeeds(&probe("Checking for the Docker Compose plugin", "docker", &["compose", "version"]))
                .await
        {
            Some(ComposeCommand::Plugin)
        } else {
            None
        };

        Tooling { curl, docker, compose }
    }

    /// Make sure curl, docker and a compose CLI exist, installing on request
    async fn ensure_container_tooling(&mut self, env: Environment) -> Result<ComposeCommand> {
        let tooling = self.probe_tooling().await;
        if let (true, Some(compose)) = (tooling.complete(), tooling.compose) {
            return Ok(compose);
        }

        warn!(?tooling, "Container tooling incomplete");
        self.reporter
            .warn("curl, Docker or Docker Compose are not installed.");
        if !self
            .prompter
            .confirm("Do you want to install them now?")?
        {
            return Err(SetupError::Declined {
                what: "Docker installation".to_string(),
            });
        }

        install_prerequisites(self.runner, env, DeploymentMode::Container).await?;

        let tooling = self.probe_tooling().await;
        match (tooling.curl, tooling.docker, tooling.compose) {
            (false, _, _) => Err(SetupError::MissingTool { tool: "curl".to_string() }),
            (_, false, _) => Err(SetupError::MissingTool { tool: "docker".to_string() }),
            (_, _, None) => Err(SetupError::MissingTool {
                tool: "docker compose".to_string(),
            }),
            (true, true, Some(compose)) => {
                self.reporter.success("Docker installed!");
                Ok(compose)
            }
        }
    }

    fn ask_admin(&mut self) -> Result<AdminAccount> {
        self.reporter.heading("Automatic creation of Passbolt admin user:");
        Ok(AdminAccount {
            email: self.prompter.ask("Admin email: ")?,
            first_name: self.prompter.ask("First name: ")?,
            last_name: self.prompter.ask("Last name: ")?,
        })
    }

    /// Docker Compose installation
    pub async fn install_with_containers(&mut self) -> Result<RunSummary> {
        let config = self.config;
        let mut summary = RunSummary::new(DeploymentMode::Container);
        let env = self.detect_environment()?;
        summary.environment = Some(env);
        let compose = self.ensure_container_tooling(env).await?;

        self.reporter
            .heading("Installing Passbolt via Docker (official flow)...");
        let artifacts = &config.artifacts;
        let fetched = ArtifactFetcher::new(self.runner)
            .fetch_and_verify(&compose_artifacts(artifacts))
            .await?;
        for advisory in fetched.advisories {
            self.raise(&mut summary, advisory);
        }

        let compose_path: &Path = &artifacts.compose_path;
        let document = configure_compose_file(
            compose_path,
            &mut *self.prompter,
            self.reporter,
            &config.compose,
        )?;

        let service = ServiceHandle::new(compose, compose_path, &config.compose.app_service);
        self.runner.execute(&service.up()).await?;

        let target = ProbeTarget::from_compose(&document, &config.compose, config.readiness.timeout())?;
        self.reporter.step("Waiting for the database to be ready");
        if ReadinessGate::from_config(&config.readiness)
            .await_ready(&target)
            .await
        {
            self.reporter.success("Database is ready!");
        } else {
            let advisory = Advisory::ReadinessTimeout {
                host: target.host.clone(),
                port: target.port,
                waited_secs: target.timeout.as_secs(),
            };
            self.raise(&mut summary, advisory);
        }
        self.reporter.success("Passbolt via Docker started!");

        let account = self.ask_admin()?;
        let result = BootstrapExecutor::new(self.runner, config.bootstrap.settle())
            .create_administrator(&service, &account)
            .await?;

        self.reporter.info(&format!("Command output:\n{}", result.output.trim_end()));
        match result.link {
            Some(link) => {
                self.reporter.success(&format!(
                    "Access the link below to finish the admin registration in your browser:\n{}",
                    link
                ));
                summary.registration_link = Some(link);
            }
            None => self.raise(&mut summary, Advisory::BootstrapNoLinkFound),
        }

        info!(
            link = summary.registration_link.is_some(),
            advisories = summary.advisories.len(),
            "Docker installation finished"
        );
        Ok(summary)
    }
}
