// SPDX-License-Identifier: AGPL-3.0-or-later
//! Package-manager plans
//!
//! Each dialect is a table of command templates grouped by phase. Plans are
//! always refresh, then upgrade, then install; the first failing step aborts
//! the rest.

use tracing::info;

use crate::environment::{DeploymentMode, Environment, PackageManager};
use crate::error::Result;
use crate::runner::{CommandExecutor, Invocation};

/// One command template
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub description: &'static str,
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl Step {
    const fn new(description: &'static str, program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            description,
            program,
            args,
        }
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.description, self.program, self.args.iter().copied())
    }
}

/// Command templates for one package-manager dialect
#[derive(Debug)]
pub struct Recipe {
    pub refresh: &'static [Step],
    pub upgrade: &'static [Step],
    pub base: &'static [Step],
    pub container: &'static [Step],
    pub server: &'static [Step],
}

const ENABLE_DOCKER: Step = Step::new("Enabling Docker service", "systemctl", &["enable", "--now", "docker"]);
const CONFIGURE_SERVER: Step = Step::new(
    "Configuring Passbolt CE server",
    "/usr/local/bin/passbolt-configure",
    &[],
);

static APT: Recipe = Recipe {
    refresh: &[Step::new("Updating repositories", "apt-get", &["update", "-y"])],
    upgrade: &[Step::new("Upgrading existing packages", "apt-get", &["upgrade", "-y"])],
    base: &[Step::new(
        "Installing basic dependencies",
        "apt-get",
        &["install", "-y", "curl", "gnupg", "apt-transport-https"],
    )],
    container: &[
        Step::new(
            "Installing Docker and Docker Compose",
            "apt-get",
            &["install", "-y", "docker.io", "docker-compose"],
        ),
        ENABLE_DOCKER,
    ],
    server: &[Step::new(
        "Installing Passbolt CE server",
        "apt-get",
        &["install", "-y", "passbolt-ce-server"],
    )],
};

static DNF: Recipe = Recipe {
    refresh: &[Step::new("Refreshing repositories", "dnf", &["makecache", "-y"])],
    upgrade: &[Step::new("Upgrading existing packages", "dnf", &["upgrade", "-y"])],
    base: &[
        Step::new("Installing EPEL repository", "dnf", &["install", "-y", "epel-release"]),
        Step::new("Installing basic dependencies", "dnf", &["install", "-y", "curl"]),
    ],
    container: &[
        Step::new("Installing dnf plugins", "dnf", &["install", "-y", "dnf-plugins-core"]),
        Step::new(
            "Adding official Docker repository",
            "dnf",
            &[
                "config-manager",
                "--add-repo",
                "https://download.docker.com/linux/centos/docker-ce.repo",
            ],
        ),
        Step::new(
            "Installing Docker and Docker Compose (plugin)",
            "dnf",
            &[
                "install",
                "-y",
                "docker-ce",
                "docker-ce-cli",
                "containerd.io",
                "docker-buildx-plugin",
                "docker-compose-plugin",
            ],
        ),
        ENABLE_DOCKER,
    ],
    server: &[
        Step::new("Installing Passbolt CE server", "dnf", &["install", "-y", "passbolt-ce-server"]),
        CONFIGURE_SERVER,
    ],
};

static ZYPPER: Recipe = Recipe {
    refresh: &[Step::new("Refreshing repositories", "zypper", &["refresh"])],
    upgrade: &[Step::new("Upgrading existing packages", "zypper", &["update", "-y"])],
    base: &[Step::new("Installing basic dependencies", "zypper", &["install", "-y", "curl"])],
    container: &[
        Step::new(
            "Installing Docker and Docker Compose",
            "zypper",
            &["install", "-y", "docker", "docker-compose"],
        ),
        ENABLE_DOCKER,
    ],
    server: &[
        Step::new("Installing Passbolt CE server", "zypper", &["install", "-y", "passbolt-ce-server"]),
        CONFIGURE_SERVER,
    ],
};

/// Command table for a dialect
pub fn recipe(manager: PackageManager) -> &'static Recipe {
    match manager {
        PackageManager::Apt => &APT,
        PackageManager::Dnf => &DNF,
        PackageManager::Zypper => &ZYPPER,
    }
}

/// Ordered prerequisite invocations for an environment and mode
pub fn plan(environment: Environment, mode: DeploymentMode) -> Vec<Invocation> {
    let recipe = recipe(environment.package_manager());
    let container: &[Step] = match mode {
        DeploymentMode::Container => recipe.container,
        DeploymentMode::Package => &[],
    };

    recipe
        .refresh
        .iter()
        .chain(recipe.upgrade)
        .chain(recipe.base)
        .chain(container)
        .map(Step::invocation)
        .collect()
}

/// Invocations that install the Passbolt server package natively
pub fn server_plan(environment: Environment) -> Vec<Invocation> {
    recipe(environment.package_manager())
        .server
        .iter()
        .map(Step::invocation)
        .collect()
}

/// Run invocations in order, stopping at the first failure
pub async fn run_all<E: CommandExecutor + ?Sized>(runner: &E, invocations: &[Invocation]) -> Result<()> {
    for invocation in invocations {
        runner.execute(invocation).await?;
    }
    Ok(())
}

/// Install the tooling required by `mode` on `environment`
pub async fn install_prerequisites<E: CommandExecutor + ?Sized>(
    runner: &E,
    environment: Environment,
    mode: DeploymentMode,
) -> Result<()> {
    let steps = plan(environment, mode);
    info!(
        environment = %environment,
        mode = %mode,
        steps = steps.len(),
        "Installing prerequisites"
    );
    run_all(runner, &steps).await
}
