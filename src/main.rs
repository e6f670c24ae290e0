// SPDX-License-Identifier: AGPL-3.0-or-later
//! passbolt-setup: guided installer for Passbolt CE
//!
//! Runs the interactive menu by default, or a single workflow when a
//! subcommand is given.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use passbolt_setup::{
    environment::{self, DeploymentMode, Environment},
    packages,
    prompt::{Prompter, TerminalPrompter},
    report::Reporter,
    runner::SystemRunner,
    Config, Installer, SetupError,
};

/// passbolt-setup: install Passbolt CE with native packages or Docker
///
/// Detects the host distribution, installs prerequisites, verifies the
/// downloaded artifacts and registers the first administrator.
#[derive(Parser, Debug)]
#[command(name = "passbolt-setup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "passbolt-setup.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Disable colored output
    #[arg(long)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Install with Docker Compose
    #[command(alias = "container")]
    Docker,

    /// Install from native packages (requires root)
    #[command(alias = "package")]
    Packages,

    /// Detect the host distribution
    Detect,

    /// Print the prerequisite commands without running them
    Plan {
        /// Deployment mode to plan for
        #[arg(short, long, value_enum, default_value_t = DeploymentMode::Package)]
        mode: DeploymentMode,

        /// Plan for this distribution instead of the detected one
        #[arg(long)]
        distro: Option<String>,
    },

    /// Show configuration
    Config,

    /// Initialize a new configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load_or_default(&cli.config);
    init_logging(&cli, loaded.as_ref().ok());

    let reporter = if cli.plain || !std::io::stdout().is_terminal() {
        Reporter::plain()
    } else {
        Reporter::ansi()
    };

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Version => {
            println!("passbolt-setup v{}", env!("CARGO_PKG_VERSION"));
            println!("Guided installer for Passbolt CE");
            Ok(())
        }

        Commands::Init { force } => init_config(&cli.config, force),

        Commands::Config => show_config(&cli.config),

        Commands::Detect => {
            let config = loaded.with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
            detect(&config)
        }

        Commands::Plan { mode, distro } => {
            let config = loaded.with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
            show_plan(&config, mode, distro.as_deref())
        }

        Commands::Docker => {
            let config = loaded.with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
            install(&config, &reporter, DeploymentMode::Container).await
        }

        Commands::Packages => {
            let config = loaded.with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
            install(&config, &reporter, DeploymentMode::Package).await
        }

        Commands::Menu => {
            let config = loaded.with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
            menu(&config, &reporter).await
        }
    }
}

fn init_logging(cli: &Cli, config: Option<&Config>) {
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        let level = config.map(|c| c.logging.level.as_str()).unwrap_or("warn");
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr);

    if config.is_some_and(|c| c.logging.format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Interactive menu; loops back after each installation until exit
async fn menu(config: &Config, reporter: &Reporter) -> anyhow::Result<()> {
    let mut prompter = TerminalPrompter::new();

    loop {
        reporter.heading("Passbolt setup");
        println!("  [1] Install via Docker");
        println!("  [2] Install via packages");
        println!("  [0] Exit");

        let mode = match prompter.ask("Choose an option: ")?.as_str() {
            "1" => DeploymentMode::Container,
            "2" => DeploymentMode::Package,
            "0" => {
                println!("Goodbye.");
                return Ok(());
            }
            other => {
                reporter.warn(&format!("Invalid option: '{}'", other));
                continue;
            }
        };

        if let Err(e) = attempt_install(config, reporter, mode).await {
            reporter.fail(&e.to_string());
        }
        prompter.ask("Press Enter to return to the menu...")?;
    }
}

/// Run one installation as a subcommand; a failed run exits non-zero
async fn install(config: &Config, reporter: &Reporter, mode: DeploymentMode) -> anyhow::Result<()> {
    if !attempt_install(config, reporter, mode).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one installation and report how it ended. `Ok(false)` means the
/// run failed and the failure was already reported.
async fn attempt_install(config: &Config, reporter: &Reporter, mode: DeploymentMode) -> anyhow::Result<bool> {
    if mode == DeploymentMode::Package && !environment::running_as_root() {
        anyhow::bail!("Package installation must be run as root (try sudo)");
    }

    let runner = SystemRunner::new(reporter.clone());
    let mut prompter = TerminalPrompter::new();
    let result = Installer::new(config, &runner, &mut prompter, reporter)
        .run(mode)
        .await;

    match result {
        Ok(summary) => {
            info!(mode = %summary.mode, advisories = summary.advisories.len(), "Installation finished");
            Ok(true)
        }
        Err(e) => {
            error!(mode = %mode, error = %e, "Installation aborted");
            report_failure(reporter, &e);
            Ok(false)
        }
    }
}

fn report_failure(reporter: &Reporter, err: &SetupError) {
    reporter.fail(&err.to_string());
    if let Some((stdout, stderr)) = err.captured_output() {
        if !stdout.trim().is_empty() {
            eprintln!("--- stdout ---\n{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            eprintln!("--- stderr ---\n{}", stderr.trim_end());
        }
    }
}

fn detect(config: &Config) -> anyhow::Result<()> {
    let env = environment::detect(&config.host.os_release, &config.host.legacy_release)?;
    println!("Detected distribution: {} ({:?})", env, env.package_manager());
    Ok(())
}

fn show_plan(config: &Config, mode: DeploymentMode, distro: Option<&str>) -> anyhow::Result<()> {
    let env = match distro {
        Some(raw) => Environment::from_identifier(raw).ok_or_else(|| SetupError::UnsupportedEnvironment {
            detected: raw.to_string(),
        })?,
        None => environment::detect(&config.host.os_release, &config.host.legacy_release)?,
    };

    let mut steps = packages::plan(env, mode);
    if mode == DeploymentMode::Package {
        steps.extend(packages::server_plan(env));
    }

    println!("Plan for {} ({} mode):", env, mode);
    println!();
    for (index, step) in steps.iter().enumerate() {
        println!("  {:>2}. {}", index + 1, step.description);
        println!("      $ {}", step.command_line());
    }
    Ok(())
}

/// Initialize a new configuration file
fn init_config(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let default_config = r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# passbolt-setup configuration

[artifacts]
installer_url = "https://download.passbolt.com/ce/installer/passbolt-repo-setup.ce.sh"
compose_url = "https://download.passbolt.com/ce/docker/docker-compose-ce.yaml"
checksum_url = "https://github.com/passbolt/passbolt_docker/releases/latest/download/docker-compose-ce-SHA512SUM.txt"
installer_path = "/tmp/passbolt-repo-setup.ce.sh"
compose_path = "docker-compose-ce.yaml"
checksum_path = "docker-compose-ce-SHA512SUM.txt"
installer_min_bytes = 1000

[compose]
app_service = "passbolt"
db_service = "db"
db_port = 3306

[readiness]
timeout_secs = 60
attempt_timeout_secs = 2
interval_secs = 2

[bootstrap]
# Wait after starting the stack before registering the admin (0 disables)
settle_secs = 10

[host]
os_release = "/etc/os-release"
legacy_release = "/etc/SuSE-release"

[logging]
level = "warn"
format = "text"
"#;

    std::fs::write(config_path, default_config)?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the current configuration
fn show_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("No configuration file found. Using defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&Config::default())?);
        return Ok(());
    }

    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
