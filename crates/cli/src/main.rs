//! `rest-auth` - validate provider configuration and dry-run logins
//!
//! Logins run against the real identity service named in the configuration,
//! with an in-memory host standing in for the homeserver, so nothing is
//! provisioned anywhere.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rest_auth_core::{AuthOutcome, MemoryAccountHandler, RestAuthConfig, RestAuthProvider};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rest-auth", version, about = "REST auth provider tooling")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a configuration file and print the resolved policy
    CheckConfig {
        file: PathBuf,
        /// Key holding the provider block inside a larger file
        #[arg(long)]
        section: Option<String>,
    },
    /// Try a password login
    Login {
        #[command(flatten)]
        target: Target,
        /// Fully qualified user ID, e.g. @alice:example.org
        #[arg(long)]
        user: String,
        #[arg(long, env = "REST_AUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Try a third-party identifier login
    #[command(name = "login-3pid")]
    LoginThreepid {
        #[command(flatten)]
        target: Target,
        #[arg(long, default_value = "email")]
        medium: String,
        #[arg(long)]
        address: String,
        #[arg(long, env = "REST_AUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Args)]
struct Target {
    /// Provider configuration file (YAML)
    #[arg(short, long)]
    config: PathBuf,
    #[arg(long)]
    section: Option<String>,
    /// Server name used to qualify localparts in the dry run
    #[arg(long, default_value = "localhost")]
    server_name: String,
}

impl Target {
    fn provider(&self) -> Result<RestAuthProvider> {
        let config = load_config(&self.config, self.section.as_deref())?;
        let host = Arc::new(MemoryAccountHandler::new(self.server_name.clone()));
        Ok(RestAuthProvider::new(config, host))
    }
}

fn load_config(path: &Path, section: Option<&str>) -> Result<RestAuthConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let config = match section {
        Some(key) => RestAuthConfig::from_section(&raw, key),
        None => RestAuthConfig::parse(&raw),
    };
    config.with_context(|| format!("Invalid configuration in {}", path.display()))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report(outcome: &AuthOutcome) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(if outcome.is_authenticated() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::CheckConfig { file, section } => {
            let config = load_config(&file, section.as_deref())?;
            info!("Configuration in {} is valid", file.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Login { target, user, password } => {
            let outcome = target.provider()?.authenticate_password(&user, &password).await?;
            report(&outcome)
        }
        Command::LoginThreepid { target, medium, address, password } => {
            match target.provider()?.authenticate_3pid(&medium, &address, &password).await? {
                Some(outcome) => report(&outcome),
                None => {
                    println!("Medium {} is not handled by this provider", medium);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
