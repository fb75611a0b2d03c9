// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Field Orchestrator CLI
//!
//! The `fieldctl` binary starts and stops a multi-host field of containers.
//!
//! ## Commands
//!
//! - `fieldctl start|stop [PLANFILE]` - Drive the whole field from this host
//! - `fieldctl host start|stop PLANFILE` - Drive this host's share only (run by peers over ssh)
//! - `fieldctl config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use field_core::domain::field_config::FieldConfig;
use field_core::domain::remote::{HostKeyPolicy, RemoteOptions};
use field_orchestrator::commands::{self, ConfigCommand, HostCommand, StartArgs, StopArgs};

/// Field orchestrator - provision and tear down container fields
#[derive(Parser)]
#[command(name = "fieldctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Remote user name
    #[arg(long, global = true)]
    user: Option<String>,

    /// Remote ssh port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Remote password (uses sshpass)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Unknown host key policy (reject, warning, autoadd)
    #[arg(long, global = true, default_value = "reject")]
    policy: HostKeyPolicy,

    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FIELD_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "FIELD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the field described by a plan
    Start(StartArgs),

    /// Stop the active field
    Stop(StopArgs),

    /// This host's share of a field
    #[command(name = "host")]
    Host {
        #[command(subcommand)]
        command: HostCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(&cli.log_level)?;

    let remote = RemoteOptions {
        user: cli.user,
        port: cli.port,
        password: cli.password,
        policy: cli.policy,
    };

    match cli.command {
        Some(Commands::Start(args)) => {
            let config = load_config(cli.config)?;
            commands::field::start(args, &config, remote).await
        }
        Some(Commands::Stop(args)) => {
            let config = load_config(cli.config)?;
            commands::field::stop(args, &config, remote).await
        }
        Some(Commands::Host { command }) => {
            let config = load_config(cli.config)?;
            commands::host::handle_command(command, &config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<FieldConfig> {
    FieldConfig::load_or_default(path).context("Failed to load configuration")
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
