// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use field_core::domain::field_config::FieldConfig;

pub const SAMPLE_CONFIG: &str = include_str!("../../templates/field-config.yaml");
pub const SAMPLE_PLAN: &str = include_str!("../../templates/field-plan.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./field-config.yaml)
        #[arg(short, long, default_value = "./field-config.yaml")]
        output: PathBuf,

        /// Also write a sample two-host plan to this path
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, plan } => generate(output, plan).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = FieldConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. FIELD_CONFIG_PATH: {}",
            std::env::var("FIELD_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./field-config.yaml");
        println!("  4. ~/.field/config.yaml");
        println!("  5. /etc/field/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Field:".bold());
    println!("  Work directory: {}", config.work_directory.display());
    println!("  Lock file: {}", config.lock_file().display());
    println!("  Default plan: {}", config.default_plan_file().display());
    println!("  Hosts file: {}", config.hosts_file.display());
    println!();

    println!("{}", "Control network:".bold());
    println!("  Block: {}", config.control_network()?);
    println!();

    println!("{}", "Engine and peers:".bold());
    println!(
        "  Docker socket: {}",
        config.docker_socket.as_deref().unwrap_or("(auto-detect)")
    );
    println!("  Remote command: {}", config.remote_command);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = FieldConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, plan: Option<PathBuf>) -> Result<()> {
    std::fs::write(&output, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    if let Some(plan) = plan {
        std::fs::write(&plan, SAMPLE_PLAN)
            .with_context(|| format!("Failed to write plan to {:?}", plan))?;
        println!("{}", format!("✓ Plan generated: {}", plan.display()).green());
    }

    Ok(())
}
