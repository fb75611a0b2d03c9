// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host commands
//!
//! Commands: start, stop. The field controller runs these on every peer.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use field_core::application::HostStartOutcome;
use field_core::domain::field::StartOptions;
use field_core::domain::field_config::FieldConfig;
use field_core::infrastructure::PlanParser;

use crate::embedded;

#[derive(Subcommand)]
pub enum HostCommand {
    /// Start this host's containers and network
    Start {
        /// Plan file; relative names resolve against the work directory
        #[arg(value_name = "PLANFILE")]
        plan: PathBuf,

        /// Write container files only
        #[arg(long)]
        dryrun: bool,

        /// Remove a pre-existing container root directory
        #[arg(long)]
        forcedockerroot: bool,

        /// Add containers' hosts entries to the hosts file
        #[arg(long)]
        writehosts: bool,
    },

    /// Stop this host's containers and network
    Stop {
        /// Plan or lock file; relative names resolve against the work directory
        #[arg(value_name = "PLANFILE")]
        plan: PathBuf,
    },
}

pub async fn handle_command(command: HostCommand, config: &FieldConfig) -> Result<()> {
    match command {
        HostCommand::Start {
            plan,
            dryrun,
            forcedockerroot,
            writehosts,
        } => {
            let options = StartOptions {
                dryrun,
                force_root: forcedockerroot,
                write_hosts: writehosts,
            };
            start(plan, options, config).await
        }
        HostCommand::Stop { plan } => stop(plan, config).await,
    }
}

async fn start(plan: PathBuf, options: StartOptions, config: &FieldConfig) -> Result<()> {
    let plan = PlanParser::parse_file(config.resolve_plan_path(Some(plan.as_path())))?;
    let agent = embedded::host_agent(config)?;
    info!(host = %agent.hostname(), plan = %plan.path().display(), "Starting host");

    let outcome = agent
        .start(&plan.document, &options)
        .await
        .with_context(|| format!("Host start failed on {}", agent.hostname()))?;

    match outcome {
        HostStartOutcome::Skipped => {
            println!("No containers assigned to {}", agent.hostname());
        }
        HostStartOutcome::DryRun => println!("{}", "✓ Dry run complete".green()),
        HostStartOutcome::Started { containers } => println!(
            "{}",
            format!("✓ {} started {} containers", agent.hostname(), containers).green()
        ),
    }
    Ok(())
}

async fn stop(plan: PathBuf, config: &FieldConfig) -> Result<()> {
    let plan = PlanParser::parse_file(config.resolve_plan_path(Some(plan.as_path())))?;
    let agent = embedded::host_agent(config)?;

    let errors = agent.stop(&plan.document).await;
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{} {}", "⚠".yellow(), error);
        }
        bail!("{} teardown steps failed on {}", errors.len(), agent.hostname());
    }

    println!("{}", format!("✓ {} stopped", agent.hostname()).green());
    Ok(())
}
