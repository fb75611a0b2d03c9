// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field lifecycle commands
//!
//! Commands: start, stop

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use field_core::domain::field::{StartOptions, StopOptions};
use field_core::domain::field_config::FieldConfig;
use field_core::domain::remote::{RemoteOptions, RemoteResults};
use field_core::infrastructure::PlanParser;

use crate::embedded;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Plan file (default: <work directory>/fieldplan.yaml)
    #[arg(value_name = "PLANFILE")]
    pub plan: Option<PathBuf>,

    /// Allocate addresses and update the hosts file only
    #[arg(long)]
    pub dryrun: bool,

    /// Remove a pre-existing container root directory
    #[arg(long)]
    pub forcedockerroot: bool,

    /// Add containers' hosts entries to each host's hosts file
    #[arg(long)]
    pub writehosts: bool,
}

impl StartArgs {
    pub fn options(&self) -> StartOptions {
        StartOptions {
            dryrun: self.dryrun,
            force_root: self.forcedockerroot,
            write_hosts: self.writehosts,
        }
    }
}

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Plan file (default: the plan recorded in the lock file)
    #[arg(value_name = "PLANFILE")]
    pub plan: Option<PathBuf>,

    /// Collect test data from the field roots before stopping
    #[arg(long)]
    pub collect: bool,
}

pub async fn start(args: StartArgs, config: &FieldConfig, remote: RemoteOptions) -> Result<()> {
    let plan_path = config.resolve_plan_path(args.plan.as_deref());
    info!(plan = %plan_path.display(), "Loading plan");
    let plan = PlanParser::parse_file(&plan_path)?;

    let mut controller = embedded::field_controller(config, remote)?;
    let report = controller
        .start(&plan, &args.options())
        .await
        .context("Field start failed")?;

    println!("{} {}", "Control address:".bold(), report.control_address);
    print_remote_results(&report.remote);

    if args.dryrun {
        println!("{}", "✓ Dry run complete".green());
    } else if report.failed_hosts().is_empty() {
        println!("{}", "✓ Field started".green());
    } else {
        for error in report.remote_errors() {
            println!("{} {}", "⚠".yellow(), error);
        }
        println!(
            "{}",
            format!(
                "⚠ Field started with failures on: {}",
                report.failed_hosts().join(", ")
            )
            .yellow()
        );
    }
    Ok(())
}

pub async fn stop(args: StopArgs, config: &FieldConfig, remote: RemoteOptions) -> Result<()> {
    let plan = match &args.plan {
        Some(path) => Some(PlanParser::parse_file(
            config.resolve_plan_path(Some(path.as_path())),
        )?),
        None => None,
    };

    let mut controller = embedded::field_controller(config, remote)?;
    let report = controller
        .stop(plan.as_ref(), &StopOptions { collect: args.collect })
        .await
        .context("Field stop failed")?;

    if let Some(dir) = &report.collected_into {
        println!("{} {}", "Collected into:".bold(), dir.display());
    }
    print_remote_results(&report.remote);

    for error in report.remote_errors() {
        println!("{} {}", "⚠".yellow(), error);
    }
    for error in &report.teardown_errors {
        println!("{} {}", "⚠".yellow(), error);
    }
    println!("{}", "✓ Field stopped".green());
    Ok(())
}

pub(crate) fn print_remote_results(results: &RemoteResults) {
    if results.is_empty() {
        return;
    }
    println!("{}", "Remote hosts:".bold());
    for (host, result) in results {
        let line = format!("  {:<20} {}", host, result);
        if result.is_success() {
            println!("{}", line);
        } else {
            println!("{}", line.red());
        }
    }
}
