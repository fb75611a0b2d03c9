// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field Controller Application Service
//!
//! Owns the start/stop lifecycle of one field for one work directory. The lock
//! file is the source of truth for "a field is active": start refuses to run
//! while it exists, stop refuses to run without it and always deletes it.
//!
//! # Start
//!
//! 1. Preflight: work directory present, no lock.
//! 2. Allocate this host's control address.
//! 3. Merge the field's name mappings into the hosts file.
//! 4. Write the lock and a hosts snapshot.
//! 5. Start the local host.
//! 6. Push the plan and snapshot to the other hosts and start them.
//!
//! A dryrun stops after step 3.
//!
//! # Stop
//!
//! Optionally collects test data from the field roots, stops the other hosts,
//! stops the local host and removes the lock. Remote and teardown failures are
//! reported, never raised.

use chrono::Utc;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::host_agent::HostAgent;
use crate::domain::field::{
    FieldError, FieldState, StartOptions, StartReport, StopOptions, StopReport,
};
use crate::domain::field_hosts;
use crate::domain::hosts_file::{self, HostsBlock};
use crate::domain::network::{AddressAllocator, ControlNetwork};
use crate::domain::plan::{PlanDocument, PlanFile, LOCALHOST};
use crate::domain::remote::{merge_results, remote_errors, RemoteClient, RemoteResults};
use crate::domain::state::FieldStateStore;

/// Directory collected from every field root.
pub const COLLECT_DIRECTORY: &str = "data";

/// Controller settings derived from [`FieldConfig`](crate::domain::field_config::FieldConfig).
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Same path locally and on every peer.
    pub work_directory: PathBuf,
    pub control_network: ControlNetwork,
    /// Executable peers run for `host start|stop`.
    pub remote_command: String,
}

pub struct FieldController {
    settings: ControllerSettings,
    state_store: Arc<dyn FieldStateStore>,
    remote: Arc<dyn RemoteClient>,
    agent: HostAgent,
    state: FieldState,
}

impl FieldController {
    pub fn new(
        settings: ControllerSettings,
        state_store: Arc<dyn FieldStateStore>,
        remote: Arc<dyn RemoteClient>,
        agent: HostAgent,
    ) -> Self {
        let state = if state_store.lock_exists() {
            FieldState::Active
        } else {
            FieldState::Idle
        };
        Self {
            settings,
            state_store,
            remote,
            agent,
            state,
        }
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    pub async fn start(
        &mut self,
        plan: &PlanFile,
        options: &StartOptions,
    ) -> Result<StartReport, FieldError> {
        self.preflight_start(plan)?;

        self.state = FieldState::Starting;
        let result = self.run_start(plan, options).await;

        self.state = if self.state_store.lock_exists() {
            FieldState::Active
        } else {
            FieldState::Idle
        };
        if let Err(e) = &result {
            error!(state = %self.state, error = %e, "Field start failed");
        }
        result
    }

    fn preflight_start(&self, plan: &PlanFile) -> Result<(), FieldError> {
        if !self.state_store.work_directory_exists() {
            return Err(FieldError::Configuration(format!(
                "Work directory \"{}\" not found. Please create it before starting.",
                self.settings.work_directory.display()
            )));
        }

        if let Some(active) = self.state_store.load_lock()? {
            let hostname = self.agent.hostname();
            let root = PlanDocument::from_yaml_str(&active)
                .ok()
                .and_then(|doc| doc.root_directory(&hostname).map(|r| r.to_string()))
                .or_else(|| {
                    plan.document
                        .root_directory(&hostname)
                        .map(|r| r.to_string())
                })
                .unwrap_or_else(|| "unknown".to_string());

            return Err(FieldError::Concurrency(format!(
                "Detected an active field with root at: {}. Run \"stop\" first.",
                root
            )));
        }

        Ok(())
    }

    async fn run_start(
        &self,
        plan: &PlanFile,
        options: &StartOptions,
    ) -> Result<StartReport, FieldError> {
        let hostname = self.agent.hostname();
        let document = &plan.document;

        let allocator = AddressAllocator::new(self.settings.control_network);
        let members = allocator.members(document);
        let control = allocator.allocate(members.iter().map(|m| &m.address))?;
        let control_address = format!("{}/{}", control, allocator.block().prefix());
        info!(address = %control_address, "Allocated control address");

        let mut block = HostsBlock::new();
        for (name, address) in document.hostnames() {
            let local = name == hostname || name == LOCALHOST;
            match address {
                Some(address) => block = block.host(address, name),
                None if local => block = block.host(IpAddr::V4(control), name),
                None => debug!(host = %name, "Host declares no address"),
            }
        }
        for member in &members {
            block = block.entry(member.name.clone(), IpAddr::V4(member.address));
        }

        let current = self.state_store.load_hosts()?;
        self.state_store
            .store_hosts(&hosts_file::merge(&current, &block))?;

        if options.dryrun {
            info!("dryrun");
            return Ok(StartReport {
                control_address,
                remote: RemoteResults::new(),
            });
        }

        self.state_store.store_lock(&plan.contents)?;
        metrics::counter!("field_lock_acquired_total").increment(1);
        let snapshot = self.state_store.snapshot_hosts()?;

        self.agent.start(document, options).await?;

        let others = document.other_hosts(&hostname);
        let mut remote = RemoteResults::new();
        if !others.is_empty() {
            let remote_dir = self.remote_dir();
            remote = merge_results(
                self.remote.put(plan.path(), &remote_dir, &others).await,
                self.remote.put(&snapshot, &remote_dir, &others).await,
            );

            let command = self.host_start_command(&plan.file_name(), options);
            info!(command = %command, hosts = ?others, "Starting remote hosts");
            remote = merge_results(remote, self.remote.execute(&command, &others).await);
            log_results("start", &remote);
        }

        info!(field = %self.settings.work_directory.display(), "Field started");
        Ok(StartReport {
            control_address,
            remote,
        })
    }

    /// Stop the field. `plan` overrides the lock contents for teardown.
    pub async fn stop(
        &mut self,
        plan: Option<&PlanFile>,
        options: &StopOptions,
    ) -> Result<StopReport, FieldError> {
        let Some(lock) = self.state_store.load_lock()? else {
            return Err(FieldError::Concurrency(format!(
                "Lockfile \"{}\" not found. Quitting.",
                self.state_store.lock_path().display()
            )));
        };

        // An unreadable lock is kept for `stop PLANFILE`.
        let document = match plan {
            Some(plan) => plan.document.clone(),
            None => PlanDocument::from_yaml_str(&lock).map_err(|e| {
                FieldError::Plan(format!(
                    "Lockfile \"{}\" does not hold a readable plan ({}). \
                     Run \"stop PLANFILE\" with the plan the field was started from.",
                    self.state_store.lock_path().display(),
                    e
                ))
            })?,
        };

        self.state = FieldState::Stopping;
        let hostname = self.agent.hostname();
        let others = document.other_hosts(&hostname);
        let mut report = StopReport::default();

        if !others.is_empty() {
            if options.collect {
                report.collected_into = self.collect().await;
            }

            let remote_dir = self.remote_dir();
            let lock_path = self.state_store.lock_path();
            let lock_name = lock_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let command = format!(
                "{} host stop {}",
                self.settings.remote_command,
                Path::new(&remote_dir).join(lock_name).display()
            );
            info!(command = %command, hosts = ?others, "Stopping remote hosts");
            report.remote = merge_results(
                self.remote.put(&lock_path, &remote_dir, &others).await,
                self.remote.execute(&command, &others).await,
            );
            log_results("stop", &report.remote);
        }

        report.teardown_errors = self
            .agent
            .stop(&document)
            .await
            .iter()
            .map(ToString::to_string)
            .collect();

        self.state_store.remove_lock()?;
        metrics::counter!("field_lock_released_total").increment(1);
        self.state = FieldState::Idle;

        info!(field = %self.settings.work_directory.display(), "Field stopped");
        Ok(report)
    }

    /// Best effort: every failure is logged and swallowed.
    async fn collect(&self) -> Option<PathBuf> {
        let roots = match self.state_store.load_field_host_file() {
            Ok(Some(text)) => match field_hosts::roots(&text) {
                Ok(roots) => roots,
                Err(e) => {
                    warn!(error = %e, "Unreadable field host file, skipping collection");
                    return None;
                }
            },
            Ok(None) => {
                warn!("No field host file, skipping collection");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Cannot read field host file, skipping collection");
                return None;
            }
        };
        if roots.is_empty() {
            warn!("Field host file lists no roots, skipping collection");
            return None;
        }

        let destination = self
            .settings
            .work_directory
            .join(COLLECT_DIRECTORY)
            .join(format!("collect_on_{}", Utc::now().format("%Y-%m-%dT%H:%M:%S")));
        if let Err(e) = std::fs::create_dir_all(&destination) {
            warn!(path = %destination.display(), error = %e, "Cannot create collection directory");
            return None;
        }

        info!(hosts = ?roots, into = %destination.display(), "Collecting test data");
        let results = self
            .remote
            .collect(COLLECT_DIRECTORY, &destination, &roots)
            .await;
        log_results("collect", &results);
        Some(destination)
    }

    fn remote_dir(&self) -> String {
        self.settings.work_directory.display().to_string()
    }

    fn host_start_command(&self, plan_name: &str, options: &StartOptions) -> String {
        let mut command = format!(
            "{} host start {}",
            self.settings.remote_command,
            self.settings.work_directory.join(plan_name).display()
        );
        if options.write_hosts {
            command.push_str(" --writehosts");
        }
        if options.force_root {
            command.push_str(" --forcedockerroot");
        }
        command
    }
}

fn log_results(action: &str, results: &RemoteResults) {
    for (host, result) in results.iter().filter(|(_, r)| r.is_success()) {
        info!("[{}] {} return: {}", host, action, result);
    }
    for error in remote_errors(results) {
        warn!(action, "{}", error);
        metrics::counter!("field_remote_host_failures_total", "action" => action.to_string())
            .increment(1);
    }
}
