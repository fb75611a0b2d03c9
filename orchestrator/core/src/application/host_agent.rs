// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host Agent Application Service
//!
//! Drives one host's share of a field: kernel parameters, network topology,
//! container files and containers. The field controller runs it for the
//! local host; `fieldctl host start|stop` runs it on every remote peer.

use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::launcher::ContainerLauncher;
use crate::application::topology::TopologyBuilder;
use crate::domain::field::{FieldError, StartOptions};
use crate::domain::hosts_file::{self, HostsBlock};
use crate::domain::plan::PlanDocument;
use crate::domain::platform::Platform;
use crate::domain::state::FieldStateStore;

/// What a host start did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStartOutcome {
    /// The plan assigns no containers to this host.
    Skipped,
    /// Files written, nothing created.
    DryRun,
    Started { containers: usize },
}

pub struct HostAgent {
    platform: Arc<dyn Platform>,
    state: Arc<dyn FieldStateStore>,
    topology: TopologyBuilder,
    launcher: ContainerLauncher,
}

impl HostAgent {
    pub fn new(
        platform: Arc<dyn Platform>,
        state: Arc<dyn FieldStateStore>,
        topology: TopologyBuilder,
        launcher: ContainerLauncher,
    ) -> Self {
        Self {
            platform,
            state,
            topology,
            launcher,
        }
    }

    pub fn hostname(&self) -> String {
        self.platform.hostname()
    }

    pub async fn start(
        &self,
        plan: &PlanDocument,
        options: &StartOptions,
    ) -> Result<HostStartOutcome, FieldError> {
        let hostname = self.platform.hostname();
        let containers = plan.containers(&hostname);

        let Some(root) = plan.root_directory(&hostname).filter(|_| !containers.is_empty()) else {
            info!("No containers assigned to \"{}\". Skipping.", hostname);
            return Ok(HostStartOutcome::Skipped);
        };

        let root_path = root.as_path();
        if root_path.exists() {
            if options.force_root {
                info!("Force removal of \"{}\" docker root directory.", root);
                fs::remove_dir_all(root_path).map_err(|e| FieldError::io(root_path, e))?;
            } else {
                return Err(FieldError::FilesystemCollision(root_path.to_path_buf()));
            }
        }
        fs::create_dir_all(root_path).map_err(|e| FieldError::io(root_path, e))?;

        if let Some(params) = plan.kernel_parameters(&hostname).filter(|p| !p.is_empty()) {
            info!("Setting kernel parameters:");
            for (name, value) in params {
                self.platform.set_kernel_parameter(name, value).await?;
            }
        }

        if !options.dryrun {
            self.topology
                .build(plan.vxlan_tunnels(&hostname), plan.bridges(&hostname))
                .await?;

            if options.write_hosts {
                self.write_container_hosts(plan, &hostname)?;
            }
        }

        self.launcher.materialize(root, containers)?;

        if options.dryrun {
            info!("dryrun");
            return Ok(HostStartOutcome::DryRun);
        }

        self.launcher.launch(root, containers).await?;
        info!(host = %hostname, containers = containers.len(), "Host started");
        Ok(HostStartOutcome::Started {
            containers: containers.len(),
        })
    }

    /// Tear down tunnels, non-persistent bridges and containers. Every step
    /// runs; the failures are returned.
    pub async fn stop(&self, plan: &PlanDocument) -> Vec<FieldError> {
        let hostname = self.platform.hostname();

        let mut errors = self
            .topology
            .teardown(plan.vxlan_tunnels(&hostname), plan.bridges(&hostname))
            .await;
        errors.extend(self.launcher.remove_all(plan.containers(&hostname)).await);

        if errors.is_empty() {
            info!(host = %hostname, "Host stopped");
        } else {
            warn!(host = %hostname, failures = errors.len(), "Host stopped with errors");
        }
        errors
    }

    /// Add the containers' declared entries to the field's region, keeping
    /// the mappings already there.
    fn write_container_hosts(&self, plan: &PlanDocument, hostname: &str) -> Result<(), FieldError> {
        let current = self.state.load_hosts()?;
        let block = HostsBlock::parse(&current)
            .union(&HostsBlock::from_containers(plan.containers(hostname)));
        self.state.store_hosts(&hosts_file::merge(&current, &block))
    }
}
