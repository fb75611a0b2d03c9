// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process service wiring
//!
//! Builds the host agent and field controller on top of the Docker daemon,
//! the `ip` command, `sysctl` and the system ssh client.

use anyhow::{Context, Result};
use std::sync::Arc;

use field_core::{
    application::{
        ContainerLauncher, ControllerSettings, FieldController, HostAgent, TopologyBuilder,
    },
    domain::{field_config::FieldConfig, remote::RemoteOptions, state::FieldStateStore},
    infrastructure::{
        docker, DockerEngine, FsFieldStateStore, LinuxNetworkDevices, LinuxPlatform,
        SshRemoteClient,
    },
};

fn state_store(config: &FieldConfig) -> Arc<dyn FieldStateStore> {
    Arc::new(FsFieldStateStore::new(
        &config.work_directory,
        config.lock_file_name.clone(),
        &config.hosts_file,
    ))
}

/// Per-host agent for this machine.
pub fn host_agent(config: &FieldConfig) -> Result<HostAgent> {
    let docker = docker::connect(config.docker_socket.as_deref())
        .context("Failed to initialize container engine")?;
    let platform = LinuxPlatform::new().context("Failed to identify this host")?;

    Ok(HostAgent::new(
        Arc::new(platform),
        state_store(config),
        TopologyBuilder::new(Arc::new(LinuxNetworkDevices::new(docker.clone()))),
        ContainerLauncher::new(Arc::new(DockerEngine::new(docker))),
    ))
}

/// Field controller for the configured work directory.
pub fn field_controller(config: &FieldConfig, remote: RemoteOptions) -> Result<FieldController> {
    let settings = ControllerSettings {
        work_directory: config.work_directory.clone(),
        control_network: config.control_network()?,
        remote_command: config.remote_command.clone(),
    };

    Ok(FieldController::new(
        settings,
        state_store(config),
        Arc::new(SshRemoteClient::new(remote)),
        host_agent(config)?,
    ))
}
