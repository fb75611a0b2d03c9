// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{EndpointIpamConfig, EndpointSettings, HostConfig};
use bollard::network::{ConnectNetworkOptions, DisconnectNetworkOptions};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::container::{ContainerEngine, ContainerSpec, NetworkAttachment};
use crate::domain::field::FieldError;

/// Time for a newly attached interface to appear inside the container.
const ATTACH_SETTLE: Duration = Duration::from_secs(1);

/// Connect to the Docker daemon on `socket_path`, or auto-detect.
pub fn connect(socket_path: Option<&str>) -> Result<Docker, FieldError> {
    if let Some(path) = socket_path {
        #[cfg(unix)]
        let result = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION);

        #[cfg(windows)]
        let result = Docker::connect_with_named_pipe(path, 120, bollard::API_DEFAULT_VERSION);

        result.map_err(|e| {
            FieldError::Engine(format!(
                "Failed to connect to Docker at {}: {}\n\n\
                 Ensure Docker is running and the socket path is correct.",
                path, e
            ))
        })
    } else {
        Docker::connect_with_local_defaults().map_err(|e| {
            FieldError::Engine(format!(
                "Failed to connect to Docker: {}\n\n\
                 Common causes:\n\
                 - Docker daemon not running (check: docker ps)\n\
                 - Permission denied accessing Docker socket",
                e
            ))
        })
    }
}

/// True for a 404 from the daemon.
pub(crate) fn is_not_found(error: &DockerError) -> bool {
    matches!(
        error,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), FieldError> {
        self.docker.ping().await.map_err(|e| {
            FieldError::Engine(format!(
                "Cannot connect to Docker daemon: {}\n\nVerify with: docker ps",
                e
            ))
        })?;
        Ok(())
    }

    async fn exec(&self, container: &str, cmd: Vec<String>) -> Result<String, FieldError> {
        let exec = self
            .docker
            .create_exec(
                container,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(cmd.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| FieldError::Engine(e.to_string()))?;

        let started = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| FieldError::Engine(e.to_string()))?;

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } = started {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                        output.push_str(&String::from_utf8_lossy(&message));
                    }
                    _ => {}
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| FieldError::Engine(format!("Failed to inspect exec: {}", e)))?;

        match inspect.exit_code.unwrap_or(0) {
            0 => Ok(output),
            code => Err(FieldError::Engine(format!(
                "\"{}\" in {} exited with {}: {}",
                cmd.join(" "),
                container,
                code,
                output.trim()
            ))),
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), FieldError> {
        let mut binds = vec![spec.working_directory_bind()];
        binds.extend(spec.binds.iter().cloned());

        let host_config = HostConfig {
            binds: Some(binds),
            network_mode: Some(spec.network_mode.clone()),
            privileged: Some(true),
            cap_add: Some(vec!["ALL".to_string()]),
            ..Default::default()
        };

        let labels: HashMap<String, String> = spec
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let config = Config {
            image: Some(spec.image.clone()),
            hostname: Some(spec.name.clone()),
            tty: Some(true),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            labels: (!labels.is_empty()).then_some(labels),
            working_dir: spec.workdir.clone(),
            user: spec.user.clone(),
            cmd: spec.command.clone(),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| {
                FieldError::Engine(format!("Failed to create container {}: {}", spec.name, e))
            })?;

        self.docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| {
                FieldError::Engine(format!("Failed to start container {}: {}", spec.name, e))
            })?;

        self.docker
            .disconnect_network(
                &spec.network_mode,
                DisconnectNetworkOptions {
                    container: spec.name.clone(),
                    force: true,
                },
            )
            .await
            .map_err(|e| {
                FieldError::Engine(format!(
                    "Failed to detach {} from {}: {}",
                    spec.name, spec.network_mode, e
                ))
            })?;

        info!("Started container: {}", spec.name);
        Ok(())
    }

    async fn attach_network(
        &self,
        container: &str,
        attachment: &NetworkAttachment,
    ) -> Result<(), FieldError> {
        let options = ConnectNetworkOptions {
            container: container.to_string(),
            endpoint_config: EndpointSettings {
                ipam_config: Some(EndpointIpamConfig {
                    ipv4_address: Some(attachment.ipv4.to_string()),
                    ipv6_address: attachment.ipv6.map(|a| a.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };

        self.docker
            .connect_network(&attachment.network, options)
            .await
            .map_err(|e| {
                FieldError::Engine(format!(
                    "Failed to connect {} to {}: {}",
                    container, attachment.network, e
                ))
            })
    }

    async fn disable_offload(&self, container: &str, interface: &str) -> Result<(), FieldError> {
        tokio::time::sleep(ATTACH_SETTLE).await;
        let cmd = ["ethtool", "-K", interface, "tx", "off"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.exec(container, cmd).await?;
        debug!(container, interface, output = %output.trim(), "Disabled tx offload");
        Ok(())
    }

    async fn remove(&self, container: &str) -> Result<(), FieldError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(container, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!(container, "Container already absent");
                Ok(())
            }
            Err(e) => Err(FieldError::Engine(format!(
                "Failed to remove container {}: {}",
                container, e
            ))),
        }
    }
}
