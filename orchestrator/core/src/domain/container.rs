// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use tracing::warn;

use crate::domain::field::FieldError;
use crate::domain::plan::Container;
use crate::domain::root_directory::RootDirectory;

/// Engine network a field container is created on. It carries no
/// interface and is dropped before the declared interfaces are attached.
pub const DETACHED_NETWORK: &str = "none";

/// Everything the engine needs to create one field container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Network the container starts on; always [`DETACHED_NETWORK`].
    pub network_mode: String,
    /// Mounted into the container at the same path.
    pub working_directory: PathBuf,
    pub env: Vec<String>,
    pub binds: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub user: Option<String>,
    pub command: Option<Vec<String>>,
}

impl ContainerSpec {
    /// Translate a plan container into an engine spec.
    ///
    /// Free-form params map as follows: `env` (`KEY=VALUE`), `volume`
    /// (`host:container[:mode]`), `label` (`key=value`), `workdir`, `user`,
    /// `command` (whitespace separated). Unknown names are ignored.
    pub fn from_container(container: &Container, root: &RootDirectory) -> Result<Self, FieldError> {
        let image = container.image().ok_or_else(|| {
            FieldError::Configuration(format!(
                "Image not defined for container \"{}\". Quitting.",
                container.name
            ))
        })?;

        let mut spec = Self {
            name: container.name.clone(),
            image: image.to_string(),
            network_mode: DETACHED_NETWORK.to_string(),
            working_directory: container.working_directory(root),
            env: Vec::new(),
            binds: Vec::new(),
            labels: BTreeMap::new(),
            workdir: None,
            user: None,
            command: None,
        };

        for param in &container.params {
            match param.name.as_str() {
                "image" => {}
                "env" => spec.env.push(param.value.clone()),
                "volume" => spec.binds.push(param.value.clone()),
                "label" => {
                    let (k, v) = param.value.split_once('=').unwrap_or((param.value.as_str(), ""));
                    spec.labels.insert(k.to_string(), v.to_string());
                }
                "workdir" => spec.workdir = Some(param.value.clone()),
                "user" => spec.user = Some(param.value.clone()),
                "command" => {
                    spec.command = Some(param.value.split_whitespace().map(str::to_string).collect())
                }
                other => warn!(
                    container = %container.name,
                    param = %other,
                    "Ignoring unsupported container parameter"
                ),
            }
        }

        Ok(spec)
    }

    /// Bind of the working directory onto itself.
    pub fn working_directory_bind(&self) -> String {
        let dir = self.working_directory.display();
        format!("{}:{}", dir, dir)
    }
}

/// One container interface attached to one bridge network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    pub network: String,
    /// Name of the interface inside the container (`eth<index>`).
    pub interface: String,
    pub ipv4: Ipv4Addr,
    pub ipv6: Option<Ipv6Addr>,
}

impl NetworkAttachment {
    pub fn interface_name(index: usize) -> String {
        format!("eth{}", index)
    }
}

/// Narrow container-engine capability used by the launcher.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Create and start the container with no network attached.
    async fn create(&self, spec: &ContainerSpec) -> Result<(), FieldError>;

    /// Attach the container's next interface to a bridge network.
    async fn attach_network(
        &self,
        container: &str,
        attachment: &NetworkAttachment,
    ) -> Result<(), FieldError>;

    /// Turn off transmit checksum/segmentation offload on an interface.
    async fn disable_offload(&self, container: &str, interface: &str) -> Result<(), FieldError>;

    /// Force-remove a container. Removing an absent container succeeds.
    async fn remove(&self, container: &str) -> Result<(), FieldError>;
}
