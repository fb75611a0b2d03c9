// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container Launcher Application Service
//!
//! Materialises each local container's working directory, creates the
//! container with no network, then attaches its declared interfaces in
//! declaration order so that interface `i` is always `eth<i>`.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::container::{ContainerEngine, ContainerSpec, NetworkAttachment};
use crate::domain::field::FieldError;
use crate::domain::plan::Container;
use crate::domain::root_directory::RootDirectory;

/// Name of the rendered configuration file in each working directory.
pub const CONFIG_FILE_NAME: &str = "config";

#[cfg(unix)]
const INIT_SCRIPT_MODE: u32 = 0o755;

pub struct ContainerLauncher {
    engine: Arc<dyn ContainerEngine>,
}

impl ContainerLauncher {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Write every container's working directory, config and init script.
    pub fn materialize(&self, root: &RootDirectory, containers: &[Container]) -> Result<(), FieldError> {
        for container in containers {
            let dir = container.working_directory(root);

            if dir.exists() {
                return Err(FieldError::FilesystemCollision(dir));
            }
            fs::create_dir_all(&dir).map_err(|e| FieldError::io(&dir, e))?;

            let config_path = dir.join(CONFIG_FILE_NAME);
            fs::write(&config_path, container.rendered_config()?)
                .map_err(|e| FieldError::io(&config_path, e))?;

            if let Some(script) = &container.init_script {
                if !script.text.is_empty() {
                    let script_path = dir.join(&script.filename);
                    fs::write(&script_path, &script.text)
                        .map_err(|e| FieldError::io(&script_path, e))?;
                    make_executable(&script_path)?;
                }
            }
        }
        Ok(())
    }

    /// Create each container disconnected, then attach its interfaces.
    pub async fn launch(&self, root: &RootDirectory, containers: &[Container]) -> Result<(), FieldError> {
        for container in containers {
            let spec = ContainerSpec::from_container(container, root)?;

            info!(container = %spec.name, image = %spec.image, "Creating container");
            self.engine.create(&spec).await?;
            metrics::counter!("field_containers_created_total").increment(1);

            for (index, interface) in container.interfaces.iter().enumerate() {
                let attachment = NetworkAttachment {
                    network: interface.bridge.clone(),
                    interface: NetworkAttachment::interface_name(index),
                    ipv4: interface.ipv4,
                    ipv6: interface.ipv6,
                };

                info!(
                    container = %spec.name,
                    interface = %attachment.interface,
                    bridge = %attachment.network,
                    ipv4 = %attachment.ipv4,
                    "Attaching interface"
                );
                self.engine.attach_network(&spec.name, &attachment).await?;
                self.engine
                    .disable_offload(&spec.name, &attachment.interface)
                    .await?;
            }
        }
        Ok(())
    }

    /// Force-remove every container; failures are collected, not raised.
    pub async fn remove_all(&self, containers: &[Container]) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for container in containers {
            info!("Removing container: {}", container.name);
            match self.engine.remove(&container.name).await {
                Ok(()) => metrics::counter!("field_containers_removed_total").increment(1),
                Err(e) => {
                    warn!(container = %container.name, error = %e, "Failed to remove container");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), FieldError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(INIT_SCRIPT_MODE))
        .map_err(|e| FieldError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), FieldError> {
    Ok(())
}
