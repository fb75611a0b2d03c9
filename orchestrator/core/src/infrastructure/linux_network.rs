// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Linux network devices.
//!
//! Bridges are engine networks backed by a kernel bridge device so that
//! containers can be attached to them by name. Tunnels and interface
//! enslaving go through the `ip` command.

use async_trait::async_trait;
use bollard::models::{Ipam, IpamConfig};
use bollard::network::{CreateNetworkOptions, DisconnectNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use std::collections::HashMap;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::domain::field::FieldError;
use crate::domain::network::NetworkDevice;
use crate::domain::plan::{Bridge, VxlanTunnel};
use crate::infrastructure::docker::is_not_found;

const BRIDGE_NAME_OPTION: &str = "com.docker.network.bridge.name";
const BRIDGE_MTU_OPTION: &str = "com.docker.network.driver.mtu";

pub struct LinuxNetworkDevices {
    docker: Docker,
}

impl LinuxNetworkDevices {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    async fn ip(&self, args: &[&str]) -> Result<Output, FieldError> {
        Command::new("ip")
            .args(args)
            .output()
            .await
            .map_err(|e| FieldError::Network(format!("Failed to run ip {}: {}", args.join(" "), e)))
    }

    async fn ip_checked(&self, args: &[&str]) -> Result<(), FieldError> {
        let output = self.ip(args).await?;
        if !output.status.success() {
            return Err(FieldError::Network(format!(
                "ip {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn enable_multicast_snooping(&self, device: &str) -> Result<(), FieldError> {
        let path = format!("/sys/class/net/{}/bridge/multicast_snooping", device);
        tokio::fs::write(&path, "1")
            .await
            .map_err(|e| FieldError::io(path, e))
    }
}

#[async_trait]
impl NetworkDevice for LinuxNetworkDevices {
    #[instrument(skip(self, bridge), fields(bridge = %bridge.name))]
    async fn create_bridge(&self, bridge: &Bridge) -> Result<(), FieldError> {
        let mut options = HashMap::new();
        options.insert(BRIDGE_NAME_OPTION.to_string(), bridge.device().to_string());
        if let Some(mtu) = bridge.mtu {
            options.insert(BRIDGE_MTU_OPTION.to_string(), mtu.to_string());
        }

        let ipam = Ipam {
            config: bridge.subnet.as_ref().map(|subnet| {
                vec![IpamConfig {
                    subnet: Some(subnet.clone()),
                    ip_range: bridge.ip_range.clone(),
                    gateway: bridge.gateway.clone(),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        };

        self.docker
            .create_network(CreateNetworkOptions {
                name: bridge.name.clone(),
                driver: "bridge".to_string(),
                options,
                ipam,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                FieldError::Network(format!("Failed to create bridge {}: {}", bridge.name, e))
            })?;

        for interface in &bridge.add_interfaces {
            info!("Adding interface {} to bridge {}", interface, bridge.device());
            self.ip_checked(&["link", "set", "dev", interface, "master", bridge.device()])
                .await?;
        }

        self.enable_multicast_snooping(bridge.device()).await
    }

    #[instrument(skip(self, bridge), fields(bridge = %bridge.name))]
    async fn remove_bridge(&self, bridge: &Bridge) -> Result<(), FieldError> {
        match self.docker.remove_network(&bridge.name).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("Bridge {} already absent", bridge.name);
                Ok(())
            }
            Err(e) => Err(FieldError::Network(format!(
                "Failed to remove bridge {}: {}",
                bridge.name, e
            ))),
        }
    }

    #[instrument(skip(self, bridge), fields(bridge = %bridge.name))]
    async fn disconnect_endpoints(&self, bridge: &Bridge) -> Result<usize, FieldError> {
        let network = match self
            .docker
            .inspect_network(&bridge.name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(network) => network,
            Err(e) if is_not_found(&e) => return Ok(0),
            Err(e) => {
                return Err(FieldError::Network(format!(
                    "Failed to inspect bridge {}: {}",
                    bridge.name, e
                )))
            }
        };

        let containers: Vec<String> = network.containers.unwrap_or_default().into_keys().collect();
        for container in &containers {
            let result = self
                .docker
                .disconnect_network(
                    &bridge.name,
                    DisconnectNetworkOptions {
                        container: container.clone(),
                        force: true,
                    },
                )
                .await;
            match result {
                Ok(()) => debug!(container = %container, "Disconnected from bridge"),
                Err(e) if is_not_found(&e) => {}
                Err(e) => {
                    return Err(FieldError::Network(format!(
                        "Failed to disconnect {} from bridge {}: {}",
                        container, bridge.name, e
                    )))
                }
            }
        }
        Ok(containers.len())
    }

    async fn create_tunnel(&self, tunnel: &VxlanTunnel) -> Result<(), FieldError> {
        let id = tunnel.id.to_string();
        let group = tunnel.group().to_string();
        self.ip_checked(&[
            "link",
            "add",
            &tunnel.name,
            "type",
            "vxlan",
            "id",
            &id,
            "group",
            &group,
            "dev",
            &tunnel.device,
        ])
        .await
    }

    async fn set_up(&self, device: &str) -> Result<(), FieldError> {
        self.ip_checked(&["link", "set", device, "up"]).await
    }

    async fn set_down(&self, device: &str) -> Result<(), FieldError> {
        self.ip_checked(&["link", "set", device, "down"]).await
    }

    async fn remove_device(&self, device: &str) -> Result<(), FieldError> {
        self.ip_checked(&["link", "delete", device]).await
    }

    async fn exists(&self, device: &str) -> Result<bool, FieldError> {
        Ok(self.ip(&["link", "show", device]).await?.status.success())
    }

    async fn is_up(&self, device: &str) -> Result<bool, FieldError> {
        let output = self.ip(&["-o", "link", "show", device]).await?;
        if !output.status.success() {
            return Ok(false);
        }
        Ok(link_flags_up(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Whether `ip -o link show` output carries the administrative `UP` flag.
fn link_flags_up(line: &str) -> bool {
    line.split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(flags, _)| flags.split(',').any(|f| f == "UP"))
        .unwrap_or(false)
}
