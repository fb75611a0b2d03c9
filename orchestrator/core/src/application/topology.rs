// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology Builder Application Service
//!
//! Brings a host's bridges and VXLAN tunnels up before any container is
//! attached, and tears them down again on stop.
//!
//! Tunnels are created before bridges: a bridge may enslave a tunnel device
//! through `add_interfaces`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::field::FieldError;
use crate::domain::network::NetworkDevice;
use crate::domain::plan::{Bridge, VxlanTunnel};

pub struct TopologyBuilder {
    devices: Arc<dyn NetworkDevice>,
}

impl TopologyBuilder {
    pub fn new(devices: Arc<dyn NetworkDevice>) -> Self {
        Self { devices }
    }

    /// Create tunnels, then bridges. Stops at the first failure; whatever was
    /// already created stays in place for [`teardown`](Self::teardown).
    pub async fn build<'a>(
        &self,
        tunnels: impl IntoIterator<Item = &'a VxlanTunnel>,
        bridges: impl IntoIterator<Item = &'a Bridge>,
    ) -> Result<(), FieldError> {
        for tunnel in tunnels {
            self.create_tunnel(tunnel).await?;
        }
        for bridge in bridges {
            self.create_bridge(bridge).await?;
        }
        Ok(())
    }

    async fn create_tunnel(&self, tunnel: &VxlanTunnel) -> Result<(), FieldError> {
        if self.devices.exists(&tunnel.name).await? {
            debug!(tunnel = %tunnel.name, "Tunnel already present, skipping");
            return Ok(());
        }

        info!(
            tunnel = %tunnel.name,
            id = tunnel.id,
            group = %tunnel.group(),
            device = %tunnel.device,
            "Creating VXLAN tunnel"
        );
        self.devices.create_tunnel(tunnel).await?;
        self.devices.set_up(&tunnel.name).await?;
        metrics::counter!("field_tunnels_created_total").increment(1);
        Ok(())
    }

    async fn create_bridge(&self, bridge: &Bridge) -> Result<(), FieldError> {
        if bridge.persistent {
            if !self.devices.is_up(bridge.device()).await? {
                return Err(FieldError::Configuration(format!(
                    "Bridge {} marked persistent is not up. Quitting.",
                    bridge.device()
                )));
            }
            debug!(bridge = %bridge.device(), "Persistent bridge is up");
            return Ok(());
        }

        info!("Bringing up bridge: {}", bridge.device());
        self.devices.create_bridge(bridge).await?;
        metrics::counter!("field_bridges_created_total").increment(1);
        Ok(())
    }

    /// Remove every present tunnel and every non-persistent bridge.
    ///
    /// Keeps going past failures and returns them, so a half-built topology
    /// from an interrupted start is cleaned up as far as possible.
    pub async fn teardown<'a>(
        &self,
        tunnels: impl IntoIterator<Item = &'a VxlanTunnel>,
        bridges: impl IntoIterator<Item = &'a Bridge>,
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for tunnel in tunnels {
            if let Err(e) = self.remove_tunnel(tunnel).await {
                warn!(tunnel = %tunnel.name, error = %e, "Failed to remove tunnel");
                errors.push(e);
            }
        }

        for bridge in bridges {
            if bridge.persistent {
                debug!(bridge = %bridge.device(), "Leaving persistent bridge in place");
                continue;
            }
            if let Err(e) = self.remove_bridge(bridge).await {
                warn!(bridge = %bridge.device(), error = %e, "Failed to remove bridge");
                errors.push(e);
            }
        }

        errors
    }

    async fn remove_tunnel(&self, tunnel: &VxlanTunnel) -> Result<(), FieldError> {
        if !self.devices.exists(&tunnel.name).await? {
            return Ok(());
        }
        info!("Removing tunnel: {}", tunnel.name);
        self.devices.set_down(&tunnel.name).await?;
        self.devices.remove_device(&tunnel.name).await?;
        metrics::counter!("field_tunnels_removed_total").increment(1);
        Ok(())
    }

    async fn remove_bridge(&self, bridge: &Bridge) -> Result<(), FieldError> {
        info!("Bringing down bridge: {}", bridge.device());
        let detached = self.devices.disconnect_endpoints(bridge).await?;
        if detached > 0 {
            debug!(bridge = %bridge.device(), containers = detached, "Detached containers");
        }
        self.devices.remove_bridge(bridge).await?;
        metrics::counter!("field_bridges_removed_total").increment(1);
        Ok(())
    }
}
