// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Network domain: the control block, the control-address allocator and the
//! host network-device port.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::domain::field::FieldError;
use crate::domain::plan::{Bridge, PlanDocument, VxlanTunnel};

/// Control block used when neither config nor `CIDR` say otherwise.
pub const DEFAULT_CONTROL_CIDR: &str = "10.99.0.0/16";

/// An IPv4 network block in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlNetwork {
    network: Ipv4Addr,
    prefix: u8,
}

impl ControlNetwork {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, FieldError> {
        if prefix > 32 {
            return Err(FieldError::Configuration(format!(
                "invalid prefix length /{}",
                prefix
            )));
        }
        let network = Ipv4Addr::from(u32::from(addr) & Self::mask(prefix));
        Ok(Self { network, prefix })
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !Self::mask(self.prefix))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & Self::mask(self.prefix) == u32::from(self.network)
    }

    /// Addresses a host may take, in ascending order: the network address is
    /// never handed out, nor is the broadcast address on /30 and wider.
    pub fn usable(&self) -> impl Iterator<Item = Ipv4Addr> {
        let first = u32::from(self.network);
        let last = u32::from(self.broadcast());
        let last = if self.prefix <= 30 { last - 1 } else { last };
        let range = match first.checked_add(1) {
            Some(start) => start..=last,
            #[allow(clippy::reversed_empty_ranges)]
            None => 1..=0,
        };
        range.map(Ipv4Addr::from)
    }
}

impl FromStr for ControlNetwork {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(|| {
            FieldError::Configuration(format!("\"{}\" is not in CIDR notation", s))
        })?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| {
            FieldError::Configuration(format!("\"{}\" is not a valid IPv4 network", s))
        })?;
        let prefix: u8 = prefix.parse().map_err(|_| {
            FieldError::Configuration(format!("\"{}\" has an invalid prefix length", s))
        })?;
        Self::new(addr, prefix)
    }
}

impl fmt::Display for ControlNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// A container that already holds an address inside the control block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ControlMember {
    pub name: String,
    pub address: Ipv4Addr,
}

/// Picks this host's control address inside the control block.
pub struct AddressAllocator {
    block: ControlNetwork,
}

impl AddressAllocator {
    pub fn new(block: ControlNetwork) -> Self {
        Self { block }
    }

    pub fn block(&self) -> ControlNetwork {
        self.block
    }

    /// For every container in the plan, its first interface inside the block.
    pub fn members(&self, plan: &PlanDocument) -> Vec<ControlMember> {
        plan.all_containers()
            .filter_map(|(_, container)| {
                container
                    .interfaces
                    .iter()
                    .find(|i| self.block.contains(i.ipv4))
                    .map(|i| ControlMember {
                        name: container.name.clone(),
                        address: i.ipv4,
                    })
            })
            .collect()
    }

    /// First usable address not in `taken`.
    pub fn allocate<'a>(
        &self,
        taken: impl IntoIterator<Item = &'a Ipv4Addr>,
    ) -> Result<Ipv4Addr, FieldError> {
        let taken: HashSet<Ipv4Addr> = taken.into_iter().copied().collect();
        let allocated = self
            .block
            .usable()
            .find(|addr| !taken.contains(addr))
            .ok_or_else(|| FieldError::AddressExhausted(self.block.to_string()))?;

        metrics::counter!("field_control_address_allocated_total").increment(1);
        Ok(allocated)
    }

    /// Allocate and format as `addr/prefix`.
    pub fn allocate_cidr<'a>(
        &self,
        taken: impl IntoIterator<Item = &'a Ipv4Addr>,
    ) -> Result<String, FieldError> {
        let addr = self.allocate(taken)?;
        Ok(format!("{}/{}", addr, self.block.prefix()))
    }
}

/// Primitive host network-device operations.
#[async_trait]
pub trait NetworkDevice: Send + Sync {
    /// Create a bridge with its addressing, MTU and enslaved interfaces, with
    /// multicast snooping enabled.
    async fn create_bridge(&self, bridge: &Bridge) -> Result<(), FieldError>;

    /// Bring down and delete a bridge created by [`create_bridge`]. Removing
    /// an absent bridge succeeds.
    ///
    /// [`create_bridge`]: NetworkDevice::create_bridge
    async fn remove_bridge(&self, bridge: &Bridge) -> Result<(), FieldError>;

    /// Force-disconnect every container still attached to a bridge and
    /// return how many were detached. An absent bridge has none.
    async fn disconnect_endpoints(&self, bridge: &Bridge) -> Result<usize, FieldError>;

    /// Create a point-to-multipoint VXLAN device. Does not bring it up.
    async fn create_tunnel(&self, tunnel: &VxlanTunnel) -> Result<(), FieldError>;

    async fn set_up(&self, device: &str) -> Result<(), FieldError>;

    async fn set_down(&self, device: &str) -> Result<(), FieldError>;

    async fn remove_device(&self, device: &str) -> Result<(), FieldError>;

    async fn exists(&self, device: &str) -> Result<bool, FieldError>;

    async fn is_up(&self, device: &str) -> Result<bool, FieldError>;
}
