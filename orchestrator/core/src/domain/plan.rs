// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field Plan Types
//!
//! The plan is the declarative description of a field: which hosts take part,
//! which containers each host runs, and the bridges and VXLAN tunnels those
//! containers attach to.
//!
//! ```yaml
//! hosts:
//!   - hostname: node-a
//!     address: 192.168.10.1
//!     root_directory: /tmp/etce/field
//!     kernel_parameters:
//!       net.ipv4.ip_forward: 1
//!     vxlan_tunnels:
//!       vxlan1: { id: 42, device: eth1 }
//!     bridges:
//!       br0:
//!         subnet: 10.0.0.0/24
//!         gateway: 10.0.0.254
//!         add_interfaces: [vxlan1]
//!     containers:
//!       - name: n1
//!         image: etce/node:latest
//!         interfaces:
//!           - { bridge: br0, ipv4: 10.0.0.1 }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use crate::domain::field::FieldError;
use crate::domain::root_directory::RootDirectory;

/// Multicast group every VXLAN tunnel joins.
pub const VXLAN_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 1, 1, 1);

/// Names that always refer to the machine running the command.
pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub hostname: String,

    /// Address written next to the hostname in the hosts-file block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,

    pub root_directory: RootDirectory,

    #[serde(default)]
    pub containers: Vec<Container>,

    #[serde(default)]
    pub bridges: BTreeMap<String, Bridge>,

    #[serde(default)]
    pub vxlan_tunnels: BTreeMap<String, VxlanTunnel>,

    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    pub kernel_parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Attachments in declaration order. Index `i` becomes `eth<i>`.
    #[serde(default)]
    pub interfaces: Vec<Interface>,

    #[serde(default)]
    pub params: Vec<ContainerParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_script: Option<InitScript>,

    #[serde(default)]
    pub hosts_entries_ipv4: Vec<HostsEntry>,

    #[serde(default)]
    pub hosts_entries_ipv6: Vec<HostsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub bridge: String,
    pub ipv4: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerParam {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitScript {
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostsEntry {
    pub name: String,
    pub address: IpAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bridge {
    /// Plan key; also the engine network name containers connect to.
    #[serde(skip)]
    pub name: String,

    /// Kernel device name. Defaults to the plan key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    /// Existing interfaces to enslave to the bridge.
    #[serde(default)]
    pub add_interfaces: Vec<String>,

    /// Externally managed: never created or destroyed here.
    #[serde(default)]
    pub persistent: bool,
}

impl Bridge {
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VxlanTunnel {
    #[serde(skip)]
    pub name: String,
    pub id: u32,
    /// Underlying device carrying the encapsulated traffic.
    pub device: String,
}

impl VxlanTunnel {
    pub fn group(&self) -> Ipv4Addr {
        VXLAN_MULTICAST_GROUP
    }
}

impl Container {
    /// Declared image, falling back to an `image` entry in the free-form params.
    pub fn image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .or_else(|| {
                self.params
                    .iter()
                    .find(|p| p.name == "image")
                    .map(|p| p.value.as_str())
            })
            .filter(|image| !image.trim().is_empty())
    }

    /// Dedicated working directory under the host's root.
    pub fn working_directory(&self, root: &RootDirectory) -> PathBuf {
        root.join(&self.name)
    }

    /// Contents of the `config` file written into the working directory.
    pub fn rendered_config(&self) -> Result<String, FieldError> {
        serde_yaml::to_string(self)
            .map_err(|e| FieldError::Plan(format!("cannot render container {}: {}", self.name, e)))
    }
}

impl PlanDocument {
    /// Parse and validate a plan from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FieldError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| FieldError::Plan(e.to_string()))?;
        check_root_directories(&value)?;

        let mut plan: PlanDocument =
            serde_yaml::from_value(value).map_err(|e| FieldError::Plan(e.to_string()))?;

        for host in &mut plan.hosts {
            for (name, bridge) in host.bridges.iter_mut() {
                bridge.name = name.clone();
            }
            for (name, tunnel) in host.vxlan_tunnels.iter_mut() {
                tunnel.name = name.clone();
            }
        }

        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        if self.hosts.is_empty() {
            return Err(FieldError::Plan("plan declares no hosts".to_string()));
        }

        let mut hostnames = HashSet::new();
        for host in &self.hosts {
            if host.hostname.trim().is_empty() {
                return Err(FieldError::Plan("host with empty hostname".to_string()));
            }
            if !hostnames.insert(host.hostname.as_str()) {
                return Err(FieldError::Plan(format!(
                    "host \"{}\" declared more than once",
                    host.hostname
                )));
            }

            let mut names = HashSet::new();
            for container in &host.containers {
                if !names.insert(container.name.as_str()) {
                    return Err(FieldError::Plan(format!(
                        "container \"{}\" declared more than once on host \"{}\"",
                        container.name, host.hostname
                    )));
                }

                let mut seen = HashSet::new();
                for interface in &container.interfaces {
                    if !host.bridges.contains_key(&interface.bridge) {
                        return Err(FieldError::Plan(format!(
                            "container \"{}\" references unknown bridge \"{}\"",
                            container.name, interface.bridge
                        )));
                    }
                    if !seen.insert(interface.bridge.as_str()) {
                        return Err(FieldError::Plan(format!(
                            "container \"{}\" attaches to bridge \"{}\" twice",
                            container.name, interface.bridge
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn host(&self, hostname: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.hostname == hostname)
    }

    /// `(hostname, address)` pairs in plan order.
    pub fn hostnames(&self) -> impl Iterator<Item = (&str, Option<IpAddr>)> {
        self.hosts.iter().map(|h| (h.hostname.as_str(), h.address))
    }

    pub fn containers(&self, hostname: &str) -> &[Container] {
        self.host(hostname)
            .map(|h| h.containers.as_slice())
            .unwrap_or(&[])
    }

    pub fn bridges(&self, hostname: &str) -> impl Iterator<Item = &Bridge> {
        self.host(hostname).into_iter().flat_map(|h| h.bridges.values())
    }

    pub fn vxlan_tunnels(&self, hostname: &str) -> impl Iterator<Item = &VxlanTunnel> {
        self.host(hostname)
            .into_iter()
            .flat_map(|h| h.vxlan_tunnels.values())
    }

    pub fn kernel_parameters(&self, hostname: &str) -> Option<&BTreeMap<String, String>> {
        self.host(hostname).map(|h| &h.kernel_parameters)
    }

    pub fn root_directory(&self, hostname: &str) -> Option<&RootDirectory> {
        self.host(hostname).map(|h| &h.root_directory)
    }

    /// Hosts that must be driven remotely: everything except the local
    /// hostname and `localhost`.
    pub fn other_hosts(&self, local_hostname: &str) -> Vec<String> {
        self.hosts
            .iter()
            .map(|h| h.hostname.as_str())
            .filter(|h| *h != local_hostname && *h != LOCALHOST)
            .map(str::to_string)
            .collect()
    }

    /// Every container of every host, with the owning hostname.
    pub fn all_containers(&self) -> impl Iterator<Item = (&str, &Container)> {
        self.hosts
            .iter()
            .flat_map(|h| h.containers.iter().map(move |c| (h.hostname.as_str(), c)))
    }
}

/// A plan resolved once at the command boundary: where it came from, its
/// verbatim text (copied into the lock file) and the parsed document.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub path: PathBuf,
    pub contents: String,
    pub document: PlanDocument,
}

impl PlanFile {
    pub fn from_contents(path: impl Into<PathBuf>, contents: String) -> Result<Self, FieldError> {
        let document = PlanDocument::from_yaml_str(&contents)?;
        Ok(Self {
            path: path.into(),
            contents,
            document,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Accept numbers and booleans as well as strings for `name: value` maps.
fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, serde_yaml::Value> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "kernel parameter {} has non-scalar value {:?}",
                        k, other
                    )))
                }
            };
            Ok((k, value))
        })
        .collect()
}

/// Root directory shape is a configuration concern, so it is checked on the
/// raw document before the typed parse can fold it into a plan error.
fn check_root_directories(value: &serde_yaml::Value) -> Result<(), FieldError> {
    let hosts = value
        .get("hosts")
        .and_then(serde_yaml::Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for host in hosts {
        if let Some(raw) = host.get("root_directory").and_then(serde_yaml::Value::as_str) {
            RootDirectory::parse(raw)?;
        }
    }
    Ok(())
}
