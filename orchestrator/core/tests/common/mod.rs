// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory fakes shared by the field integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use field_core::application::{
    ContainerLauncher, ControllerSettings, FieldController, HostAgent, TopologyBuilder,
};
use field_core::domain::container::{ContainerEngine, ContainerSpec, NetworkAttachment};
use field_core::domain::field::FieldError;
use field_core::domain::network::NetworkDevice;
use field_core::domain::plan::{Bridge, PlanFile, VxlanTunnel};
use field_core::domain::platform::Platform;
use field_core::domain::remote::{HostResult, RemoteClient, RemoteResults};
use field_core::domain::state::FieldStateStore;

pub const LOCAL_HOST: &str = "node-a";

/// Containers attached to each bridge network, shared by the fake engine and
/// the fake devices.
pub type Endpoints = Arc<Mutex<BTreeMap<String, BTreeSet<String>>>>;

/// Devices present on the fake host plus a log of every mutating call.
#[derive(Default)]
pub struct FakeDevices {
    pub present: Mutex<BTreeSet<String>>,
    pub up: Mutex<HashSet<String>>,
    pub log: Mutex<Vec<String>>,
    pub endpoints: Endpoints,
}

impl FakeDevices {
    pub fn with_up_bridge(device: &str) -> Self {
        let devices = Self::default();
        devices.present.lock().unwrap().insert(device.to_string());
        devices.up.lock().unwrap().insert(device.to_string());
        devices
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn present(&self) -> BTreeSet<String> {
        self.present.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl NetworkDevice for FakeDevices {
    async fn create_bridge(&self, bridge: &Bridge) -> Result<(), FieldError> {
        self.record(format!("create_bridge {}", bridge.device()));
        let mut present = self.present.lock().unwrap();
        for interface in &bridge.add_interfaces {
            if !present.contains(interface) {
                return Err(FieldError::Network(format!("{} does not exist", interface)));
            }
        }
        present.insert(bridge.device().to_string());
        self.up.lock().unwrap().insert(bridge.device().to_string());
        Ok(())
    }

    async fn remove_bridge(&self, bridge: &Bridge) -> Result<(), FieldError> {
        if let Some(attached) = self.endpoints.lock().unwrap().get(&bridge.name) {
            if !attached.is_empty() {
                return Err(FieldError::Network(format!(
                    "error while removing network: network {} has active endpoints",
                    bridge.name
                )));
            }
        }
        if self.present.lock().unwrap().remove(bridge.device()) {
            self.record(format!("remove_bridge {}", bridge.device()));
        }
        self.up.lock().unwrap().remove(bridge.device());
        Ok(())
    }

    async fn disconnect_endpoints(&self, bridge: &Bridge) -> Result<usize, FieldError> {
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .remove(&bridge.name)
            .map_or(0, |attached| attached.len()))
    }

    async fn create_tunnel(&self, tunnel: &VxlanTunnel) -> Result<(), FieldError> {
        self.record(format!(
            "create_tunnel {} id {} group {} dev {}",
            tunnel.name,
            tunnel.id,
            tunnel.group(),
            tunnel.device
        ));
        self.present.lock().unwrap().insert(tunnel.name.clone());
        Ok(())
    }

    async fn set_up(&self, device: &str) -> Result<(), FieldError> {
        self.record(format!("set_up {}", device));
        self.up.lock().unwrap().insert(device.to_string());
        Ok(())
    }

    async fn set_down(&self, device: &str) -> Result<(), FieldError> {
        self.record(format!("set_down {}", device));
        self.up.lock().unwrap().remove(device);
        Ok(())
    }

    async fn remove_device(&self, device: &str) -> Result<(), FieldError> {
        self.record(format!("remove_device {}", device));
        self.present.lock().unwrap().remove(device);
        Ok(())
    }

    async fn exists(&self, device: &str) -> Result<bool, FieldError> {
        Ok(self.present.lock().unwrap().contains(device))
    }

    async fn is_up(&self, device: &str) -> Result<bool, FieldError> {
        Ok(self.up.lock().unwrap().contains(device))
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub running: Mutex<BTreeSet<String>>,
    pub log: Mutex<Vec<String>>,
    pub specs: Mutex<Vec<ContainerSpec>>,
    pub endpoints: Endpoints,
}

impl FakeEngine {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn running(&self) -> BTreeSet<String> {
        self.running.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn create(&self, spec: &ContainerSpec) -> Result<(), FieldError> {
        self.log.lock().unwrap().push(format!("create {}", spec.name));
        self.running.lock().unwrap().insert(spec.name.clone());
        self.specs.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn attach_network(
        &self,
        container: &str,
        attachment: &NetworkAttachment,
    ) -> Result<(), FieldError> {
        self.log.lock().unwrap().push(format!(
            "attach {} {} {} {}",
            container, attachment.interface, attachment.network, attachment.ipv4
        ));
        self.endpoints
            .lock()
            .unwrap()
            .entry(attachment.network.clone())
            .or_default()
            .insert(container.to_string());
        Ok(())
    }

    async fn disable_offload(&self, container: &str, interface: &str) -> Result<(), FieldError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("offload {} {}", container, interface));
        Ok(())
    }

    async fn remove(&self, container: &str) -> Result<(), FieldError> {
        if self.running.lock().unwrap().remove(container) {
            self.log.lock().unwrap().push(format!("remove {}", container));
        }
        for attached in self.endpoints.lock().unwrap().values_mut() {
            attached.remove(container);
        }
        Ok(())
    }
}

/// Remote client whose hosts either all answer or fail as configured.
#[derive(Default)]
pub struct FakeRemote {
    pub failing: HashSet<String>,
    pub log: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn failing(hosts: &[&str]) -> Self {
        Self {
            failing: hosts.iter().map(|h| h.to_string()).collect(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn answer(&self, entry: String, hosts: &[String]) -> RemoteResults {
        self.log.lock().unwrap().push(entry);
        hosts
            .iter()
            .map(|h| {
                let result = if self.failing.contains(h) {
                    HostResult::Failed {
                        reason: "ssh: connect to host port 22: No route to host".to_string(),
                    }
                } else {
                    HostResult::Success {
                        output: String::new(),
                    }
                };
                (h.clone(), result)
            })
            .collect()
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn put(&self, local: &Path, remote_dir: &str, hosts: &[String]) -> RemoteResults {
        self.answer(
            format!("put {} {} {}", local.display(), remote_dir, hosts.join(",")),
            hosts,
        )
    }

    async fn execute(&self, command: &str, hosts: &[String]) -> RemoteResults {
        self.answer(format!("execute {} {}", command, hosts.join(",")), hosts)
    }

    async fn collect(
        &self,
        remote_dir: &str,
        local_dir: &Path,
        hosts: &[String],
    ) -> RemoteResults {
        self.answer(
            format!("collect {} {} {}", remote_dir, local_dir.display(), hosts.join(",")),
            hosts,
        )
    }
}

pub struct MemoryStateStore {
    pub work_directory: PathBuf,
    pub work_directory_exists: bool,
    pub lock: Mutex<Option<String>>,
    pub hosts: Mutex<String>,
    pub field_host_file: Option<String>,
}

impl MemoryStateStore {
    pub fn new(work_directory: &Path) -> Self {
        Self {
            work_directory: work_directory.to_path_buf(),
            work_directory_exists: true,
            lock: Mutex::new(None),
            hosts: Mutex::new("127.0.0.1 localhost\n".to_string()),
            field_host_file: None,
        }
    }

    pub fn hosts(&self) -> String {
        self.hosts.lock().unwrap().clone()
    }
}

impl FieldStateStore for MemoryStateStore {
    fn work_directory_exists(&self) -> bool {
        self.work_directory_exists
    }

    fn lock_exists(&self) -> bool {
        self.lock.lock().unwrap().is_some()
    }

    fn load_lock(&self) -> Result<Option<String>, FieldError> {
        Ok(self.lock.lock().unwrap().clone())
    }

    fn store_lock(&self, plan: &str) -> Result<(), FieldError> {
        *self.lock.lock().unwrap() = Some(plan.to_string());
        Ok(())
    }

    fn remove_lock(&self) -> Result<(), FieldError> {
        *self.lock.lock().unwrap() = None;
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        self.work_directory.join("field.lock")
    }

    fn load_hosts(&self) -> Result<String, FieldError> {
        Ok(self.hosts())
    }

    fn store_hosts(&self, contents: &str) -> Result<(), FieldError> {
        *self.hosts.lock().unwrap() = contents.to_string();
        Ok(())
    }

    fn snapshot_hosts(&self) -> Result<PathBuf, FieldError> {
        Ok(self.work_directory.join("hosts"))
    }

    fn load_field_host_file(&self) -> Result<Option<String>, FieldError> {
        Ok(self.field_host_file.clone())
    }
}

pub struct FakePlatform {
    pub hostname: String,
    pub kernel_parameters: Mutex<Vec<(String, String)>>,
}

impl FakePlatform {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            kernel_parameters: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    async fn set_kernel_parameter(&self, name: &str, value: &str) -> Result<(), FieldError> {
        self.kernel_parameters
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// A scratch directory under `/tmp` holding a work directory and a path
/// usable as a container root.
pub struct Scratch {
    _dir: tempfile::TempDir,
    pub work: PathBuf,
    pub root: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("field-test")
            .tempdir_in("/tmp")
            .unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        let root = dir.path().join("field");
        Self {
            _dir: dir,
            work,
            root,
        }
    }

    pub fn plan_file(&self, contents: String) -> PlanFile {
        PlanFile::from_contents(self.work.join("fieldplan.yaml"), contents).unwrap()
    }
}

/// Two hosts. `node-a` runs n1 on br0 and br1 and n2 on br1, with br0
/// enslaving a VXLAN tunnel. `node-b` runs n3 outside the control block.
pub fn two_host_plan(root: &Path) -> String {
    format!(
        r##"hosts:
  - hostname: node-a
    address: 192.168.10.1
    root_directory: {root}
    kernel_parameters:
      net.ipv4.ip_forward: 1
    vxlan_tunnels:
      vxlan1: {{ id: 42, device: eth1 }}
    bridges:
      br0:
        subnet: 10.0.0.0/24
        add_interfaces: [vxlan1]
      br1:
        subnet: 10.99.0.0/16
    containers:
      - name: n1
        image: etce/node:1
        interfaces:
          - {{ bridge: br0, ipv4: 10.0.0.1 }}
          - {{ bridge: br1, ipv4: 10.99.0.1 }}
        init_script:
          filename: init.sh
          text: "#!/bin/sh\n"
      - name: n2
        image: etce/node:1
        interfaces:
          - {{ bridge: br1, ipv4: 10.99.0.2 }}
        hosts_entries_ipv4:
          - {{ name: radio-2, address: 10.0.0.2 }}
  - hostname: node-b
    address: 192.168.10.2
    root_directory: {root}
    bridges:
      br0:
        subnet: 10.0.0.0/24
    containers:
      - name: n3
        image: etce/node:1
        interfaces:
          - {{ bridge: br0, ipv4: 10.0.0.3 }}
"##,
        root = root.display()
    )
}

/// Fakes wired into a host agent and controller for `node-a`.
pub struct Harness {
    pub work_directory: PathBuf,
    pub devices: Arc<FakeDevices>,
    pub engine: Arc<FakeEngine>,
    pub remote: Arc<FakeRemote>,
    pub state: Arc<MemoryStateStore>,
    pub platform: Arc<FakePlatform>,
}

impl Harness {
    pub fn new(scratch: &Scratch) -> Self {
        Self::with(
            FakeDevices::default(),
            FakeRemote::default(),
            MemoryStateStore::new(&scratch.work),
        )
    }

    pub fn with(devices: FakeDevices, remote: FakeRemote, state: MemoryStateStore) -> Self {
        let engine = FakeEngine {
            endpoints: devices.endpoints.clone(),
            ..Default::default()
        };
        Self {
            work_directory: state.work_directory.clone(),
            devices: Arc::new(devices),
            engine: Arc::new(engine),
            remote: Arc::new(remote),
            state: Arc::new(state),
            platform: Arc::new(FakePlatform::new(LOCAL_HOST)),
        }
    }

    pub fn agent(&self) -> HostAgent {
        HostAgent::new(
            self.platform.clone(),
            self.state.clone(),
            TopologyBuilder::new(self.devices.clone()),
            ContainerLauncher::new(self.engine.clone()),
        )
    }

    pub fn controller(&self) -> FieldController {
        let settings = ControllerSettings {
            work_directory: self.work_directory.clone(),
            control_network: "10.99.0.0/16".parse().unwrap(),
            remote_command: "fieldctl".to_string(),
        };
        FieldController::new(settings, self.state.clone(), self.remote.clone(), self.agent())
    }
}
