// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod docker;
pub mod linux_network;
pub mod plan_parser;
pub mod platform;
pub mod ssh_client;
pub mod state_store;

pub use docker::DockerEngine;
pub use linux_network::LinuxNetworkDevices;
pub use plan_parser::PlanParser;
pub use platform::LinuxPlatform;
pub use ssh_client::SshRemoteClient;
pub use state_store::FsFieldStateStore;
