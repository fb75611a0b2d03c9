// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod field_controller;
pub mod host_agent;
pub mod launcher;
pub mod topology;

pub use field_controller::{ControllerSettings, FieldController};
pub use host_agent::{HostAgent, HostStartOutcome};
pub use launcher::ContainerLauncher;
pub use topology::TopologyBuilder;
