// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the field CLI

pub mod config;
pub mod field;
pub mod host;

pub use self::config::ConfigCommand;
pub use self::field::{StartArgs, StopArgs};
pub use self::host::HostCommand;
