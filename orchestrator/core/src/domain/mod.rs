// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Field types, ports and the pure algorithms behind them.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Plan model, allocator, hosts-file merge, port traits

pub mod container;
pub mod field;
pub mod field_config;
pub mod field_hosts;
pub mod hosts_file;
pub mod network;
pub mod plan;
pub mod platform;
pub mod remote;
pub mod root_directory;
pub mod state;
