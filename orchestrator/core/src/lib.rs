// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Field lifecycle orchestration: provisions containers wired through local
//! bridges and a cross-host VXLAN overlay, and tears them down again.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, lifecycle services and host adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
