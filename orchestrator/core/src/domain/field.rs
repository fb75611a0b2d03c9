// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field lifecycle types shared by every layer: the error taxonomy, the
//! controller state machine and the option/report structs passed across the
//! command boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::remote::{remote_errors, HostResult};

#[derive(Debug, Error)]
pub enum FieldError {
    /// Invalid or missing work directory, bad root directory, missing image,
    /// persistent bridge absent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Lock file present on start or absent on stop.
    #[error("{0}")]
    Concurrency(String),

    #[error("{} docker root directory already exists. Quitting.", .0.display())]
    FilesystemCollision(PathBuf),

    #[error("Remote execution failed on {host}: {reason}")]
    RemoteExecution { host: String, reason: String },

    #[error("No free control address left in {0}")]
    AddressExhausted(String),

    #[error("Container engine error: {0}")]
    Engine(String),

    #[error("Network device error: {0}")]
    Network(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Invalid plan: {0}")]
    Plan(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FieldError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = FieldError> = std::result::Result<T, E>;

/// Lifecycle of one field for one work directory.
///
/// `Active` is equivalent to "lock file present".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldState::Idle => "idle",
            FieldState::Starting => "starting",
            FieldState::Active => "active",
            FieldState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Compute addresses and rewrite the hosts file only.
    pub dryrun: bool,
    /// Remove a pre-existing container root directory instead of failing.
    pub force_root: bool,
    /// Add the containers' declared hosts entries to each host's hosts file.
    pub write_hosts: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    /// Fetch test data from the field's filesystem roots before teardown.
    pub collect: bool,
}

/// Outcome of a field start.
#[derive(Debug, Clone)]
pub struct StartReport {
    /// This host's control address in `addr/prefix` form.
    pub control_address: String,
    pub remote: BTreeMap<String, HostResult>,
}

impl StartReport {
    pub fn failed_hosts(&self) -> Vec<&str> {
        self.remote
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(h, _)| h.as_str())
            .collect()
    }

    pub fn remote_errors(&self) -> Vec<FieldError> {
        remote_errors(&self.remote)
    }
}

/// Outcome of a field stop. Local teardown problems are listed rather than
/// raised so that the lock file is always removed.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    pub remote: BTreeMap<String, HostResult>,
    pub teardown_errors: Vec<String>,
    pub collected_into: Option<PathBuf>,
}

impl StopReport {
    pub fn remote_errors(&self) -> Vec<FieldError> {
        remote_errors(&self.remote)
    }
}
