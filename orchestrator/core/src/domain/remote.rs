// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote host fan-out.
//!
//! Each call addresses a set of hosts at once and resolves only after every
//! host has answered or failed, returning one result per host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::domain::field::FieldError;

/// What to do when a host key is not in `known_hosts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKeyPolicy {
    #[default]
    Reject,
    Warning,
    Autoadd,
}

impl FromStr for HostKeyPolicy {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "warning" => Ok(Self::Warning),
            "autoadd" => Ok(Self::Autoadd),
            other => Err(FieldError::Configuration(format!(
                "unknown host key policy \"{}\" (expected reject, warning or autoadd)",
                other
            ))),
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reject => "reject",
            Self::Warning => "warning",
            Self::Autoadd => "autoadd",
        };
        f.write_str(s)
    }
}

/// Connection options shared by every remote call.
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub policy: HostKeyPolicy,
}

/// Outcome of one remote operation on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResult {
    Success { output: String },
    Failed { reason: String },
}

impl HostResult {
    pub fn is_success(&self) -> bool {
        matches!(self, HostResult::Success { .. })
    }
}

impl fmt::Display for HostResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostResult::Success { output } if output.trim().is_empty() => f.write_str("ok"),
            HostResult::Success { output } => write!(f, "ok: {}", output.trim()),
            HostResult::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Complete per-host result mapping of one fan-out.
pub type RemoteResults = BTreeMap<String, HostResult>;

/// Merge a follow-up fan-out into earlier results; a host that already failed
/// keeps its first failure.
pub fn merge_results(mut earlier: RemoteResults, later: RemoteResults) -> RemoteResults {
    for (host, result) in later {
        match earlier.get(&host) {
            Some(HostResult::Failed { .. }) => {}
            _ => {
                earlier.insert(host, result);
            }
        }
    }
    earlier
}

/// One [`FieldError::RemoteExecution`] per failed host, in host order.
pub fn remote_errors(results: &RemoteResults) -> Vec<FieldError> {
    results
        .iter()
        .filter_map(|(host, result)| match result {
            HostResult::Failed { reason } => Some(FieldError::RemoteExecution {
                host: host.clone(),
                reason: reason.clone(),
            }),
            HostResult::Success { .. } => None,
        })
        .collect()
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Copy a local file into `remote_dir` on every host, overwriting.
    async fn put(&self, local: &Path, remote_dir: &str, hosts: &[String]) -> RemoteResults;

    /// Run a shell command on every host.
    async fn execute(&self, command: &str, hosts: &[String]) -> RemoteResults;

    /// Copy `remote_dir` from every host into `local_dir/<host>`.
    async fn collect(&self, remote_dir: &str, local_dir: &Path, hosts: &[String])
        -> RemoteResults;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("autoadd".parse::<HostKeyPolicy>().unwrap(), HostKeyPolicy::Autoadd);
        assert!("maybe".parse::<HostKeyPolicy>().is_err());
        assert_eq!(HostKeyPolicy::default().to_string(), "reject");
    }

    #[test]
    fn test_remote_errors_name_failed_hosts() {
        let results: RemoteResults = [
            ("a".to_string(), HostResult::Success { output: String::new() }),
            ("b".to_string(), HostResult::Failed { reason: "ssh: no route".to_string() }),
        ]
        .into_iter()
        .collect();

        let errors = remote_errors(&results);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            FieldError::RemoteExecution { host, reason } if host == "b" && reason == "ssh: no route"
        ));
        assert_eq!(
            errors[0].to_string(),
            "Remote execution failed on b: ssh: no route"
        );
    }

    #[test]
    fn test_merge_keeps_first_failure() {
        let earlier = RemoteResults::from([
            ("a".to_string(), HostResult::Success { output: String::new() }),
            ("b".to_string(), HostResult::Failed { reason: "scp: no route".to_string() }),
        ]);
        let later = RemoteResults::from([
            ("a".to_string(), HostResult::Success { output: "started".to_string() }),
            ("b".to_string(), HostResult::Success { output: "started".to_string() }),
        ]);
        let merged = merge_results(earlier, later);
        assert_eq!(merged["a"].to_string(), "ok: started");
        assert_eq!(merged["b"].to_string(), "failed: scp: no route");
    }
}
