// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote fan-out over the system `ssh` and `scp` clients.
//!
//! Password authentication goes through `sshpass`; otherwise the user's keys
//! and agent are used in batch mode.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::domain::remote::{HostKeyPolicy, HostResult, RemoteClient, RemoteOptions, RemoteResults};

pub struct SshRemoteClient {
    options: RemoteOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Ssh,
    Scp,
}

impl SshRemoteClient {
    pub fn new(options: RemoteOptions) -> Self {
        Self { options }
    }

    fn target(&self, host: &str) -> String {
        match &self.options.user {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        }
    }

    /// Program and leading arguments shared by every invocation of `tool`.
    fn base_command(&self, tool: Tool) -> (String, Vec<String>) {
        let tool_name = match tool {
            Tool::Ssh => "ssh",
            Tool::Scp => "scp",
        };

        let (program, mut args) = match &self.options.password {
            Some(password) => (
                "sshpass".to_string(),
                vec!["-p".to_string(), password.clone(), tool_name.to_string()],
            ),
            None => (tool_name.to_string(), Vec::new()),
        };

        let checking = match self.options.policy {
            HostKeyPolicy::Reject => "yes",
            HostKeyPolicy::Warning => "no",
            HostKeyPolicy::Autoadd => "accept-new",
        };
        args.push("-o".to_string());
        args.push(format!("StrictHostKeyChecking={}", checking));

        if self.options.password.is_none() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }

        if let Some(port) = self.options.port {
            args.push(match tool {
                Tool::Ssh => "-p".to_string(),
                Tool::Scp => "-P".to_string(),
            });
            args.push(port.to_string());
        }

        (program, args)
    }

    fn execute_args(&self, host: &str, command: &str) -> (String, Vec<String>) {
        let (program, mut args) = self.base_command(Tool::Ssh);
        args.push(self.target(host));
        args.push(command.to_string());
        (program, args)
    }

    fn put_args(&self, local: &Path, remote_dir: &str, host: &str) -> (String, Vec<String>) {
        let (program, mut args) = self.base_command(Tool::Scp);
        args.push(local.display().to_string());
        args.push(format!("{}:{}/", self.target(host), remote_dir.trim_end_matches('/')));
        (program, args)
    }

    fn collect_args(&self, remote_dir: &str, local_dir: &Path, host: &str) -> (String, Vec<String>) {
        let (program, mut args) = self.base_command(Tool::Scp);
        args.push("-r".to_string());
        args.push(format!("{}:{}", self.target(host), remote_dir));
        args.push(local_dir.join(host).display().to_string());
        (program, args)
    }

    async fn fan_out<F>(&self, hosts: &[String], build: F) -> RemoteResults
    where
        F: Fn(&str) -> (String, Vec<String>),
    {
        let runs = hosts.iter().map(|host| {
            let (program, args) = build(host.as_str());
            async move { (host.clone(), run(&program, &args).await) }
        });
        join_all(runs).await.into_iter().collect()
    }
}

async fn run(program: &str, args: &[String]) -> HostResult {
    debug!(program, ?args, "Running remote command");
    match Command::new(program).args(args).output().await {
        Ok(output) if output.status.success() => HostResult::Success {
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
        },
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            HostResult::Failed {
                reason: if stderr.is_empty() {
                    format!("{} exited with {}", program, output.status)
                } else {
                    stderr
                },
            }
        }
        Err(e) => HostResult::Failed {
            reason: format!("cannot run {}: {}", program, e),
        },
    }
}

#[async_trait]
impl RemoteClient for SshRemoteClient {
    async fn put(&self, local: &Path, remote_dir: &str, hosts: &[String]) -> RemoteResults {
        self.fan_out(hosts, |host| self.put_args(local, remote_dir, host))
            .await
    }

    async fn execute(&self, command: &str, hosts: &[String]) -> RemoteResults {
        self.fan_out(hosts, |host| self.execute_args(host, command))
            .await
    }

    async fn collect(
        &self,
        remote_dir: &str,
        local_dir: &Path,
        hosts: &[String],
    ) -> RemoteResults {
        self.fan_out(hosts, |host| self.collect_args(remote_dir, local_dir, host))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(options: RemoteOptions) -> SshRemoteClient {
        SshRemoteClient::new(options)
    }

    #[test]
    fn test_execute_args_with_keys() {
        let c = client(RemoteOptions {
            user: Some("etce".to_string()),
            port: Some(2222),
            ..Default::default()
        });
        let (program, args) = c.execute_args("node-b", "fieldctl host stop /tmp/etce/field.lock");
        assert_eq!(program, "ssh");
        assert_eq!(
            args,
            vec![
                "-o",
                "StrictHostKeyChecking=yes",
                "-o",
                "BatchMode=yes",
                "-p",
                "2222",
                "etce@node-b",
                "fieldctl host stop /tmp/etce/field.lock",
            ]
        );
    }

    #[test]
    fn test_put_args_with_password() {
        let c = client(RemoteOptions {
            password: Some("secret".to_string()),
            port: Some(2222),
            policy: HostKeyPolicy::Autoadd,
            ..Default::default()
        });
        let (program, args) = c.put_args(Path::new("/tmp/etce/plan.yaml"), "/tmp/etce/", "node-b");
        assert_eq!(program, "sshpass");
        assert_eq!(
            args,
            vec![
                "-p",
                "secret",
                "scp",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-P",
                "2222",
                "/tmp/etce/plan.yaml",
                "node-b:/tmp/etce/",
            ]
        );
    }

    #[test]
    fn test_collect_args_per_host_directory() {
        let c = client(RemoteOptions {
            policy: HostKeyPolicy::Warning,
            ..Default::default()
        });
        let (_, args) = c.collect_args("data", Path::new("/tmp/etce/data/run"), "node-c");
        assert_eq!(args[1], "StrictHostKeyChecking=no");
        assert_eq!(args[args.len() - 3..], ["-r", "node-c:data", "/tmp/etce/data/run/node-c"]);
    }

    #[tokio::test]
    async fn test_unreachable_tool_reports_failure() {
        let result = run("/nonexistent/field-ssh", &[]).await;
        assert!(!result.is_success());
    }
}
