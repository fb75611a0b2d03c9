// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Field Configuration
//
// Host-local settings for the field controller:
// - Work directory holding the lock file and the hosts snapshot
// - Control network block used for control-address allocation
// - System hosts file location
// - Container engine socket
// - Command remote peers run to drive their half of the field

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::network::{ControlNetwork, DEFAULT_CONTROL_CIDR};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Directory holding the lock file, hosts snapshot and default plan.
    /// `WORKDIR` overrides it.
    #[serde(default = "default_work_directory")]
    pub work_directory: PathBuf,

    /// Control network block. `CIDR` overrides it.
    #[serde(default = "default_control_cidr")]
    pub control_cidr: String,

    /// System hosts file the controller merges its block into.
    #[serde(default = "default_hosts_file")]
    pub hosts_file: PathBuf,

    /// Lock file name inside the work directory.
    #[serde(default = "default_lock_file_name")]
    pub lock_file_name: String,

    /// Plan file name used when none is given on the command line.
    #[serde(default = "default_plan_file_name")]
    pub plan_file_name: String,

    /// Docker socket path. Auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_socket: Option<String>,

    /// Executable remote hosts invoke for `host start|stop`.
    #[serde(default = "default_remote_command")]
    pub remote_command: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            work_directory: default_work_directory(),
            control_cidr: default_control_cidr(),
            hosts_file: default_hosts_file(),
            lock_file_name: default_lock_file_name(),
            plan_file_name: default_plan_file_name(),
            docker_socket: None,
            remote_command: default_remote_command(),
        }
    }
}

impl FieldConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. FIELD_CONFIG_PATH environment variable
    /// 2. ./field-config.yaml (working directory)
    /// 3. ~/.field/config.yaml (user home)
    /// 4. /etc/field/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FIELD_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./field-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".field").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/field/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(path)?
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `WORKDIR` and `CIDR` from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::var("WORKDIR").ok(), std::env::var("CIDR").ok());
    }

    fn apply_overrides(&mut self, workdir: Option<String>, cidr: Option<String>) {
        if let Some(workdir) = workdir.filter(|w| !w.is_empty()) {
            tracing::info!("Environment override: WORKDIR={}", workdir);
            self.work_directory = PathBuf::from(workdir);
        }
        if let Some(cidr) = cidr.filter(|c| !c.is_empty()) {
            tracing::info!("Environment override: CIDR={}", cidr);
            self.control_cidr = cidr;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.control_network()?;

        if self.lock_file_name.is_empty() || self.lock_file_name.contains('/') {
            anyhow::bail!("lock_file_name must be a plain file name, got '{}'", self.lock_file_name);
        }

        if self.remote_command.trim().is_empty() {
            anyhow::bail!("remote_command cannot be empty");
        }

        Ok(())
    }

    pub fn control_network(&self) -> anyhow::Result<ControlNetwork> {
        self.control_cidr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid control_cidr: {}", e))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.work_directory.join(&self.lock_file_name)
    }

    pub fn default_plan_file(&self) -> PathBuf {
        self.work_directory.join(&self.plan_file_name)
    }

    /// Resolve a plan argument: relative names live in the work directory.
    pub fn resolve_plan_path(&self, plan: Option<&Path>) -> PathBuf {
        match plan {
            Some(p) if p.is_absolute() || p.exists() => p.to_path_buf(),
            Some(p) => self.work_directory.join(p),
            None => self.default_plan_file(),
        }
    }
}

fn default_work_directory() -> PathBuf {
    PathBuf::from("/tmp/etce")
}

fn default_control_cidr() -> String {
    DEFAULT_CONTROL_CIDR.to_string()
}

fn default_hosts_file() -> PathBuf {
    PathBuf::from("/etc/hosts")
}

fn default_lock_file_name() -> String {
    "field.lock".to_string()
}

fn default_plan_file_name() -> String {
    "fieldplan.yaml".to_string()
}

fn default_remote_command() -> String {
    "fieldctl".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FieldConfig::default();
        assert_eq!(config.control_cidr, "10.99.0.0/16");
        assert_eq!(config.lock_file(), PathBuf::from("/tmp/etce/field.lock"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = FieldConfig::from_yaml_str("work_directory: /var/field\n").unwrap();
        assert_eq!(config.work_directory, PathBuf::from("/var/field"));
        assert_eq!(config.hosts_file, PathBuf::from("/etc/hosts"));
        assert_eq!(config.remote_command, "fieldctl");
    }

    #[test]
    fn test_overrides() {
        let mut config = FieldConfig::default();
        config.apply_overrides(Some("/opt/work".to_string()), Some("10.50.0.0/24".to_string()));
        assert_eq!(config.work_directory, PathBuf::from("/opt/work"));
        assert_eq!(config.control_network().unwrap().prefix(), 24);

        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.work_directory, PathBuf::from("/opt/work"));
    }

    #[test]
    fn test_validation() {
        let mut config = FieldConfig::default();
        config.control_cidr = "not-a-cidr".to_string();
        assert!(config.validate().is_err());

        config = FieldConfig::default();
        config.lock_file_name = "a/b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_plan_path() {
        let config = FieldConfig::default();
        assert_eq!(
            config.resolve_plan_path(None),
            PathBuf::from("/tmp/etce/fieldplan.yaml")
        );
        assert_eq!(
            config.resolve_plan_path(Some(Path::new("/abs/plan.yaml"))),
            PathBuf::from("/abs/plan.yaml")
        );
        assert_eq!(
            config.resolve_plan_path(Some(Path::new("no-such-plan.yaml"))),
            PathBuf::from("/tmp/etce/no-such-plan.yaml")
        );
    }
}
