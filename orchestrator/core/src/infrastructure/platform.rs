// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::domain::field::FieldError;
use crate::domain::platform::{short_hostname, Platform};

/// The running Linux host.
pub struct LinuxPlatform {
    hostname: String,
}

impl LinuxPlatform {
    pub fn new() -> Result<Self, FieldError> {
        let raw = hostname::get()
            .map_err(|e| FieldError::Platform(format!("Cannot read hostname: {}", e)))?;
        Ok(Self {
            hostname: short_hostname(&raw.to_string_lossy()),
        })
    }

    /// Use a fixed hostname instead of the system one.
    pub fn with_hostname(hostname: &str) -> Self {
        Self {
            hostname: short_hostname(hostname),
        }
    }
}

#[async_trait]
impl Platform for LinuxPlatform {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    async fn set_kernel_parameter(&self, name: &str, value: &str) -> Result<(), FieldError> {
        let setting = format!("{}={}", name, value);
        info!("sysctl -w {}", setting);

        let output = Command::new("sysctl")
            .args(["-w", &setting])
            .output()
            .await
            .map_err(|e| FieldError::Platform(format!("Failed to run sysctl: {}", e)))?;

        if !output.status.success() {
            return Err(FieldError::Platform(format!(
                "sysctl -w {}: {}",
                setting,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hostname_is_normalised() {
        assert_eq!(LinuxPlatform::with_hostname("Node-A.lab").hostname(), "node-a");
    }

    #[test]
    fn test_system_hostname() {
        let platform = LinuxPlatform::new().unwrap();
        assert!(!platform.hostname().is_empty());
        assert!(!platform.hostname().contains('.'));
    }
}
