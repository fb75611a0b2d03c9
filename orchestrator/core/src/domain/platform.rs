// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use crate::domain::field::FieldError;

/// Host facts and kernel tuning.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Short, lower-cased hostname as it appears in plans.
    fn hostname(&self) -> String;

    async fn set_kernel_parameter(&self, name: &str, value: &str) -> Result<(), FieldError>;
}

/// Normalise a raw hostname to the form plans use.
pub fn short_hostname(raw: &str) -> String {
    raw.split('.').next().unwrap_or(raw).to_lowercase()
}
