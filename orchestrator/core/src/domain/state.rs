// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::path::PathBuf;

use crate::domain::field::FieldError;

/// The process-wide mutable files a field owns: the lock file for its work
/// directory and the system hosts file.
///
/// Neither is protected by OS-level locking; callers serialise access.
pub trait FieldStateStore: Send + Sync {
    fn work_directory_exists(&self) -> bool;

    fn lock_exists(&self) -> bool;

    /// Lock contents, `None` when no field is active.
    fn load_lock(&self) -> Result<Option<String>, FieldError>;

    fn store_lock(&self, plan: &str) -> Result<(), FieldError>;

    /// Delete the lock. Deleting an absent lock succeeds.
    fn remove_lock(&self) -> Result<(), FieldError>;

    fn lock_path(&self) -> PathBuf;

    fn load_hosts(&self) -> Result<String, FieldError>;

    fn store_hosts(&self, contents: &str) -> Result<(), FieldError>;

    /// Copy the current hosts file next to the lock for distribution to peers.
    fn snapshot_hosts(&self) -> Result<PathBuf, FieldError>;

    /// Contents of the field host file, `None` when the work directory has none.
    fn load_field_host_file(&self) -> Result<Option<String>, FieldError>;
}
