// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::field::FieldError;
use crate::domain::field_hosts::FIELD_HOST_FILE_NAME;
use crate::domain::state::FieldStateStore;

/// Name of the hosts snapshot inside the work directory.
pub const HOSTS_SNAPSHOT_NAME: &str = "hosts";

/// Lock file, hosts snapshot and field host file inside a work directory,
/// plus the system hosts file.
pub struct FsFieldStateStore {
    work_directory: PathBuf,
    lock_file_name: String,
    hosts_file: PathBuf,
}

impl FsFieldStateStore {
    pub fn new(
        work_directory: impl Into<PathBuf>,
        lock_file_name: impl Into<String>,
        hosts_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            work_directory: work_directory.into(),
            lock_file_name: lock_file_name.into(),
            hosts_file: hosts_file.into(),
        }
    }

    fn read_optional(path: &PathBuf) -> Result<Option<String>, FieldError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FieldError::io(path, e)),
        }
    }
}

impl FieldStateStore for FsFieldStateStore {
    fn work_directory_exists(&self) -> bool {
        self.work_directory.is_dir()
    }

    fn lock_exists(&self) -> bool {
        self.lock_path().exists()
    }

    fn load_lock(&self) -> Result<Option<String>, FieldError> {
        Self::read_optional(&self.lock_path())
    }

    fn store_lock(&self, plan: &str) -> Result<(), FieldError> {
        let path = self.lock_path();
        debug!(lock = %path.display(), "Writing lock file");
        fs::write(&path, plan).map_err(|e| FieldError::io(&path, e))
    }

    fn remove_lock(&self) -> Result<(), FieldError> {
        let path = self.lock_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FieldError::io(&path, e)),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.work_directory.join(&self.lock_file_name)
    }

    fn load_hosts(&self) -> Result<String, FieldError> {
        Ok(Self::read_optional(&self.hosts_file)?.unwrap_or_default())
    }

    fn store_hosts(&self, contents: &str) -> Result<(), FieldError> {
        fs::write(&self.hosts_file, contents).map_err(|e| FieldError::io(&self.hosts_file, e))
    }

    fn snapshot_hosts(&self) -> Result<PathBuf, FieldError> {
        let snapshot = self.work_directory.join(HOSTS_SNAPSHOT_NAME);
        fs::copy(&self.hosts_file, &snapshot).map_err(|e| FieldError::io(&snapshot, e))?;
        Ok(snapshot)
    }

    fn load_field_host_file(&self) -> Result<Option<String>, FieldError> {
        Self::read_optional(&self.work_directory.join(FIELD_HOST_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> FsFieldStateStore {
        FsFieldStateStore::new(dir.path(), "field.lock", dir.path().join("etc-hosts"))
    }

    #[test]
    fn test_lock_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        assert!(store.work_directory_exists());
        assert!(!store.lock_exists());
        assert_eq!(store.load_lock().unwrap(), None);

        store.store_lock("hosts: []\n").unwrap();
        assert!(store.lock_exists());
        assert_eq!(store.load_lock().unwrap().as_deref(), Some("hosts: []\n"));

        store.remove_lock().unwrap();
        assert!(!store.lock_exists());
        store.remove_lock().unwrap();
    }

    #[test]
    fn test_missing_hosts_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store(&dir).load_hosts().unwrap(), "");
    }

    #[test]
    fn test_snapshot_copies_hosts_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.store_hosts("127.0.0.1 localhost\n").unwrap();

        let snapshot = store.snapshot_hosts().unwrap();
        assert_eq!(snapshot, dir.path().join(HOSTS_SNAPSHOT_NAME));
        assert_eq!(fs::read_to_string(snapshot).unwrap(), "127.0.0.1 localhost\n");
    }

    #[test]
    fn test_field_host_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert_eq!(store.load_field_host_file().unwrap(), None);

        fs::write(dir.path().join(FIELD_HOST_FILE_NAME), "node-a { n1 }\n").unwrap();
        assert_eq!(
            store.load_field_host_file().unwrap().as_deref(),
            Some("node-a { n1 }\n")
        );
    }

    #[test]
    fn test_missing_work_directory() {
        let store = FsFieldStateStore::new("/nonexistent/etce", "field.lock", "/nonexistent/hosts");
        assert!(!store.work_directory_exists());
    }
}
