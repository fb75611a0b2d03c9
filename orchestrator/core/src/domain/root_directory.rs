// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Root Directory Domain Type
//!
//! Every host's containers live below one root directory, which the agent
//! may delete and recreate on start.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Validated container root directory

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::domain::field::FieldError;

/// Top-level directories a root directory may live under.
pub const ALLOWED_ROOTS: [&str; 5] = ["tmp", "opt", "home", "var", "mnt"];

/// Minimum number of path segments below `/`.
pub const MIN_DEPTH: usize = 3;

/// An absolute directory at least three levels deep inside one of
/// [`ALLOWED_ROOTS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootDirectory(PathBuf);

impl RootDirectory {
    /// Validate and wrap a root directory path.
    ///
    /// ```
    /// use field_core::domain::root_directory::RootDirectory;
    ///
    /// assert!(RootDirectory::parse("/opt/a/b").is_ok());
    /// assert!(RootDirectory::parse("opt/a/b").is_err());
    /// assert!(RootDirectory::parse("/opt/a").is_err());
    /// assert!(RootDirectory::parse("/srv/a/b").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, FieldError> {
        let path = Path::new(raw);

        if !path.is_absolute() {
            return Err(FieldError::Configuration(format!(
                "root_directory \"{}\" is not an absolute path",
                raw
            )));
        }

        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(FieldError::Configuration(format!(
                        "root_directory \"{}\" must not contain '..'",
                        raw
                    )));
                }
            }
        }

        if segments.len() < MIN_DEPTH {
            return Err(FieldError::Configuration(format!(
                "root_directory \"{}\" is less than {} levels deep",
                raw, MIN_DEPTH
            )));
        }

        if !ALLOWED_ROOTS.contains(&segments[0].as_str()) {
            return Err(FieldError::Configuration(format!(
                "root_directory \"{}\" is not located in one of {{{}}} directory trees",
                raw,
                ALLOWED_ROOTS.join(", ")
            )));
        }

        Ok(Self(path.to_path_buf()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn join(&self, child: impl AsRef<Path>) -> PathBuf {
        self.0.join(child)
    }
}

impl fmt::Display for RootDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl Serialize for RootDirectory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string_lossy())
    }
}

impl<'de> Deserialize<'de> for RootDirectory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RootDirectory::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_three_levels_under_allowed_root() {
        let root = RootDirectory::parse("/opt/a/b").unwrap();
        assert_eq!(root.as_path(), Path::new("/opt/a/b"));
        assert_eq!(root.join("node1"), PathBuf::from("/opt/a/b/node1"));
    }

    #[test]
    fn test_rejects_relative() {
        let err = RootDirectory::parse("opt/a/b").unwrap_err();
        assert!(matches!(err, FieldError::Configuration(_)));
    }

    #[test]
    fn test_rejects_shallow() {
        assert!(matches!(
            RootDirectory::parse("/opt/a").unwrap_err(),
            FieldError::Configuration(_)
        ));
        assert!(RootDirectory::parse("/tmp").is_err());
    }

    #[test]
    fn test_rejects_disallowed_root() {
        let err = RootDirectory::parse("/srv/a/b").unwrap_err();
        assert!(err.to_string().contains("tmp, opt, home, var, mnt"));
    }

    #[test]
    fn test_rejects_parent_components() {
        assert!(RootDirectory::parse("/tmp/a/../b").is_err());
    }

    #[test]
    fn test_all_allowed_roots() {
        for root in ALLOWED_ROOTS {
            assert!(RootDirectory::parse(&format!("/{}/x/y", root)).is_ok());
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<RootDirectory, _> = serde_yaml::from_str("/var/field/run");
        assert!(ok.is_ok());
        let bad: Result<RootDirectory, _> = serde_yaml::from_str("/etc/field/run");
        assert!(bad.is_err());
    }
}
