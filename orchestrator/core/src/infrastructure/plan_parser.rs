// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field Plan YAML Parser
//!
//! Loads a plan file once at the command boundary and keeps its verbatim
//! text alongside the parsed document, so the lock file records exactly what
//! was started.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML → Domain objects

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::domain::plan::{PlanDocument, PlanFile};

pub struct PlanParser;

impl PlanParser {
    /// Parse a plan document from YAML text
    pub fn parse_yaml(yaml: &str) -> Result<PlanDocument> {
        PlanDocument::from_yaml_str(yaml).map_err(|e| anyhow!("Plan validation failed: {}", e))
    }

    /// Load a plan file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<PlanFile> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {:?}", path))?;

        PlanFile::from_contents(path, yaml)
            .map_err(|e| anyhow!("Plan validation failed for {:?}: {}", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PLAN: &str = r#"
hosts:
  - hostname: node-a
    root_directory: /tmp/etce/field
    bridges:
      br0: { subnet: 10.0.0.0/24 }
    containers:
      - name: n1
        image: etce/node:1
        interfaces:
          - { bridge: br0, ipv4: 10.0.0.1 }
"#;

    #[test]
    fn test_parse_file_keeps_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PLAN.as_bytes()).unwrap();

        let plan = PlanParser::parse_file(file.path()).unwrap();
        assert_eq!(plan.contents, PLAN);
        assert_eq!(plan.document.containers("node-a").len(), 1);
        assert_eq!(plan.path(), file.path());
    }

    #[test]
    fn test_missing_file() {
        let err = PlanParser::parse_file("/nonexistent/plan.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read plan file"));
    }

    #[test]
    fn test_invalid_plan() {
        let err = PlanParser::parse_yaml("hosts: []").unwrap_err();
        assert!(err.to_string().contains("Plan validation failed"));
    }
}
