// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hosts-file block merge.
//!
//! The field owns one region of the system hosts file, delimited by
//! [`OPEN_MARKER`] and [`CLOSE_MARKER`]. Merging replaces that region and
//! keeps every line before it untouched. Applying the same block twice yields
//! byte-identical output.

use std::net::IpAddr;

use crate::domain::plan::{Container, HostsEntry};

pub const OPEN_MARKER: &str = "#### Start auto-generated ETCE control mappings";
pub const CLOSE_MARKER: &str = "#### Stop auto-generated ETCE control mappings";

/// Contents of the machine-owned region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostsBlock {
    /// `(address, hostname)` for field hosts, kept in plan order.
    hosts: Vec<(IpAddr, String)>,
    ipv4: Vec<HostsEntry>,
    ipv6: Vec<HostsEntry>,
}

impl HostsBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, address: IpAddr, hostname: impl Into<String>) -> Self {
        self.hosts.push((address, hostname.into()));
        self
    }

    /// Add a container name mapping. IPv6 addresses go to the IPv6 section.
    pub fn entry(mut self, name: impl Into<String>, address: IpAddr) -> Self {
        let entry = HostsEntry {
            name: name.into(),
            address,
        };
        match address {
            IpAddr::V4(_) => self.ipv4.push(entry),
            IpAddr::V6(_) => self.ipv6.push(entry),
        }
        self
    }

    /// The hosts entries declared by a set of containers.
    pub fn from_containers<'a>(containers: impl IntoIterator<Item = &'a Container>) -> Self {
        let mut block = Self::new();
        for container in containers {
            block.ipv4.extend(container.hosts_entries_ipv4.iter().cloned());
            block.ipv6.extend(container.hosts_entries_ipv6.iter().cloned());
        }
        block
    }

    /// The region currently held in `text`, one host line per mapping in
    /// file order. Lines that are not `address name` are skipped.
    pub fn parse(text: &str) -> Self {
        let mut block = Self::new();
        let region = text
            .lines()
            .skip_while(|line| !line.starts_with(OPEN_MARKER))
            .skip(1)
            .take_while(|line| !line.starts_with(CLOSE_MARKER));

        for line in region {
            let mut fields = line.split_whitespace();
            if let (Some(address), Some(name)) = (fields.next(), fields.next()) {
                if let Ok(address) = address.parse() {
                    block.hosts.push((address, name.to_string()));
                }
            }
        }
        block
    }

    /// Add the mappings of `other` that this block does not hold yet.
    pub fn union(mut self, other: &HostsBlock) -> Self {
        for (address, hostname) in &other.hosts {
            if !self.contains(*address, hostname) {
                self.hosts.push((*address, hostname.clone()));
            }
        }
        for entry in other.ipv4.iter().chain(&other.ipv6) {
            if !self.contains(entry.address, &entry.name) {
                self = self.entry(entry.name.clone(), entry.address);
            }
        }
        self
    }

    fn contains(&self, address: IpAddr, name: &str) -> bool {
        self.hosts.iter().any(|(a, n)| *a == address && n == name)
            || self
                .ipv4
                .iter()
                .chain(&self.ipv6)
                .any(|e| e.address == address && e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(OPEN_MARKER);
        out.push('\n');

        for (address, hostname) in &self.hosts {
            out.push_str(&format!("{} {}\n", address, hostname));
        }

        for section in [&self.ipv4, &self.ipv6] {
            let mut sorted: Vec<&HostsEntry> = section.iter().collect();
            sorted.sort();
            for entry in sorted {
                out.push_str(&format!("{} {}\n", entry.address, entry.name));
            }
        }

        out.push_str(CLOSE_MARKER);
        out.push('\n');
        out
    }
}

/// Replace the machine-owned region of `current` with `block`.
///
/// Lines preceding the open marker are kept in order; everything from the
/// open marker to the end of the file is discarded, close marker or not.
/// Trailing blank lines are trimmed, then one blank line separates the kept
/// lines from the new region, which is always written last.
pub fn merge(current: &str, block: &HostsBlock) -> String {
    let mut retained: Vec<&str> = current
        .lines()
        .take_while(|line| !line.starts_with(OPEN_MARKER))
        .collect();

    while retained.last().is_some_and(|l| l.trim().is_empty()) {
        retained.pop();
    }

    let mut out = String::with_capacity(current.len() + 256);
    for line in retained {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&block.render());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const SYSTEM: &str = "127.0.0.1 localhost\n::1 localhost ip6-localhost\n\n\n";

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    fn block() -> HostsBlock {
        HostsBlock::new()
            .host(v4(192, 168, 1, 2), "node-b")
            .host(v4(192, 168, 1, 1), "node-a")
            .entry("n2", v4(10, 99, 0, 2))
            .entry("n1", v4(10, 99, 0, 1))
            .entry("v6node", IpAddr::V6(Ipv6Addr::LOCALHOST))
    }

    #[test]
    fn test_merge_layout() {
        let merged = merge(SYSTEM, &block());
        let expected = format!(
            "127.0.0.1 localhost\n::1 localhost ip6-localhost\n\n{}\n\
             192.168.1.2 node-b\n192.168.1.1 node-a\n\
             10.99.0.1 n1\n10.99.0.2 n2\n::1 v6node\n{}\n",
            OPEN_MARKER, CLOSE_MARKER
        );
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge(SYSTEM, &block());
        let twice = merge(&once, &block());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_replaces_previous_block() {
        let first = merge(SYSTEM, &block());
        let replacement = HostsBlock::new().entry("other", v4(10, 99, 0, 9));
        let second = merge(&first, &replacement);
        assert!(!second.contains("n1"));
        assert!(second.contains("10.99.0.9 other\n"));
        assert_eq!(second.matches(OPEN_MARKER).count(), 1);
    }

    #[test]
    fn test_lines_after_open_marker_are_dropped() {
        let current = format!(
            "127.0.0.1 localhost\n\n{}\n10.0.0.1 old\n{}\n10.1.1.1 trailing\n",
            OPEN_MARKER, CLOSE_MARKER
        );
        let merged = merge(&current, &HostsBlock::new());
        assert_eq!(
            merged,
            format!("127.0.0.1 localhost\n\n{}\n{}\n", OPEN_MARKER, CLOSE_MARKER)
        );
        assert_eq!(merge(&merged, &HostsBlock::new()), merged);
    }

    #[test]
    fn test_unterminated_block_runs_to_eof() {
        let broken = format!("127.0.0.1 localhost\n{}\n10.0.0.1 stale\n", OPEN_MARKER);
        let merged = merge(&broken, &HostsBlock::new());
        assert!(!merged.contains("stale"));
        assert_eq!(
            merged,
            format!("127.0.0.1 localhost\n\n{}\n{}\n", OPEN_MARKER, CLOSE_MARKER)
        );
    }

    #[test]
    fn test_missing_trailing_newline() {
        let merged = merge("127.0.0.1 localhost", &block());
        assert_eq!(merge(&merged, &block()), merged);
        assert!(merged.starts_with("127.0.0.1 localhost\n\n"));
    }

    #[test]
    fn test_empty_file() {
        let merged = merge("", &HostsBlock::new());
        assert_eq!(merged, format!("\n{}\n{}\n", OPEN_MARKER, CLOSE_MARKER));
        assert_eq!(merge(&merged, &HostsBlock::new()), merged);
    }

    #[test]
    fn test_union_extends_existing_region() {
        let current = merge(SYSTEM, &block());
        let extra = HostsBlock::new()
            .entry("radio-2", v4(10, 0, 0, 2))
            .entry("n1", v4(10, 99, 0, 1));
        let extended = merge(&current, &HostsBlock::parse(&current).union(&extra));

        assert!(extended.contains("192.168.1.2 node-b\n"));
        assert!(extended.contains("10.99.0.1 n1\n"));
        assert!(extended.contains("10.0.0.2 radio-2\n"));
        assert_eq!(extended.matches("10.99.0.1 n1").count(), 1);

        let again = merge(&extended, &HostsBlock::parse(&extended).union(&extra));
        assert_eq!(again, extended);
    }

    #[test]
    fn test_parse_without_region_is_empty() {
        assert!(HostsBlock::parse(SYSTEM).is_empty());
    }

    #[test]
    fn test_from_containers_splits_families() {
        let yaml = r#"
name: n1
hosts_entries_ipv4:
  - { name: zeta, address: 10.0.0.9 }
  - { name: alpha, address: 10.0.0.8 }
hosts_entries_ipv6:
  - { name: six, address: "fd00::6" }
"#;
        let container: Container = serde_yaml::from_str(yaml).unwrap();
        let merged = merge("", &HostsBlock::from_containers([&container]));
        let body: Vec<&str> = merged.lines().skip(2).take(3).collect();
        assert_eq!(body, vec!["10.0.0.8 alpha", "10.0.0.9 zeta", "fd00::6 six"]);
    }
}
