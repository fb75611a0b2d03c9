// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field host file.
//!
//! Lists the hosts that hold the filesystems of the field's virtual nodes.
//! Each root may be followed by a braced list of the nodes it hosts:
//!
//! ```text
//! # roots and their nodes
//! node-a { n1 n2 }
//! node-b {
//!     n3
//! }
//! node-c
//! ```

use crate::domain::field::FieldError;

/// File name of the field host file inside the work directory.
pub const FIELD_HOST_FILE_NAME: &str = "HOSTFILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRoot {
    pub name: String,
    pub nodes: Vec<String>,
}

/// Parse a field host file into its roots, in file order.
pub fn parse(text: &str) -> Result<Vec<FieldRoot>, FieldError> {
    let mut roots: Vec<FieldRoot> = Vec::new();
    let mut open = false;

    for token in tokens(text) {
        match token {
            "{" => {
                if open || roots.is_empty() {
                    return Err(FieldError::Plan(format!(
                        "{}: unexpected '{{'",
                        FIELD_HOST_FILE_NAME
                    )));
                }
                open = true;
            }
            "}" => {
                if !open {
                    return Err(FieldError::Plan(format!(
                        "{}: unexpected '}}'",
                        FIELD_HOST_FILE_NAME
                    )));
                }
                open = false;
            }
            name if open => {
                if let Some(root) = roots.last_mut() {
                    root.nodes.push(name.to_string());
                }
            }
            name => roots.push(FieldRoot {
                name: name.to_string(),
                nodes: Vec::new(),
            }),
        }
    }

    if open {
        return Err(FieldError::Plan(format!(
            "{}: unterminated '{{'",
            FIELD_HOST_FILE_NAME
        )));
    }

    Ok(roots)
}

/// Names of the root hosts.
pub fn roots(text: &str) -> Result<Vec<String>, FieldError> {
    Ok(parse(text)?.into_iter().map(|r| r.name).collect())
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split_inclusive(['{', '}']))
        .flat_map(|chunk| {
            let (body, brace) = match chunk.strip_suffix('{') {
                Some(body) => (body, Some("{")),
                None => match chunk.strip_suffix('}') {
                    Some(body) => (body, Some("}")),
                    None => (chunk, None),
                },
            };
            body.split_whitespace().chain(brace)
        })
}
