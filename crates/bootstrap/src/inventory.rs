//! Expected node set, read from the Ansible inventory.
//!
//! Hosts in the inventory carry their node name as a trailing comment:
//!
//! ```text
//! [master]
//! 192.168.68.51 # klust1
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::{BootstrapError, Result};

/// Node identifiers that must all report in for the cluster to be healthy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedNodeSet(BTreeSet<String>);

impl ExpectedNodeSet {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(nodes.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extract node names from inventory text.
///
/// A line contributes the trimmed text after its first `#`, unless the `#`
/// starts the line (a plain comment).
#[must_use]
pub fn parse_expected_nodes(text: &str) -> ExpectedNodeSet {
    let nodes = text.lines().filter_map(|line| {
        let index = line.find('#')?;
        if index == 0 {
            return None;
        }
        let name = line[index + 1..].trim();
        (!name.is_empty()).then(|| name.to_string())
    });
    ExpectedNodeSet::new(nodes)
}

/// Load the expected node set from an inventory file.
pub fn load_expected_nodes(path: &Path) -> Result<ExpectedNodeSet> {
    let text = std::fs::read_to_string(path)?;
    let nodes = parse_expected_nodes(&text);
    if nodes.is_empty() {
        return Err(BootstrapError::Config(format!(
            "inventory {} names no nodes",
            path.display()
        )));
    }
    debug!(path = %path.display(), count = nodes.len(), "Loaded expected nodes");
    Ok(nodes)
}
