//! Cluster health probe.
//!
//! Lists nodes through the control plane and checks that every expected node
//! is present. Any failure to list nodes counts as unhealthy: the remediation
//! path is the safe default when health cannot be proven.

use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::inventory::ExpectedNodeSet;

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// The cluster is not provably healthy. Carries the raw listing output.
    Unhealthy { raw_output: String, missing: Vec<String> },
}

impl HealthVerdict {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// First-column identifiers of a node table, skipping the header row.
#[must_use]
pub fn parse_node_identifiers(output: &str) -> Vec<&str> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .collect()
}

/// Expected nodes that do not appear in the listing.
#[must_use]
pub fn missing_nodes(expected: &ExpectedNodeSet, listing: &str) -> Vec<String> {
    let seen = parse_node_identifiers(listing);
    expected
        .iter()
        .filter(|node| !seen.contains(node))
        .map(str::to_string)
        .collect()
}

/// Probes the cluster control plane.
pub struct HealthProber<'a> {
    runner: &'a dyn CommandRunner,
    list_nodes: &'a CommandSpec,
}

impl<'a> HealthProber<'a> {
    pub fn new(runner: &'a dyn CommandRunner, list_nodes: &'a CommandSpec) -> Self {
        Self { runner, list_nodes }
    }

    pub async fn probe(&self, expected: &ExpectedNodeSet) -> HealthVerdict {
        let result = self.runner.run(self.list_nodes).await;

        if !result.succeeded() {
            warn!(
                command = %self.list_nodes,
                status = %result.status,
                "Node listing failed, treating cluster as unhealthy"
            );
            return HealthVerdict::Unhealthy {
                raw_output: result.output,
                missing: expected.iter().map(str::to_string).collect(),
            };
        }

        let missing = missing_nodes(expected, &result.output);
        if missing.is_empty() {
            info!(nodes = expected.len(), "All expected nodes present");
            HealthVerdict::Healthy
        } else {
            debug!(output = %result.output, "Node listing");
            info!(?missing, "Cluster is missing expected nodes");
            HealthVerdict::Unhealthy {
                raw_output: result.output,
                missing,
            }
        }
    }
}
