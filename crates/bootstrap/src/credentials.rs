//! Cluster credential installation.
//!
//! After a successful build the kubeconfig is pulled from the control-plane
//! host and pointed at the cluster's LAN address. The steps run in a fixed
//! order; a cursor file records the completed ones so a later pass for the
//! same ticket resumes after the last success instead of starting over.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{ClusterConfig, CredentialsConfig};
use crate::error::{BootstrapError, Result};

/// Cursor file name inside the state directory.
const CURSOR_FILE: &str = "credential-cursor.json";

/// Credential install steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStep {
    /// Create the local credential directory.
    CreateLocalDir,
    /// Make the remote credential file readable for the copy.
    RelaxRemotePermissions,
    /// Copy the credential file to the local path.
    CopyCredentials,
    /// Restore owner-only permissions on the remote file.
    RestoreRemotePermissions,
    /// Replace the loopback address with the LAN address.
    RewriteServerAddress,
}

impl InstallStep {
    pub const ALL: [Self; 5] = [
        Self::CreateLocalDir,
        Self::RelaxRemotePermissions,
        Self::CopyCredentials,
        Self::RestoreRemotePermissions,
        Self::RewriteServerAddress,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateLocalDir => "mkdir",
            Self::RelaxRemotePermissions => "chmod",
            Self::CopyCredentials => "scp",
            Self::RestoreRemotePermissions => "chmod back",
            Self::RewriteServerAddress => "rewrite address",
        }
    }
}

/// Whether the pipeline continues from a saved cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Discard any saved progress; the cluster was just rebuilt.
    Fresh,
    /// Skip the steps a previous pass completed for this ticket.
    Resume,
}

/// Persisted progress of the credential pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCursor {
    /// Ticket the progress belongs to.
    pub ticket: u64,
    /// Steps that already succeeded.
    pub completed: Vec<InstallStep>,
    /// Timestamp of last update.
    pub updated_at: String,
}

impl CredentialCursor {
    #[must_use]
    pub fn new(ticket: u64) -> Self {
        Self {
            ticket,
            completed: Vec::new(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[must_use]
    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(CURSOR_FILE)
    }

    /// Load the cursor, if one was saved.
    pub fn load(state_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(state_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let cursor: Self = serde_json::from_str(&content)?;
        debug!(ticket = cursor.ticket, completed = ?cursor.completed, "Loaded credential cursor");
        Ok(Some(cursor))
    }

    pub fn save(&mut self, state_dir: &Path) -> Result<()> {
        self.updated_at = chrono::Utc::now().to_rfc3339();
        std::fs::create_dir_all(state_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(state_dir), content)?;
        Ok(())
    }

    pub fn clear(state_dir: &Path) -> Result<()> {
        let path = Self::path(state_dir);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_done(&self, step: InstallStep) -> bool {
        self.completed.contains(&step)
    }
}

/// Runs the credential install steps.
pub struct CredentialInstaller<'a> {
    runner: &'a dyn CommandRunner,
    cluster: &'a ClusterConfig,
    paths: &'a CredentialsConfig,
}

impl<'a> CredentialInstaller<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        cluster: &'a ClusterConfig,
        paths: &'a CredentialsConfig,
    ) -> Self {
        Self {
            runner,
            cluster,
            paths,
        }
    }

    /// Command executed for a step.
    #[must_use]
    pub fn command(&self, step: InstallStep) -> CommandSpec {
        let host = self.cluster.control_plane_address.as_str();
        let remote = self.paths.remote_path.as_str();
        let local = self.paths.local_path.display().to_string();

        match step {
            InstallStep::CreateLocalDir => CommandSpec::new(
                "mkdir",
                ["-p".to_string(), self.paths.local_dir.display().to_string()],
            ),
            InstallStep::RelaxRemotePermissions => {
                CommandSpec::new("ssh", [host, "sudo", "chmod", "644", remote])
            }
            InstallStep::CopyCredentials => {
                CommandSpec::new("scp", [format!("{host}:{remote}"), local])
            }
            InstallStep::RestoreRemotePermissions => {
                CommandSpec::new("ssh", [host, "sudo", "chmod", "600", remote])
            }
            InstallStep::RewriteServerAddress => CommandSpec::new(
                "sed",
                [
                    "-i".to_string(),
                    format!(
                        "s|{}|{}|g",
                        self.cluster.loopback_address, self.cluster.lan_address
                    ),
                    local,
                ],
            ),
        }
    }

    /// Run the pipeline for a ticket. Stops at the first failing step.
    pub async fn install(&self, ticket: u64, mode: InstallMode) -> Result<()> {
        let state_dir = self.paths.state_dir.as_path();

        let mut cursor = match (mode, CredentialCursor::load(state_dir)?) {
            (InstallMode::Resume, Some(cursor)) if cursor.ticket == ticket => cursor,
            (_, Some(stale)) => {
                debug!(ticket = stale.ticket, "Discarding credential cursor");
                CredentialCursor::new(ticket)
            }
            (_, None) => CredentialCursor::new(ticket),
        };

        for step in InstallStep::ALL {
            if cursor.is_done(step) {
                info!(step = step.name(), "Credential step already complete, skipping");
                continue;
            }

            let spec = self.command(step);
            let result = self.runner.run(&spec).await;
            if !result.succeeded() {
                warn!(
                    step = step.name(),
                    command = %spec,
                    status = %result.status,
                    output = %result.output,
                    "Credential step failed"
                );
                cursor.save(state_dir)?;
                return Err(BootstrapError::CredentialStep {
                    step: step.name(),
                    status: result.status.to_string(),
                    output: result.output,
                });
            }

            cursor.completed.push(step);
            cursor.save(state_dir)?;
        }

        CredentialCursor::clear(state_dir)?;
        info!(path = %self.paths.local_path.display(), "Installed cluster credentials");
        Ok(())
    }
}
