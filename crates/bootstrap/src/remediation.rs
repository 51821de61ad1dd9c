//! Cluster rebuild.
//!
//! Drives the provisioning tool through dependency install, cluster build
//! and credential install, narrating each stage on the ticket. Build-related
//! failures end the run with a narrated outcome and leave the ticket open for
//! a new human decision; credential failures are operator problems and are
//! returned as errors instead.

use tracing::{info, warn};

use crate::command::{CommandOutput, CommandRunner};
use crate::config::CommandsConfig;
use crate::credentials::{CredentialInstaller, InstallMode};
use crate::error::Result;
use crate::locator::TicketHandle;
use crate::narrator::StatusNarrator;
use crate::tracker::IssueTracker;

/// Longest command output quoted in a ticket comment.
const MAX_QUOTED_OUTPUT: usize = 4000;

/// Classification of a failed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Some hosts could not be reached.
    Unreachable,
    /// Anything else.
    Generic,
}

/// Recognized failure markers, checked in order.
const FAILURE_SIGNATURES: &[(&str, FailureKind)] = &[("UNREACHABLE", FailureKind::Unreachable)];

impl FailureKind {
    /// Classify build output by the first matching signature.
    #[must_use]
    pub fn classify(output: &str) -> Self {
        FAILURE_SIGNATURES
            .iter()
            .find(|(marker, _)| output.contains(marker))
            .map_or(Self::Generic, |(_, kind)| *kind)
    }
}

/// Status updates posted during a rebuild, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Building,
    DependencyInstallFailed { error: String },
    Unreachable { output: String },
    BuildFailed { status: String, output: String },
    BuildComplete,
    CopyingConfig,
}

impl StatusUpdate {
    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Building => 1,
            Self::DependencyInstallFailed { .. } => 2,
            Self::Unreachable { .. } => 3,
            Self::BuildFailed { .. } => 4,
            Self::BuildComplete => 5,
            Self::CopyingConfig => 6,
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Building => "Building Cluster - running ansible".to_string(),
            Self::DependencyInstallFailed { error } => format!("Error on cluster build: {error}"),
            Self::Unreachable { output } => format!("Validate reachability: {output}"),
            Self::BuildFailed { status, output } => {
                format!("Error on cluster build: {status} -> {output}")
            }
            Self::BuildComplete => "Cluster build complete".to_string(),
            Self::CopyingConfig => "Copying config".to_string(),
        }
    }
}

/// How a rebuild ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// Cluster rebuilt, credentials installed, ticket closed.
    Success,
    DependencyInstallFailed { output: String },
    BuildFailed { output: String },
    BuildUnreachable { output: String },
}

impl RemediationOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Keep the tail of long command output; failures are reported last.
fn quote_output(output: &str) -> String {
    let trimmed = output.trim_end();
    let count = trimmed.chars().count();
    if count <= MAX_QUOTED_OUTPUT {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - MAX_QUOTED_OUTPUT).collect();
    format!("...(truncated)\n{tail}")
}

/// Runs one rebuild against an approved ticket.
pub struct RemediationRunner<'a> {
    tracker: &'a dyn IssueTracker,
    narrator: StatusNarrator<'a>,
    runner: &'a dyn CommandRunner,
    commands: &'a CommandsConfig,
    installer: CredentialInstaller<'a>,
}

impl<'a> RemediationRunner<'a> {
    pub fn new(
        tracker: &'a dyn IssueTracker,
        runner: &'a dyn CommandRunner,
        commands: &'a CommandsConfig,
        installer: CredentialInstaller<'a>,
    ) -> Self {
        Self {
            tracker,
            narrator: StatusNarrator::new(tracker),
            runner,
            commands,
            installer,
        }
    }

    async fn narrate(&self, ticket: &TicketHandle, update: &StatusUpdate) -> Result<()> {
        self.narrator
            .post(ticket, update.sequence(), &update.message())
            .await?;
        Ok(())
    }

    pub async fn run(&self, ticket: &TicketHandle) -> Result<RemediationOutcome> {
        let latest = self.narrator.latest_sequence(ticket).await?;

        if latest >= Some(StatusUpdate::CopyingConfig.sequence()) {
            info!(
                ticket = ticket.number,
                "Cluster build already complete, resuming credential install"
            );
            return self.finish(ticket, InstallMode::Resume).await;
        }

        self.narrate(ticket, &StatusUpdate::Building).await?;

        let deps = self.runner.run(&self.commands.install_dependencies).await;
        if !deps.succeeded() {
            warn!(status = %deps.status, output = %deps.output, "Dependency install failed");
            self.narrate(
                ticket,
                &StatusUpdate::DependencyInstallFailed {
                    error: quote_output(&deps.failure_summary()),
                },
            )
            .await?;
            return Ok(RemediationOutcome::DependencyInstallFailed {
                output: deps.output,
            });
        }

        let build = self.runner.run(&self.commands.build_cluster).await;
        if !build.succeeded() {
            return self.build_failed(ticket, build).await;
        }
        info!(ticket = ticket.number, "Cluster build finished");

        self.narrate(ticket, &StatusUpdate::BuildComplete).await?;
        self.narrate(ticket, &StatusUpdate::CopyingConfig).await?;

        self.finish(ticket, InstallMode::Fresh).await
    }

    async fn build_failed(
        &self,
        ticket: &TicketHandle,
        build: CommandOutput,
    ) -> Result<RemediationOutcome> {
        warn!(status = %build.status, output = %build.output, "Cluster build failed");

        let quoted = quote_output(&build.output);
        match FailureKind::classify(&build.output) {
            FailureKind::Unreachable => {
                self.narrate(ticket, &StatusUpdate::Unreachable { output: quoted })
                    .await?;
                Ok(RemediationOutcome::BuildUnreachable {
                    output: build.output,
                })
            }
            FailureKind::Generic => {
                self.narrate(
                    ticket,
                    &StatusUpdate::BuildFailed {
                        status: build.status.to_string(),
                        output: quoted,
                    },
                )
                .await?;
                Ok(RemediationOutcome::BuildFailed {
                    output: build.output,
                })
            }
        }
    }

    async fn finish(&self, ticket: &TicketHandle, mode: InstallMode) -> Result<RemediationOutcome> {
        self.installer.install(ticket.number, mode).await?;
        self.tracker.close_issue(ticket.number).await?;
        info!(ticket = ticket.number, "Cluster rebuilt, ticket closed");
        Ok(RemediationOutcome::Success)
    }
}
