//! Reconciliation pass.
//!
//! One pass walks health probe → ticket lookup → approval → rebuild and
//! stops at the first stage that has nothing more to do. All state is
//! re-derived from the cluster and the tracker on every pass; the next
//! scheduled run is the only retry.

use std::fmt;

use tracing::info;

use crate::approval::ApprovalGate;
use crate::command::CommandRunner;
use crate::config::BootstrapConfig;
use crate::credentials::CredentialInstaller;
use crate::error::Result;
use crate::inventory::ExpectedNodeSet;
use crate::locator::TicketLocator;
use crate::probe::{HealthProber, HealthVerdict};
use crate::remediation::{RemediationOutcome, RemediationRunner};
use crate::tracker::IssueTracker;

/// Result of a reconciliation pass that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every expected node is present; the tracker was not touched.
    Healthy,
    /// No rebuild ticket existed, so one was opened.
    TicketOpened { ticket: u64 },
    /// The ticket exists but has not been approved.
    AwaitingApproval { ticket: u64, labels: Vec<String> },
    /// A rebuild ran.
    Remediated {
        ticket: u64,
        labels: Vec<String>,
        outcome: RemediationOutcome,
    },
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Cluster healthy"),
            Self::TicketOpened { ticket } => write!(f, "Opened rebuild ticket #{ticket}"),
            Self::AwaitingApproval { ticket, labels } => {
                write!(f, "Cluster setup error; issue: {ticket} -> {labels:?}")
            }
            Self::Remediated {
                ticket,
                outcome: RemediationOutcome::Success,
                ..
            } => write!(f, "Cluster rebuilt; issue {ticket} closed"),
            Self::Remediated {
                ticket,
                labels,
                outcome,
            } => {
                let stage = match outcome {
                    RemediationOutcome::DependencyInstallFailed { .. } => "dependency install failed",
                    RemediationOutcome::BuildUnreachable { .. } => "hosts unreachable",
                    _ => "build failed",
                };
                write!(f, "Cluster setup error ({stage}); issue: {ticket} -> {labels:?}")
            }
        }
    }
}

/// Runs reconciliation passes against one cluster.
pub struct Reconciler<'a> {
    config: &'a BootstrapConfig,
    tracker: &'a dyn IssueTracker,
    runner: &'a dyn CommandRunner,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        tracker: &'a dyn IssueTracker,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            tracker,
            runner,
        }
    }

    pub async fn run_pass(&self, expected: &ExpectedNodeSet) -> Result<PassOutcome> {
        match probe_cluster(self.config, self.runner, expected).await {
            Some(raw_output) => self.handle_unhealthy(&raw_output).await,
            None => Ok(PassOutcome::Healthy),
        }
    }

    /// Ticket, approval and rebuild stages for a cluster already found unhealthy.
    pub async fn handle_unhealthy(&self, raw_output: &str) -> Result<PassOutcome> {
        let locator = TicketLocator::new(self.tracker, &self.config.tracker.rebuild_title);
        let Some(ticket) = locator.locate().await? else {
            let ticket = locator.create(raw_output).await?;
            return Ok(PassOutcome::TicketOpened {
                ticket: ticket.number,
            });
        };

        let approval = ApprovalGate::new(self.tracker, &self.config.tracker.approval_label)
            .check(&ticket)
            .await?;
        if !approval.approved {
            info!(ticket = ticket.number, "Rebuild not approved yet");
            return Ok(PassOutcome::AwaitingApproval {
                ticket: ticket.number,
                labels: approval.labels,
            });
        }

        info!(ticket = ticket.number, "Rebuild approved, starting remediation");
        let installer = CredentialInstaller::new(
            self.runner,
            &self.config.cluster,
            &self.config.credentials,
        );
        let outcome = RemediationRunner::new(
            self.tracker,
            self.runner,
            &self.config.commands,
            installer,
        )
        .run(&ticket)
        .await?;

        Ok(PassOutcome::Remediated {
            ticket: ticket.number,
            labels: approval.labels,
            outcome,
        })
    }
}

async fn probe_cluster(
    config: &BootstrapConfig,
    runner: &dyn CommandRunner,
    expected: &ExpectedNodeSet,
) -> Option<String> {
    match HealthProber::new(runner, &config.commands.list_nodes)
        .probe(expected)
        .await
    {
        HealthVerdict::Healthy => None,
        HealthVerdict::Unhealthy { raw_output, missing } => {
            info!(?missing, "Cluster unhealthy, checking rebuild ticket");
            Some(raw_output)
        }
    }
}

/// Run one pass, opening the tracker connection only once the cluster has
/// been found unhealthy. A healthy pass never calls `connect`.
pub async fn run_pass_with_tracker<T, F>(
    config: &BootstrapConfig,
    runner: &dyn CommandRunner,
    expected: &ExpectedNodeSet,
    connect: F,
) -> Result<PassOutcome>
where
    T: IssueTracker,
    F: FnOnce(&BootstrapConfig) -> Result<T>,
{
    let Some(raw_output) = probe_cluster(config, runner, expected).await else {
        return Ok(PassOutcome::Healthy);
    };

    let tracker = connect(config)?;
    Reconciler::new(config, &tracker, runner)
        .handle_unhealthy(&raw_output)
        .await
}
