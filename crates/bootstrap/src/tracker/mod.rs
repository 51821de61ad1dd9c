//! Issue tracker contract.
//!
//! The reconciliation pass needs only a handful of operations from the
//! tracker. Comments are exposed through a single tail read
//! ([`IssueTracker::latest_comment`]); nothing in the checker depends on the
//! full comment history.

pub mod github;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

pub use github::GitHubTracker;

/// An open issue as listed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Operations the checker requires from an issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// All open issues in the repository.
    async fn list_open_issues(&self) -> Result<Vec<Issue>, TrackerError>;

    /// Open a new issue and return it.
    async fn create_issue(&self, title: &str, body: &str) -> Result<Issue, TrackerError>;

    /// Label names attached to an issue.
    async fn list_labels(&self, issue: u64) -> Result<Vec<String>, TrackerError>;

    /// The most recently created comment, if any.
    async fn latest_comment(&self, issue: u64) -> Result<Option<IssueComment>, TrackerError>;

    async fn create_comment(&self, issue: u64, body: &str) -> Result<(), TrackerError>;

    async fn close_issue(&self, issue: u64) -> Result<(), TrackerError>;
}

/// Pick the most recent comment: greatest `created_at`, later entry on ties.
#[must_use]
pub fn most_recent(comments: Vec<IssueComment>) -> Option<IssueComment> {
    comments
        .into_iter()
        .reduce(|latest, c| if c.created_at >= latest.created_at { c } else { latest })
}
