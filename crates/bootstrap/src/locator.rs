//! Canonical rebuild ticket lookup.
//!
//! The canonical title is a unique key: at most one open ticket may carry it.
//! A tracker failure is never read as "no ticket", otherwise a flaky API would
//! open a duplicate on every pass.

use tracing::{debug, info, warn};

use crate::error::{BootstrapError, Result};
use crate::tracker::{Issue, IssueTracker};

/// Handle to the canonical rebuild ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketHandle {
    pub number: u64,
}

/// Finds (and opens) the canonical rebuild ticket.
pub struct TicketLocator<'a> {
    tracker: &'a dyn IssueTracker,
    title: &'a str,
}

impl<'a> TicketLocator<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, title: &'a str) -> Self {
        Self { tracker, title }
    }

    /// Find the single open ticket whose title matches exactly.
    ///
    /// Returns `Ok(None)` when no such ticket is open and
    /// [`BootstrapError::DuplicateTickets`] when more than one is.
    pub async fn locate(&self) -> Result<Option<TicketHandle>> {
        let issues = self.tracker.list_open_issues().await?;
        debug!(open = issues.len(), "Listed open issues");
        select_canonical(&issues, self.title)
    }

    /// Open the canonical ticket, attaching the probe output as its body.
    pub async fn create(&self, body: &str) -> Result<TicketHandle> {
        let issue = self.tracker.create_issue(self.title, body).await?;
        info!(ticket = issue.number, "Opened rebuild ticket");
        Ok(TicketHandle {
            number: issue.number,
        })
    }
}

/// Pick the canonical ticket out of a list of open issues.
pub fn select_canonical(issues: &[Issue], title: &str) -> Result<Option<TicketHandle>> {
    let mut numbers: Vec<u64> = issues
        .iter()
        .filter(|issue| issue.title == title)
        .map(|issue| issue.number)
        .collect();

    match numbers.len() {
        0 => Ok(None),
        1 => Ok(Some(TicketHandle { number: numbers[0] })),
        _ => {
            numbers.sort_unstable();
            warn!(?numbers, "Multiple open rebuild tickets");
            Err(BootstrapError::DuplicateTickets {
                title: title.to_string(),
                numbers,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "Request Cluster Rebuild";

    fn issue(number: u64, title: &str) -> Issue {
        Issue {
            number,
            title: title.to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_exact_match_found() {
        let issues = vec![issue(3, "Something else"), issue(9, TITLE)];
        assert_eq!(
            select_canonical(&issues, TITLE).unwrap(),
            Some(TicketHandle { number: 9 })
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let issues = vec![
            issue(3, "request cluster rebuild"),
            issue(4, "REQUEST CLUSTER REBUILD"),
            issue(5, "Request Cluster Rebuild "),
        ];
        assert_eq!(select_canonical(&issues, TITLE).unwrap(), None);
    }

    #[test]
    fn test_duplicates_are_fatal() {
        let issues = vec![issue(12, TITLE), issue(4, TITLE)];
        match select_canonical(&issues, TITLE).unwrap_err() {
            BootstrapError::DuplicateTickets { numbers, .. } => assert_eq!(numbers, vec![4, 12]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
