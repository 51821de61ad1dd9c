//! Remediation approval gate.
//!
//! A rebuild is authorized only by a label on the ticket matching the
//! approval keyword, ignoring case. Nothing else (comments, assignees, age)
//! counts.

use tracing::debug;

use crate::error::Result;
use crate::locator::TicketHandle;
use crate::tracker::IssueTracker;

/// Whether any label equals the approval keyword, ignoring case.
#[must_use]
pub fn is_approved<S: AsRef<str>>(labels: &[S], keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    labels
        .iter()
        .any(|label| label.as_ref().to_lowercase() == keyword)
}

/// Labels on a ticket and the approval decision derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalState {
    pub labels: Vec<String>,
    pub approved: bool,
}

/// Reads ticket labels and decides whether remediation may run.
pub struct ApprovalGate<'a> {
    tracker: &'a dyn IssueTracker,
    keyword: &'a str,
}

impl<'a> ApprovalGate<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, keyword: &'a str) -> Self {
        Self { tracker, keyword }
    }

    pub async fn check(&self, ticket: &TicketHandle) -> Result<ApprovalState> {
        let labels = self.tracker.list_labels(ticket.number).await?;
        let approved = is_approved(&labels, self.keyword);
        debug!(ticket = ticket.number, ?labels, approved, "Checked approval");
        Ok(ApprovalState { labels, approved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_variants_match() {
        for label in ["proceed", "Proceed", "PROCEED", "pRoCeEd"] {
            assert!(is_approved(&[label], "proceed"), "{label} should approve");
        }
    }

    #[test]
    fn test_keyword_case_is_irrelevant() {
        assert!(is_approved(&["proceed"], "Proceed"));
    }

    #[test]
    fn test_other_labels_do_not_approve() {
        assert!(!is_approved(&["needs-review"], "proceed"));
        assert!(!is_approved(&["proceed-later", "do-not-proceed"], "proceed"));
        assert!(!is_approved::<&str>(&[], "proceed"));
    }

    #[test]
    fn test_any_matching_label_is_enough() {
        assert!(is_approved(&["bug", "needs-review", "Proceed"], "proceed"));
    }
}
