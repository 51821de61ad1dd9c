//! Ticket status narration.
//!
//! Progress is posted to the rebuild ticket as `<sequence>:<message>`
//! comments, turning the comment stream into an ordered log. Every pass
//! re-runs the same steps, so a post is suppressed when the tail of the log
//! already says the same thing or is further along.

use std::fmt;

use tracing::{debug, info};

use crate::error::{BootstrapError, Result};
use crate::locator::TicketHandle;
use crate::tracker::{IssueComment, IssueTracker};

/// A parsed `<sequence>:<message>` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusComment<'a> {
    pub sequence: u64,
    pub message: &'a str,
}

impl<'a> StatusComment<'a> {
    /// Parse a comment body. The sequence is everything before the first `:`.
    #[must_use]
    pub fn parse(body: &'a str) -> Option<Self> {
        let (token, message) = body.split_once(':').unwrap_or((body, ""));
        let sequence = token.parse().ok()?;
        Some(Self { sequence, message })
    }
}

impl fmt::Display for StatusComment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sequence, self.message)
    }
}

/// Why a status update was not posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The latest comment already carries this message.
    Duplicate,
    /// The latest comment has an equal or higher sequence.
    Stale { latest: u64 },
}

/// Result of a narration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    Posted,
    Suppressed(SuppressReason),
}

/// Decide whether `(sequence, message)` may be appended after `latest`.
///
/// Returns `Ok(None)` when the update should be posted.
pub fn suppression(
    ticket: u64,
    latest: Option<&IssueComment>,
    sequence: u64,
    message: &str,
) -> Result<Option<SuppressReason>> {
    let Some(latest) = latest else {
        return Ok(None);
    };

    if latest.body == message {
        return Ok(Some(SuppressReason::Duplicate));
    }

    let parsed = StatusComment::parse(&latest.body).ok_or_else(|| {
        BootstrapError::CorruptStatusLog {
            ticket,
            body: latest.body.clone(),
        }
    })?;

    if parsed.message == message {
        return Ok(Some(SuppressReason::Duplicate));
    }
    if sequence <= parsed.sequence {
        return Ok(Some(SuppressReason::Stale {
            latest: parsed.sequence,
        }));
    }
    Ok(None)
}

/// Posts deduplicated, ordered status comments to a ticket.
pub struct StatusNarrator<'a> {
    tracker: &'a dyn IssueTracker,
}

impl<'a> StatusNarrator<'a> {
    pub fn new(tracker: &'a dyn IssueTracker) -> Self {
        Self { tracker }
    }

    pub async fn post(
        &self,
        ticket: &TicketHandle,
        sequence: u64,
        message: &str,
    ) -> Result<NarrationOutcome> {
        let latest = self.tracker.latest_comment(ticket.number).await?;

        if let Some(reason) = suppression(ticket.number, latest.as_ref(), sequence, message)? {
            debug!(ticket = ticket.number, sequence, ?reason, "Skipping status update");
            return Ok(NarrationOutcome::Suppressed(reason));
        }

        let body = StatusComment { sequence, message }.to_string();
        self.tracker.create_comment(ticket.number, &body).await?;
        info!(ticket = ticket.number, sequence, "Posted status update");
        Ok(NarrationOutcome::Posted)
    }

    /// Sequence of the latest status comment, `None` when the ticket has no
    /// comments yet.
    pub async fn latest_sequence(&self, ticket: &TicketHandle) -> Result<Option<u64>> {
        let Some(latest) = self.tracker.latest_comment(ticket.number).await? else {
            return Ok(None);
        };
        let parsed =
            StatusComment::parse(&latest.body).ok_or_else(|| BootstrapError::CorruptStatusLog {
                ticket: ticket.number,
                body: latest.body.clone(),
            })?;
        Ok(Some(parsed.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn latest(body: &str) -> IssueComment {
        IssueComment {
            body: body.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_status_comment() {
        let parsed = StatusComment::parse("4:Error on cluster build: exit status 2 -> a:b").unwrap();
        assert_eq!(parsed.sequence, 4);
        assert_eq!(parsed.message, "Error on cluster build: exit status 2 -> a:b");

        assert_eq!(StatusComment::parse("12").unwrap().sequence, 12);
        assert!(StatusComment::parse("Looks broken to me").is_none());
        assert!(StatusComment::parse(" 3:padded").is_none());
        assert!(StatusComment::parse("-1:negative").is_none());
    }

    #[test]
    fn test_format_status_comment() {
        let comment = StatusComment {
            sequence: 5,
            message: "Cluster build complete",
        };
        assert_eq!(comment.to_string(), "5:Cluster build complete");
    }

    #[test]
    fn test_empty_log_posts() {
        assert_eq!(suppression(1, None, 1, "Building").unwrap(), None);
    }

    #[test]
    fn test_higher_sequence_posts() {
        let tail = latest("1:Building Cluster - running ansible");
        assert_eq!(suppression(1, Some(&tail), 2, "Error").unwrap(), None);
    }

    #[test]
    fn test_same_pair_is_duplicate() {
        let tail = latest("1:Building Cluster - running ansible");
        assert_eq!(
            suppression(1, Some(&tail), 1, "Building Cluster - running ansible").unwrap(),
            Some(SuppressReason::Duplicate)
        );
    }

    #[test]
    fn test_same_message_is_duplicate_at_higher_sequence() {
        let tail = latest("2:X");
        assert_eq!(
            suppression(1, Some(&tail), 3, "X").unwrap(),
            Some(SuppressReason::Duplicate)
        );
    }

    #[test]
    fn test_raw_body_match_is_duplicate_even_if_unparseable() {
        let tail = latest("Cluster build complete");
        assert_eq!(
            suppression(1, Some(&tail), 5, "Cluster build complete").unwrap(),
            Some(SuppressReason::Duplicate)
        );
    }

    #[test]
    fn test_lower_or_equal_sequence_is_stale() {
        let tail = latest("4:Error on cluster build: boom");
        for sequence in [1, 3, 4] {
            assert_eq!(
                suppression(1, Some(&tail), sequence, "Something new").unwrap(),
                Some(SuppressReason::Stale { latest: 4 })
            );
        }
    }

    #[test]
    fn test_malformed_tail_is_fatal() {
        let tail = latest("Can someone look at this?");
        let err = suppression(42, Some(&tail), 1, "Building").unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::CorruptStatusLog { ticket: 42, .. }
        ));
    }
}
