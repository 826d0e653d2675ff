//! Relay Vocabulary
//!
//! The error taxonomy for the two sides of the relay and the terminal
//! outcome reported to transport adapters. Cancellation is deliberately
//! not an error: a cleanly cancelled stream is a normal terminal state.

// =============================================================================
// Error Taxonomy
// =============================================================================

/// Errors surfaced by the upstream and downstream sides of the relay.
///
/// Upstream variants come from the quote stream (producer or remote feed);
/// downstream variants come from the sink (transport writer). Each carries
/// a human-readable detail string suitable for logs and transport status
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The upstream stream could not be opened at all.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream stream failed mid-stream. Reported once, terminally.
    #[error("upstream fault: {0}")]
    UpstreamFault(String),

    /// The downstream sink rejected the initial connection.
    #[error("downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// A push into the downstream sink failed or timed out.
    #[error("downstream fault: {0}")]
    DownstreamFault(String),
}

impl RelayError {
    /// Whether the fault is on the upstream side of the relay.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_) | Self::UpstreamFault(_))
    }
}

// =============================================================================
// Termination
// =============================================================================

/// Why one relay run ended.
///
/// Returned to the transport adapter so it can close the outward channel
/// with the matching native status. `Completed` and `Cancelled` are clean
/// ends; the failed variants carry the detail of the terminal fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The upstream stream ended normally.
    Completed,
    /// Either side requested stop; not an error.
    Cancelled,
    /// The upstream side failed; the stream delivered no further items.
    UpstreamFailed(String),
    /// The downstream side failed or timed out; the upstream was released.
    DownstreamFailed(String),
}

impl TerminationReason {
    /// Stable lowercase label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::UpstreamFailed(_) => "upstream_failed",
            Self::DownstreamFailed(_) => "downstream_failed",
        }
    }

    /// Whether this termination should surface as an error to the consumer.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::UpstreamFailed(_) | Self::DownstreamFailed(_))
    }

    /// The failure detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Completed | Self::Cancelled => None,
            Self::UpstreamFailed(detail) | Self::DownstreamFailed(detail) => Some(detail),
        }
    }
}

impl From<RelayError> for TerminationReason {
    /// Fold the four-way error taxonomy into the two failed terminal states,
    /// keeping the full error text as the detail.
    fn from(err: RelayError) -> Self {
        let detail = err.to_string();
        if err.is_upstream() {
            Self::UpstreamFailed(detail)
        } else {
            Self::DownstreamFailed(detail)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_side_and_detail() {
        let err = RelayError::UpstreamFault("feed dropped".to_string());
        assert_eq!(err.to_string(), "upstream fault: feed dropped");

        let err = RelayError::DownstreamFault("push timed out".to_string());
        assert_eq!(err.to_string(), "downstream fault: push timed out");
    }

    #[test]
    fn upstream_errors_fold_to_upstream_failed() {
        let reason: TerminationReason =
            RelayError::UpstreamUnavailable("connection refused".to_string()).into();
        assert_eq!(
            reason,
            TerminationReason::UpstreamFailed("upstream unavailable: connection refused".to_string())
        );
        assert!(reason.is_failure());
        assert_eq!(reason.label(), "upstream_failed");
    }

    #[test]
    fn downstream_errors_fold_to_downstream_failed() {
        let reason: TerminationReason =
            RelayError::DownstreamFault("receiver dropped".to_string()).into();
        assert_eq!(
            reason,
            TerminationReason::DownstreamFailed("downstream fault: receiver dropped".to_string())
        );
        assert_eq!(reason.detail(), Some("downstream fault: receiver dropped"));
    }

    #[test]
    fn clean_terminations_are_not_failures() {
        assert!(!TerminationReason::Completed.is_failure());
        assert!(!TerminationReason::Cancelled.is_failure());
        assert_eq!(TerminationReason::Completed.detail(), None);
        assert_eq!(TerminationReason::Cancelled.label(), "cancelled");
    }
}
