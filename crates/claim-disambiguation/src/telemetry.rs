//! Tracing setup and the per-run stage report.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::voting::{AttemptCounts, BatchVotes};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

/// Counters for one invocation of the stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub candidates: usize,
    /// Passed through without an oracle call.
    pub bypassed: usize,
    /// Routed to the voting coordinator.
    pub sent_to_oracle: usize,
    /// Sentences accepted by quorum.
    pub accepted: usize,
    /// Sentences dropped by the coordinator.
    pub rejected: usize,
    pub attempts_resolved: usize,
    pub attempts_unresolvable: usize,
    pub attempts_failed: usize,
    pub elapsed_ms: u64,
}

impl StageReport {
    pub fn new(candidates: usize, bypassed: usize, sent_to_oracle: usize) -> Self {
        Self {
            candidates,
            bypassed,
            sent_to_oracle,
            ..Self::default()
        }
    }

    pub fn record_votes(&mut self, votes: &BatchVotes) {
        let AttemptCounts {
            resolved,
            unresolvable,
            failed,
        } = votes.attempt_counts();
        self.accepted = votes.accepted();
        self.rejected = self.sent_to_oracle.saturating_sub(self.accepted);
        self.attempts_resolved = resolved;
        self.attempts_unresolvable = unresolvable;
        self.attempts_failed = failed;
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
        info!(
            candidates = self.candidates,
            bypassed = self.bypassed,
            sent_to_oracle = self.sent_to_oracle,
            accepted = self.accepted,
            rejected = self.rejected,
            attempts_failed = self.attempts_failed,
            elapsed_ms = self.elapsed_ms,
            "disambiguation stage finished"
        );
    }

    /// Items handed to the next stage.
    pub fn emitted(&self) -> usize {
        self.bypassed + self.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_counts_bypass_and_accepted() {
        let mut report = StageReport::new(5, 2, 3);
        report.accepted = 1;
        assert_eq!(report.emitted(), 3);
    }

    #[test]
    fn empty_votes_mark_everything_rejected() {
        let mut report = StageReport::new(3, 0, 3);
        report.record_votes(&BatchVotes::default());
        assert_eq!(report.accepted, 0);
        assert_eq!(report.rejected, 3);
    }

    #[test]
    fn report_serializes_with_snake_case_fields() {
        let json = serde_json::to_value(StageReport::new(1, 1, 0)).unwrap();
        assert_eq!(json["sent_to_oracle"], 0);
        assert_eq!(json["bypassed"], 1);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
