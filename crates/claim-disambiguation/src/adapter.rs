//! Oracle adapter: one call to the resolution oracle for one sentence,
//! classified into an [`AttemptOutcome`].
//!
//! The adapter never returns an error. Oracle faults and timeouts become
//! `Failed` votes so a single bad call can't abort the batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::ContextWindower;
use crate::errors::OracleError;
use crate::oracle::{DisambiguationOutput, OracleRequest, ResolutionOracle};
use crate::types::{AttemptOutcome, CandidateSentence, ResolutionAttempt};

/// Cheap to clone; each voting task gets its own handle.
#[derive(Clone)]
pub struct OracleAdapter {
    oracle: Arc<dyn ResolutionOracle>,
    windower: Arc<dyn ContextWindower>,
    timeout: Duration,
}

impl OracleAdapter {
    pub fn new(
        oracle: Arc<dyn ResolutionOracle>,
        windower: Arc<dyn ContextWindower>,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            windower,
            timeout,
        }
    }

    /// Build the prompt for a candidate from its truncated context.
    pub fn request_for(&self, candidate: &CandidateSentence) -> OracleRequest {
        let sentence = candidate.sentence();
        let excerpt = self.windower.truncate(sentence, candidate.context());
        OracleRequest::disambiguation(&excerpt.text, sentence)
    }

    /// Run attempt number `index` for `candidate`.
    pub async fn attempt(&self, index: usize, candidate: &CandidateSentence) -> ResolutionAttempt {
        let request = self.request_for(candidate);
        let sentence = candidate.sentence();

        let response = match tokio::time::timeout(self.timeout, self.oracle.resolve(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout.as_secs())),
        };

        let outcome = match response {
            Ok(output) => classify(output),
            Err(e) => {
                warn!(
                    sentence,
                    attempt = index,
                    kind = %e.kind(),
                    error = %e,
                    "disambiguation attempt failed"
                );
                AttemptOutcome::Failed(e)
            }
        };

        match &outcome {
            AttemptOutcome::Resolved(text) => {
                info!(sentence, attempt = index, resolved = %text, "disambiguation attempt resolved");
            }
            AttemptOutcome::Unresolvable => {
                debug!(sentence, attempt = index, "oracle could not disambiguate");
            }
            AttemptOutcome::Failed(_) => {}
        }

        ResolutionAttempt::new(index, outcome)
    }
}

/// Map a structured response onto a vote.
pub fn classify(output: Option<DisambiguationOutput>) -> AttemptOutcome {
    let Some(output) = output else {
        return AttemptOutcome::Unresolvable;
    };
    if output.cannot_be_disambiguated {
        return AttemptOutcome::Unresolvable;
    }
    match output.disambiguated_sentence {
        Some(text) if !text.trim().is_empty() => AttemptOutcome::Resolved(text.trim().to_string()),
        _ => AttemptOutcome::Unresolvable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FollowingTextTrimmer;
    use crate::oracle::MockResolutionOracle;

    fn adapter(mock: MockResolutionOracle) -> OracleAdapter {
        OracleAdapter::new(
            Arc::new(mock),
            Arc::new(FollowingTextTrimmer),
            Duration::from_secs(5),
        )
    }

    fn candidate() -> CandidateSentence {
        CandidateSentence::new(
            "It was blue.",
            "Acme bought a car. It was blue. It was later sold.",
        )
    }

    #[test]
    fn classify_missing_response() {
        assert_eq!(classify(None), AttemptOutcome::Unresolvable);
    }

    #[test]
    fn classify_flag_wins_over_text() {
        let out = DisambiguationOutput {
            disambiguated_sentence: Some("The car was blue.".into()),
            cannot_be_disambiguated: true,
        };
        assert_eq!(classify(Some(out)), AttemptOutcome::Unresolvable);
    }

    #[test]
    fn classify_blank_text_is_unresolvable() {
        let out = DisambiguationOutput::resolved("   ");
        assert_eq!(classify(Some(out)), AttemptOutcome::Unresolvable);
    }

    #[test]
    fn classify_trims_resolved_text() {
        let out = DisambiguationOutput::resolved("  The car was blue.\n");
        assert_eq!(
            classify(Some(out)),
            AttemptOutcome::Resolved("The car was blue.".into())
        );
    }

    #[tokio::test]
    async fn prompt_uses_truncated_context() {
        let mut mock = MockResolutionOracle::new();
        mock.expect_resolve()
            .withf(|req: &OracleRequest| {
                req.human.contains("Acme bought a car. It was blue.")
                    && !req.human.contains("later sold")
            })
            .times(1)
            .returning(|_| Ok(Some(DisambiguationOutput::resolved("The car was blue."))));

        let attempt = adapter(mock).attempt(0, &candidate()).await;
        assert_eq!(attempt.index, 0);
        assert_eq!(
            attempt.outcome,
            AttemptOutcome::Resolved("The car was blue.".into())
        );
    }

    #[tokio::test]
    async fn oracle_error_becomes_failed_vote() {
        let mut mock = MockResolutionOracle::new();
        mock.expect_resolve()
            .times(1)
            .returning(|_| Err(OracleError::Request("connection reset".into())));

        let attempt = adapter(mock).attempt(2, &candidate()).await;
        assert_eq!(attempt.index, 2);
        assert_eq!(
            attempt.outcome,
            AttemptOutcome::Failed(OracleError::Request("connection reset".into()))
        );
    }

    #[tokio::test]
    async fn declined_response_is_unresolvable() {
        let mut mock = MockResolutionOracle::new();
        mock.expect_resolve()
            .times(1)
            .returning(|_| Ok(Some(DisambiguationOutput::cannot_disambiguate())));

        let attempt = adapter(mock).attempt(1, &candidate()).await;
        assert_eq!(attempt.outcome, AttemptOutcome::Unresolvable);
    }
}
