//! Quorum voting over independent oracle attempts.
//!
//! ```text
//! resolve_batch(sentences)
//!   JoinSet × sentences                    ── one task per sentence
//!     JoinSet × completions                ── one task per attempt
//!       Semaphore permit → gate check      ── skip once the outcome is settled
//!         adapter.attempt                  ── shared cap on in-flight calls
//!     tally(attempts, min_successes)       ── count-based, order-insensitive
//! ```
//!
//! ## Decision rule
//!
//! A sentence is accepted iff at least `min_successes` attempts are
//! `Resolved`. `Unresolvable` and `Failed` attempts are non-votes. The
//! representative text is the `Resolved` attempt with the lowest attempt
//! index, so any permutation of completion order gives the same result.
//!
//! ## Early exit
//!
//! Outstanding attempts are aborted once the outcome is fixed, and an
//! attempt admitted by the semaphore after that point returns without
//! calling the oracle:
//! - reject when `resolved + outstanding < min_successes`;
//! - accept when quorum is met and every lower-indexed attempt has finished.
//!
//! With `min_successes > completions` no oracle call is made at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::OracleAdapter;
use crate::errors::OracleError;
use crate::types::{
    AttemptOutcome, CandidateSentence, DisambiguatedItem, RejectionReason, ResolutionAttempt,
    ResolutionOutcome,
};

/// Index recorded for attempts whose task panicked before reporting back.
/// Only resolved attempts are ever selected by index.
const UNKNOWN_ATTEMPT: usize = usize::MAX;

// ── Tally ────────────────────────────────────────────────────────────────────

/// Per-outcome attempt counts for one sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptCounts {
    pub resolved: usize,
    pub unresolvable: usize,
    pub failed: usize,
}

impl AttemptCounts {
    pub fn from_attempts(attempts: &[ResolutionAttempt]) -> Self {
        attempts.iter().fold(Self::default(), |mut acc, a| {
            match a.outcome {
                AttemptOutcome::Resolved(_) => acc.resolved += 1,
                AttemptOutcome::Unresolvable => acc.unresolvable += 1,
                AttemptOutcome::Failed(_) => acc.failed += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.resolved + self.unresolvable + self.failed
    }

    pub fn add(&mut self, other: AttemptCounts) {
        self.resolved += other.resolved;
        self.unresolvable += other.unresolvable;
        self.failed += other.failed;
    }
}

/// Decide a sentence from its attempts.
pub fn tally(attempts: &[ResolutionAttempt], min_successes: usize) -> ResolutionOutcome {
    let counts = AttemptCounts::from_attempts(attempts);

    if counts.resolved >= min_successes {
        let representative = attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Resolved(text) => Some((a.index, text)),
                _ => None,
            })
            .min_by_key(|(index, _)| *index);

        if let Some((_, text)) = representative {
            return ResolutionOutcome::Accepted(text.clone());
        }
    }

    if counts.failed > 0 && counts.failed == counts.total() {
        return ResolutionOutcome::Rejected(RejectionReason::AllFailed);
    }

    ResolutionOutcome::Rejected(RejectionReason::NoQuorum {
        resolved: counts.resolved,
        required: min_successes,
    })
}

// ── Per-sentence verdicts ────────────────────────────────────────────────────

/// Outcome of voting on one sentence, kept for reporting.
#[derive(Debug, Clone)]
pub struct SentenceVerdict {
    /// Position of the sentence in the batch handed to the coordinator.
    pub position: usize,
    pub candidate: CandidateSentence,
    pub outcome: ResolutionOutcome,
    pub counts: AttemptCounts,
}

impl SentenceVerdict {
    pub fn into_item(self) -> Option<DisambiguatedItem> {
        match self.outcome {
            ResolutionOutcome::Accepted(text) => Some(DisambiguatedItem::new(text, self.candidate)),
            ResolutionOutcome::Rejected(_) => None,
        }
    }
}

/// Everything the coordinator learned about a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchVotes {
    /// Verdicts in input order. Sentences whose task panicked are absent.
    pub verdicts: Vec<SentenceVerdict>,
}

impl BatchVotes {
    pub fn accepted(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| v.outcome.is_accepted())
            .count()
    }

    pub fn attempt_counts(&self) -> AttemptCounts {
        let mut total = AttemptCounts::default();
        for v in &self.verdicts {
            total.add(v.counts);
        }
        total
    }

    /// Accepted items in input order.
    pub fn into_items(self) -> Vec<DisambiguatedItem> {
        self.verdicts
            .into_iter()
            .filter_map(SentenceVerdict::into_item)
            .collect()
    }
}

// ── Coordinator ──────────────────────────────────────────────────────────────

/// Fans attempts out over a bounded pool and folds them into verdicts.
#[derive(Clone)]
pub struct VotingCoordinator {
    adapter: OracleAdapter,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl VotingCoordinator {
    pub fn new(adapter: OracleAdapter, max_concurrency: usize) -> Self {
        Self {
            adapter,
            limiter: Arc::new(Semaphore::new(
                max_concurrency.clamp(1, Semaphore::MAX_PERMITS),
            )),
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller. Cancelling rejects every
    /// sentence still being voted on.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Vote on every sentence and return the accepted items in input order.
    pub async fn resolve_batch(
        &self,
        sentences: Vec<CandidateSentence>,
        completions: usize,
        min_successes: usize,
    ) -> Vec<DisambiguatedItem> {
        self.vote_batch(sentences, completions, min_successes)
            .await
            .into_items()
    }

    /// Like [`resolve_batch`](Self::resolve_batch) but keeps every verdict.
    pub async fn vote_batch(
        &self,
        sentences: Vec<CandidateSentence>,
        completions: usize,
        min_successes: usize,
    ) -> BatchVotes {
        let total = sentences.len();
        let mut join_set: JoinSet<SentenceVerdict> = JoinSet::new();

        for (position, candidate) in sentences.into_iter().enumerate() {
            let this = self.clone();
            join_set.spawn(async move {
                this.vote_on_sentence(position, candidate, completions, min_successes)
                    .await
            });
        }

        let mut verdicts = Vec::with_capacity(total);
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => {
                    // Sentence dropped; siblings keep going.
                    warn!(error = %e, "sentence voting task panicked");
                }
            }
        }
        verdicts.sort_by_key(|v| v.position);

        let votes = BatchVotes { verdicts };
        let rejected = total - votes.accepted();
        if rejected > 0 {
            info!(rejected, total, "items failed to converge on a disambiguation");
        }
        votes
    }

    async fn vote_on_sentence(
        &self,
        position: usize,
        candidate: CandidateSentence,
        completions: usize,
        min_successes: usize,
    ) -> SentenceVerdict {
        if min_successes > completions {
            debug!(
                sentence = candidate.sentence(),
                completions, min_successes, "quorum unreachable, skipping oracle"
            );
            return SentenceVerdict {
                position,
                candidate,
                outcome: ResolutionOutcome::Rejected(RejectionReason::QuorumUnreachable {
                    completions,
                    required: min_successes,
                }),
                counts: AttemptCounts::default(),
            };
        }

        let candidate = Arc::new(candidate);
        let gate = Arc::new(AttemptGate::new(
            self.cancel.child_token(),
            completions,
            min_successes,
        ));
        let mut attempts_set: JoinSet<(usize, Option<ResolutionAttempt>)> = JoinSet::new();
        for index in 0..completions {
            let adapter = self.adapter.clone();
            let limiter = self.limiter.clone();
            let candidate = candidate.clone();
            let gate = gate.clone();
            attempts_set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = gate.stop.cancelled() => None,
                    permit = limiter.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (index, None);
                };
                if gate.is_settled() {
                    return (index, None);
                }
                let attempt = adapter.attempt(index, &candidate).await;
                if !attempt.outcome.is_resolved() {
                    gate.record_non_vote();
                }
                (index, Some(attempt))
            });
        }

        let mut attempts: Vec<ResolutionAttempt> = Vec::with_capacity(completions);
        let mut finished = vec![false; completions];
        let mut resolved = 0usize;
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    None
                }
                next = attempts_set.join_next() => next,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((index, attempt)) => {
                    if let Some(slot) = finished.get_mut(index) {
                        *slot = true;
                    }
                    match attempt {
                        Some(attempt) => {
                            if attempt.outcome.is_resolved() {
                                resolved += 1;
                            }
                            attempts.push(attempt);
                        }
                        None => debug!(
                            sentence = candidate.sentence(),
                            index, "attempt skipped, outcome already settled"
                        ),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "attempt task panicked");
                    attempts.push(ResolutionAttempt::new(
                        UNKNOWN_ATTEMPT,
                        AttemptOutcome::Failed(OracleError::Request(format!("attempt task: {e}"))),
                    ));
                }
            }

            let outstanding = attempts_set.len();
            if outstanding == 0 {
                break;
            }
            if resolved + outstanding < min_successes {
                debug!(
                    sentence = candidate.sentence(),
                    resolved, outstanding, "quorum out of reach, aborting remaining attempts"
                );
                break;
            }
            if resolved >= min_successes && lowest_resolved_is_final(&attempts, &finished) {
                debug!(
                    sentence = candidate.sentence(),
                    resolved, outstanding, "quorum reached, aborting remaining attempts"
                );
                break;
            }
        }
        gate.stop.cancel();
        attempts_set.abort_all();

        let counts = AttemptCounts::from_attempts(&attempts);
        let outcome = if cancelled {
            ResolutionOutcome::Rejected(RejectionReason::Cancelled)
        } else {
            tally(&attempts, min_successes)
        };
        log_verdict(candidate.sentence(), &outcome, counts);

        SentenceVerdict {
            position,
            candidate: Arc::unwrap_or_clone(candidate),
            outcome,
            counts,
        }
    }
}

/// Shared per-sentence state checked by each attempt before it calls the
/// oracle.
struct AttemptGate {
    stop: CancellationToken,
    non_votes: AtomicUsize,
    completions: usize,
    min_successes: usize,
}

impl AttemptGate {
    fn new(stop: CancellationToken, completions: usize, min_successes: usize) -> Self {
        Self {
            stop,
            non_votes: AtomicUsize::new(0),
            completions,
            min_successes,
        }
    }

    /// Recorded while the attempt still holds its permit, so the next
    /// attempt to be admitted sees it.
    fn record_non_vote(&self) {
        self.non_votes.fetch_add(1, Ordering::SeqCst);
    }

    /// `true` when the vote is stopped or too many non-votes are in for the
    /// quorum to be met.
    fn is_settled(&self) -> bool {
        let ceiling = self
            .completions
            .saturating_sub(self.non_votes.load(Ordering::SeqCst));
        self.stop.is_cancelled() || ceiling < self.min_successes
    }
}

/// `true` once no unfinished attempt could undercut the lowest resolved index.
fn lowest_resolved_is_final(attempts: &[ResolutionAttempt], finished: &[bool]) -> bool {
    let lowest = attempts
        .iter()
        .filter(|a| a.outcome.is_resolved())
        .map(|a| a.index)
        .min();
    match lowest {
        Some(lowest) => finished.iter().take(lowest).all(|done| *done),
        None => false,
    }
}

fn log_verdict(sentence: &str, outcome: &ResolutionOutcome, counts: AttemptCounts) {
    match outcome {
        ResolutionOutcome::Accepted(text) => {
            info!(sentence, resolved = %text, votes = counts.resolved, "Disambiguated");
        }
        ResolutionOutcome::Rejected(RejectionReason::AllFailed) => {
            warn!(
                sentence,
                failed = counts.failed,
                "every disambiguation attempt failed, dropping sentence"
            );
        }
        ResolutionOutcome::Rejected(RejectionReason::NoQuorum { resolved, required }) => {
            info!(
                sentence,
                resolved,
                required,
                unresolvable = counts.unresolvable,
                failed = counts.failed,
                "no quorum, dropping sentence"
            );
        }
        ResolutionOutcome::Rejected(RejectionReason::QuorumUnreachable {
            completions,
            required,
        }) => {
            info!(sentence, completions, required, "quorum unreachable, dropping sentence");
        }
        ResolutionOutcome::Rejected(RejectionReason::Cancelled) => {
            info!(sentence, "disambiguation cancelled, dropping sentence");
        }
    }
}
