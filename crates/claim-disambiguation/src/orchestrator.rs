//! Disambiguation stage: prefilter, vote, merge.
//!
//! ```text
//! candidates ──prefilter──┬── bypass ───────────────────────────┐
//!                         └── resolve ── VotingCoordinator ──────┴─► items
//! ```
//!
//! Bypass items come first, then accepted resolutions; both groups keep their
//! input order. Nothing below this point raises: only construction can fail,
//! and only for invalid configuration.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::OracleAdapter;
use crate::config::DisambiguationConfig;
use crate::context::{ContextWindower, FollowingTextTrimmer};
use crate::errors::ConfigError;
use crate::oracle::{ChatCompletionsOracle, ResolutionOracle};
use crate::prefilter;
use crate::telemetry::StageReport;
use crate::types::{CandidateSentence, DisambiguatedItem, PipelineState, StateUpdate};
use crate::voting::VotingCoordinator;

pub struct DisambiguationStage {
    config: DisambiguationConfig,
    coordinator: VotingCoordinator,
}

impl DisambiguationStage {
    /// Build a stage around an injected oracle, using the default windower.
    pub fn new(
        config: DisambiguationConfig,
        oracle: Arc<dyn ResolutionOracle>,
    ) -> Result<Self, ConfigError> {
        Self::with_windower(config, oracle, Arc::new(FollowingTextTrimmer))
    }

    pub fn with_windower(
        config: DisambiguationConfig,
        oracle: Arc<dyn ResolutionOracle>,
        windower: Arc<dyn ContextWindower>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let adapter = OracleAdapter::new(oracle, windower, config.attempt_timeout());
        let coordinator = VotingCoordinator::new(adapter, config.max_concurrency);
        Ok(Self {
            config,
            coordinator,
        })
    }

    /// Build a stage that talks to the configured OpenAI-compatible endpoint.
    pub fn from_config(config: DisambiguationConfig) -> Result<Self, ConfigError> {
        let oracle = ChatCompletionsOracle::new(config.oracle.clone(), config.attempt_timeout())?;
        Self::new(config, Arc::new(oracle))
    }

    /// Tie in-flight voting to an external cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.coordinator = self.coordinator.with_cancellation(cancel);
        self
    }

    pub fn config(&self) -> &DisambiguationConfig {
        &self.config
    }

    /// Disambiguate a batch of candidates.
    pub async fn run(&self, candidates: Vec<CandidateSentence>) -> Vec<DisambiguatedItem> {
        self.run_with_report(candidates).await.0
    }

    /// Pipeline-state entry point: reads `selected_contents`, returns the
    /// update (empty when nothing was produced).
    pub async fn run_state(&self, state: &PipelineState) -> StateUpdate {
        let candidates = state.selected_contents.clone().unwrap_or_default();
        StateUpdate::from_items(self.run(candidates).await)
    }

    pub async fn run_with_report(
        &self,
        candidates: Vec<CandidateSentence>,
    ) -> (Vec<DisambiguatedItem>, StageReport) {
        let started = Instant::now();

        if candidates.is_empty() {
            warn!("Nothing to disambiguate");
            return (Vec::new(), StageReport::default());
        }

        let total = candidates.len();
        let (bypass, resolve) = prefilter::partition(candidates);
        let mut report = StageReport::new(total, bypass.len(), resolve.len());

        let mut items: Vec<DisambiguatedItem> = bypass
            .into_iter()
            .map(|candidate| {
                info!(
                    sentence = candidate.sentence(),
                    "Bypassing disambiguation for simple claim"
                );
                DisambiguatedItem::bypass(candidate)
            })
            .collect();

        if !resolve.is_empty() {
            info!(
                count = resolve.len(),
                completions = self.config.completions,
                min_successes = self.config.min_successes,
                "Sending claims to oracle for disambiguation"
            );
            let votes = self
                .coordinator
                .vote_batch(resolve, self.config.completions, self.config.min_successes)
                .await;
            report.record_votes(&votes);
            items.extend(votes.into_items());
        }

        if items.is_empty() {
            info!("Nothing could be disambiguated");
        } else {
            info!(count = items.len(), "Successfully disambiguated items");
        }

        report.finish(started.elapsed());
        (items, report)
    }
}
