//! Claim disambiguation stage.
//!
//! Rewrites candidate sentences so pronouns and other context-dependent
//! references are resolved, making each sentence meaningful on its own.
//! Sentences that cannot be resolved with confidence are dropped.
//!
//! The resolver is an unreliable, non-deterministic oracle. Each ambiguous
//! sentence is sent to it `completions` times in parallel and accepted only
//! when at least `min_successes` attempts agree that it can be resolved. A
//! lexical prefilter lets sentences without pronouns skip the oracle.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use claim_disambiguation::{CandidateSentence, DisambiguationConfig, DisambiguationStage};
//!
//! let config = DisambiguationConfig::from_env().with_quorum(5, 3);
//! let stage = DisambiguationStage::from_config(config)?;
//!
//! let items = stage
//!     .run(vec![CandidateSentence::new(
//!         "It was blue.",
//!         "Acme bought a car. It was blue.",
//!     )])
//!     .await;
//! ```

pub mod adapter;
pub mod config;
pub mod context;
pub mod errors;
pub mod oracle;
pub mod orchestrator;
pub mod prefilter;
pub mod prompts;
pub mod telemetry;
pub mod types;
pub mod voting;

pub use adapter::OracleAdapter;
pub use config::{DisambiguationConfig, OracleEndpoint};
pub use context::{ContextWindower, FollowingTextTrimmer};
pub use errors::{ConfigError, FailureKind, OracleError};
pub use oracle::{ChatCompletionsOracle, DisambiguationOutput, OracleRequest, ResolutionOracle};
pub use orchestrator::DisambiguationStage;
pub use prefilter::{needs_resolution, AMBIGUOUS_PRONOUNS};
pub use telemetry::{init_tracing, StageReport};
pub use types::{
    AttemptOutcome, CandidateSentence, ContextWindow, DisambiguatedItem, PipelineState,
    RejectionReason, ResolutionAttempt, ResolutionOutcome, StateUpdate, TruncatedContext,
};
pub use voting::{tally, AttemptCounts, BatchVotes, SentenceVerdict, VotingCoordinator};
