//! Domain types handed between the stage's components.
//!
//! | Type                | Produced by          | Consumed by              |
//! |---------------------|----------------------|--------------------------|
//! | `CandidateSentence` | upstream selection   | prefilter, adapter       |
//! | `TruncatedContext`  | context windower     | adapter (prompt)         |
//! | `ResolutionAttempt` | oracle adapter       | quorum tally             |
//! | `ResolutionOutcome` | quorum tally         | voting coordinator       |
//! | `DisambiguatedItem` | bypass / coordinator | next pipeline stage      |

use serde::{Deserialize, Serialize};

use crate::errors::OracleError;

// ── Input ────────────────────────────────────────────────────────────────────

/// Raw text surrounding a sentence, as produced upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    #[serde(rename = "context_for_llm")]
    pub text: String,
}

impl ContextWindow {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Context with everything after the target sentence removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedContext {
    pub text: String,
}

/// A sentence selected upstream that may need its references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSentence {
    pub processed_sentence: String,
    pub original_context_item: ContextWindow,
}

impl CandidateSentence {
    pub fn new(sentence: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            processed_sentence: sentence.into(),
            original_context_item: ContextWindow::new(context),
        }
    }

    pub fn sentence(&self) -> &str {
        &self.processed_sentence
    }

    pub fn context(&self) -> &ContextWindow {
        &self.original_context_item
    }
}

// ── Attempts & outcomes ──────────────────────────────────────────────────────

/// Classified result of one oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The oracle produced a non-empty resolved sentence (already trimmed).
    Resolved(String),
    /// The oracle declined, returned nothing, or returned empty text.
    Unresolvable,
    /// The call itself failed; counts as a non-vote.
    Failed(OracleError),
}

impl AttemptOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved(_) => "resolved",
            Self::Unresolvable => "unresolvable",
            Self::Failed(_) => "failed",
        }
    }
}

/// One vote, tagged with the index it was launched with.
///
/// The index, not arrival order, decides which resolved text represents the
/// sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
    pub index: usize,
    pub outcome: AttemptOutcome,
}

impl ResolutionAttempt {
    pub fn new(index: usize, outcome: AttemptOutcome) -> Self {
        Self { index, outcome }
    }
}

/// Why a sentence was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Some attempts resolved, but fewer than the quorum.
    NoQuorum { resolved: usize, required: usize },
    /// Every attempt failed at the infrastructure level.
    AllFailed,
    /// `min_successes` exceeds `completions`; no oracle call was made.
    QuorumUnreachable { completions: usize, required: usize },
    /// The stage was cancelled before the vote finished.
    Cancelled,
}

/// Final per-sentence decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Accepted(String),
    Rejected(RejectionReason),
}

impl ResolutionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

/// A sentence that stands on its own, ready for claim decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguatedItem {
    pub disambiguated_sentence: String,
    pub original_selected_item: CandidateSentence,
}

impl DisambiguatedItem {
    pub fn new(disambiguated_sentence: impl Into<String>, source: CandidateSentence) -> Self {
        Self {
            disambiguated_sentence: disambiguated_sentence.into(),
            original_selected_item: source,
        }
    }

    /// Pass-through for sentences the prefilter found unambiguous.
    pub fn bypass(source: CandidateSentence) -> Self {
        Self {
            disambiguated_sentence: source.processed_sentence.clone(),
            original_selected_item: source,
        }
    }

    pub fn source(&self) -> &CandidateSentence {
        &self.original_selected_item
    }
}

// ── Pipeline mapping ─────────────────────────────────────────────────────────

/// The slice of pipeline state this stage reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub selected_contents: Option<Vec<CandidateSentence>>,
}

/// The update this stage hands back to the pipeline.
///
/// An empty update serializes to `{}` so the caller sees "nothing changed"
/// rather than an explicit empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguated_contents: Option<Vec<DisambiguatedItem>>,
}

impl StateUpdate {
    pub fn from_items(items: Vec<DisambiguatedItem>) -> Self {
        if items.is_empty() {
            Self::default()
        } else {
            Self {
                disambiguated_contents: Some(items),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.disambiguated_contents.is_none()
    }
}
