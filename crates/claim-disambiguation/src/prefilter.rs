//! Ambiguity prefilter: a cheap lexical gate in front of the oracle.
//!
//! Only sentences containing a bare pronoun token are sent for resolution.
//! Definite descriptions ("the company") slip through by design of the gate;
//! it trades recall for oracle cost.

use std::collections::HashSet;

use crate::types::CandidateSentence;

/// Pronoun tokens that mark a sentence as possibly context-dependent.
pub const AMBIGUOUS_PRONOUNS: [&str; 9] =
    ["it", "he", "she", "they", "them", "his", "her", "its", "their"];

/// `true` if the sentence contains any ambiguous pronoun token.
///
/// Lower-cases and splits on whitespace; punctuation stays attached to the
/// token, so `"it."` does not match while `"it"` does.
pub fn needs_resolution(sentence: &str) -> bool {
    let lowered = sentence.to_lowercase();
    let words: HashSet<&str> = lowered.split_whitespace().collect();
    AMBIGUOUS_PRONOUNS.iter().any(|p| words.contains(p))
}

/// Split candidates into `(bypass, resolve)` in a single pass.
pub fn partition(
    candidates: Vec<CandidateSentence>,
) -> (Vec<CandidateSentence>, Vec<CandidateSentence>) {
    candidates
        .into_iter()
        .partition(|c| !needs_resolution(c.sentence()))
}
