//! Context windowing: strip everything that follows the target sentence so
//! resolution only sees what a reader would have seen so far.

use tracing::debug;

use crate::types::{ContextWindow, TruncatedContext};

/// Derives the context handed to the oracle. Must be pure.
pub trait ContextWindower: Send + Sync {
    fn truncate(&self, sentence: &str, context: &ContextWindow) -> TruncatedContext;
}

/// Cuts the context right after the first occurrence of the sentence.
///
/// When the sentence cannot be located the whole context is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowingTextTrimmer;

impl ContextWindower for FollowingTextTrimmer {
    fn truncate(&self, sentence: &str, context: &ContextWindow) -> TruncatedContext {
        let needle = sentence.trim();
        let text = context.text.as_str();

        let kept = match (needle.is_empty(), text.find(needle)) {
            (false, Some(start)) => &text[..start + needle.len()],
            _ => {
                debug!(
                    sentence = needle,
                    context_len = text.len(),
                    "sentence not found in context, keeping full context"
                );
                text
            }
        };

        TruncatedContext {
            text: kept.trim().to_string(),
        }
    }
}

impl<F> ContextWindower for F
where
    F: Fn(&str, &ContextWindow) -> TruncatedContext + Send + Sync,
{
    fn truncate(&self, sentence: &str, context: &ContextWindow) -> TruncatedContext {
        self(sentence, context)
    }
}
