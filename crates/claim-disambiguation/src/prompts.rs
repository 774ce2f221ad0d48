//! Default prompt text for the disambiguation oracle.

/// System instruction for a single resolution attempt.
pub const DISAMBIGUATION_SYSTEM_PROMPT: &str = "You rewrite one sentence so it can be \
understood without its surrounding text. Replace pronouns and other references that \
depend on context with the entities they refer to, using only the excerpt provided. \
Keep every other word of the sentence unchanged. If the excerpt does not make a \
reference clear, or more than one reading is plausible, set cannot_be_disambiguated \
to true and leave disambiguated_sentence empty. Respond with JSON only.";

/// Render the human turn from an excerpt and the target sentence.
pub fn human_prompt(excerpt: &str, sentence: &str) -> String {
    format!(
        "Excerpt:\n{excerpt}\n\nSentence:\n{sentence}\n\n\
        Return the sentence with its references resolved."
    )
}
