//! The resolution oracle: an injected capability that, given a prompt,
//! returns a structured judgment or fails.
//!
//! The oracle is non-deterministic and sometimes wrong. Callers never rely on
//! a single answer; see [`crate::voting`] for how answers are combined.
//! Tests substitute scripted implementations of [`ResolutionOracle`].

pub mod openai;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::OracleError;
use crate::prompts;

pub use openai::ChatCompletionsOracle;

/// Structured output requested from the oracle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DisambiguationOutput {
    /// The sentence with ambiguities resolved.
    #[serde(default)]
    #[schemars(description = "The sentence with ambiguous references resolved")]
    pub disambiguated_sentence: Option<String>,
    /// Set when the excerpt does not make the references clear.
    #[serde(default)]
    #[schemars(description = "True if the sentence cannot be disambiguated from the excerpt")]
    pub cannot_be_disambiguated: bool,
}

impl DisambiguationOutput {
    pub fn resolved(sentence: impl Into<String>) -> Self {
        Self {
            disambiguated_sentence: Some(sentence.into()),
            cannot_be_disambiguated: false,
        }
    }

    pub fn cannot_disambiguate() -> Self {
        Self {
            disambiguated_sentence: None,
            cannot_be_disambiguated: true,
        }
    }
}

/// One prompt: system instruction plus the human turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub system: String,
    pub human: String,
    /// The sentence under resolution, for logging and scripted fakes.
    pub sentence: String,
}

impl OracleRequest {
    /// Build the default disambiguation prompt for a sentence and its
    /// truncated context.
    pub fn disambiguation(excerpt: &str, sentence: &str) -> Self {
        Self {
            system: prompts::DISAMBIGUATION_SYSTEM_PROMPT.to_string(),
            human: prompts::human_prompt(excerpt, sentence),
            sentence: sentence.to_string(),
        }
    }
}

/// Capability interface for the external resolver.
///
/// `Ok(None)` means the backend answered but produced no structured output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResolutionOracle: Send + Sync {
    async fn resolve(
        &self,
        request: &OracleRequest,
    ) -> Result<Option<DisambiguationOutput>, OracleError>;
}
