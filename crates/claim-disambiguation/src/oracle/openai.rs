//! OpenAI-compatible chat-completions oracle.
//!
//! Works against vLLM, llama.cpp server, and hosted OpenAI-style APIs. The
//! output schema is sent as a `json_schema` response format; servers that
//! ignore it still usually return JSON, and fenced JSON is tolerated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::OracleEndpoint;
use crate::errors::{ConfigError, OracleError};
use crate::oracle::{DisambiguationOutput, OracleRequest, ResolutionOracle};

const SCHEMA_NAME: &str = "disambiguation_output";

/// HTTP-backed [`ResolutionOracle`].
pub struct ChatCompletionsOracle {
    endpoint: OracleEndpoint,
    client: reqwest::Client,
    timeout_secs: u64,
    response_format: Value,
}

impl ChatCompletionsOracle {
    pub fn new(endpoint: OracleEndpoint, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        let schema = serde_json::to_value(schemars::schema_for!(DisambiguationOutput))
            .map_err(|e| ConfigError::Invalid(format!("output schema: {e}")))?;

        Ok(Self {
            endpoint,
            client,
            timeout_secs: timeout.as_secs(),
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": SCHEMA_NAME,
                    "schema": schema,
                },
            }),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &OracleRequest) -> Value {
        json!({
            "model": self.endpoint.model,
            "temperature": self.endpoint.temperature,
            "max_tokens": self.endpoint.max_tokens,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.human },
            ],
            "response_format": self.response_format,
        })
    }
}

#[async_trait]
impl ResolutionOracle for ChatCompletionsOracle {
    async fn resolve(
        &self,
        request: &OracleRequest,
    ) -> Result<Option<DisambiguationOutput>, OracleError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.endpoint.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| OracleError::from_reqwest(&e, self.timeout_secs))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OracleError::from_reqwest(&e, self.timeout_secs))?;

        debug!(sentence = %request.sentence, "oracle responded");
        parse_completion(&body)
    }
}

/// Pull the structured output out of a chat-completions response body.
fn parse_completion(body: &Value) -> Result<Option<DisambiguationOutput>, OracleError> {
    let message = &body["choices"][0]["message"];
    if message.is_null() {
        return Err(OracleError::Parse(
            "response has no choices[0].message".to_string(),
        ));
    }
    if message["refusal"].as_str().is_some_and(|r| !r.is_empty()) {
        return Ok(None);
    }

    let content = match message["content"].as_str() {
        Some(c) if !c.trim().is_empty() => c,
        _ => return Ok(None),
    };

    let json_str = extract_json_object(content);
    serde_json::from_str(json_str)
        .map(Some)
        .map_err(|e| OracleError::Parse(format!("{e}; raw: {content}")))
}

fn extract_json_object(raw: &str) -> &str {
    let stripped = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => &stripped[start..=end],
        _ => stripped,
    }
}
