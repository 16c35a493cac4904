// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scoring oracle for uploaded call agendas.
//!
//! The production oracle posts the rubric prompt and the uploaded file's
//! URL to an LLM endpoint that answers with `{score, feedback}`. The
//! returned score is unbounded; callers clamp it.

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Rubric used when an activity has no `scoring_criteria`.
pub const DEFAULT_RUBRIC: &str = "\
- Clear objective and desired outcome
- Proper discovery questions
- Value proposition alignment
- Competitive differentiation
- Strong call to action";

/// Raw oracle verdict.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringVerdict {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Scoring service is not configured")]
    NotConfigured,

    #[error("Scoring request failed: {0}")]
    Transport(String),

    #[error("Scoring service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed scoring response: {0}")]
    Malformed(String),
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Scoring(err.to_string())
    }
}

/// Something that can score an uploaded document against a rubric.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn score(&self, rubric: &str, file_url: &str) -> Result<ScoringVerdict, ScoringError>;
}

/// Prompt sent to the oracle for one submission.
pub fn scoring_prompt(rubric: &str) -> String {
    format!(
        "You are evaluating a sales call agenda for Command of the Message training.\n\n\
         Scoring Criteria:\n{rubric}\n\n\
         Analyze the uploaded document and provide:\n\
         1. A score from 0-100\n\
         2. Brief feedback on strengths and areas for improvement\n\n\
         Be constructive and specific in your feedback."
    )
}

#[derive(Serialize)]
struct ScoringRequest<'a> {
    model: &'a str,
    prompt: String,
    file_urls: [&'a str; 1],
    response_json_schema: serde_json::Value,
}

/// HTTP client for the LLM scoring endpoint.
#[derive(Clone)]
pub struct LlmScoringClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    model: String,
    api_key: Option<String>,
}

impl LlmScoringClient {
    /// Create a client. Without an endpoint every call fails with
    /// [`ScoringError::NotConfigured`].
    pub fn new(endpoint: Option<String>, model: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            model,
            api_key,
        }
    }

    /// Check response status and parse the verdict.
    async fn check_response_json(
        &self,
        response: reqwest::Response,
    ) -> Result<ScoringVerdict, ScoringError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            if status == 429 {
                tracing::warn!("Scoring service rate limit hit (429)");
            }

            return Err(ScoringError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| ScoringError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ScoringOracle for LlmScoringClient {
    async fn score(&self, rubric: &str, file_url: &str) -> Result<ScoringVerdict, ScoringError> {
        let endpoint = self.endpoint.as_deref().ok_or(ScoringError::NotConfigured)?;

        let body = ScoringRequest {
            model: &self.model,
            prompt: scoring_prompt(rubric),
            file_urls: [file_url],
            response_json_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "score": { "type": "number" },
                    "feedback": { "type": "string" }
                }
            }),
        };

        let mut request = self.http.post(endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScoringError::Transport(e.to_string()))?;

        let verdict = self.check_response_json(response).await?;
        tracing::debug!(raw_score = verdict.score, "Scoring verdict received");
        Ok(verdict)
    }
}
