//! Generative-language client.
//!
//! Implements [`GenerativeModel`] against the Gemini `generateContent`
//! REST endpoint. Provider selection goes through [`create_model`]:
//!
//! | Config value | Model |
//! |--------------|-------|
//! | `"disabled"` | [`DisabledModel`] (every call fails, adapters degrade) |
//! | `"gemini"`   | [`GeminiModel`] |
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use cyberguard_core::traits::{Blob, DisabledModel, GenerativeModel, OracleError};

use crate::config::OracleConfig;

/// Gemini `generateContent` client.
pub struct GeminiModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl GeminiModel {
    /// Build from configuration, reading `GEMINI_API_KEY` from the environment.
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &OracleConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| anyhow::anyhow!("oracle.model required for Gemini provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay (doubles per attempt).
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }
}

/// Request body: one user turn with a text part and an optional inline blob.
pub fn request_body(prompt: &str, attachment: Option<Blob<'_>>) -> serde_json::Value {
    let mut parts = vec![serde_json::json!({ "text": prompt })];
    if let Some(blob) = attachment {
        parts.push(serde_json::json!({
            "inline_data": {
                "mime_type": blob.media_type,
                "data": base64::engine::general_purpose::STANDARD.encode(blob.data),
            }
        }));
    }
    serde_json::json!({ "contents": [{ "parts": parts }] })
}

/// Extract the reply text from a `generateContent` response.
///
/// Concatenates the text parts of the first candidate.
pub fn parse_response(json: &serde_json::Value) -> Result<String, OracleError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or(OracleError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    let text = text.trim();
    if text.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn transport_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Transport(e.to_string())
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<Blob<'_>>,
    ) -> Result<String, OracleError> {
        let body = request_body(prompt, attachment);
        let url = self.url();

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: base, 2×base, 4×base, ...
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(transport_error)?;
                        return parse_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = OracleError::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(attempt, status = status.as_u16(), "gemini call failed; retrying");
                        last_err = Some(err);
                        continue;
                    }

                    // Client error (not 429): no retry
                    return Err(err);
                }
                Err(e) => {
                    debug!(attempt, error = %e, "gemini transport error");
                    last_err = Some(transport_error(e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or(OracleError::EmptyResponse))
    }
}

/// Create the configured [`GenerativeModel`].
pub fn create_model(config: &OracleConfig) -> Result<Arc<dyn GenerativeModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        other => bail!("Unknown oracle provider: {}", other),
    }
}
