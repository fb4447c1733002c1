//! OpenAI-compatible embeddings provider using the `/v1/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use notevec_core::{EmbedError, EmbedProvider, EmbedRequest, ProviderConfig};

const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<Secret<String>>,
    base_url: String,
    model: String,
    dims: usize,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl OpenAiProvider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dimensions,
            timeout,
            max_retries: config.max_retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Initial pause between retries; doubles on every attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send_once(&self, key: &Secret<String>, body: &EmbeddingRequest<'_>) -> Result<Vec<Vec<f32>>, EmbedError> {
        let resp = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                EmbedError::Timeout(self.timeout)
            } else {
                EmbedError::Unavailable(format!("undecodable embeddings response: {e}"))
            }
        })?;
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn transport_error(&self, e: reqwest::Error) -> EmbedError {
        if e.is_timeout() {
            EmbedError::Timeout(self.timeout)
        } else {
            EmbedError::Unavailable(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

const QUOTA_CODES: [&str; 2] = ["insufficient_quota", "billing_hard_limit_reached"];

/// Map a non-success HTTP status and its body onto an [`EmbedError`].
pub(crate) fn classify_status(status: StatusCode, body: &str) -> EmbedError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let err = envelope.error;
    let message = match err.message.as_deref() {
        Some(m) if !m.is_empty() => format!("{status}: {m}"),
        _ if body.trim().is_empty() => status.to_string(),
        _ => format!("{status}: {}", body.trim()),
    };
    match status.as_u16() {
        401 | 403 => EmbedError::Unauthenticated(message),
        429 => {
            let quota_exhausted = [err.code.as_deref(), err.kind.as_deref()]
                .into_iter()
                .flatten()
                .any(|c| QUOTA_CODES.contains(&c));
            EmbedError::RateLimited { message, quota_exhausted }
        }
        400 | 404 | 413 | 422 => EmbedError::InvalidRequest(message),
        s if s >= 500 => EmbedError::Unavailable(message),
        _ => EmbedError::InvalidRequest(message),
    }
}

#[async_trait]
impl EmbedProvider for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, request: EmbedRequest<'_>) -> Result<Vec<Vec<f32>>, EmbedError> {
        if request.texts.is_empty() {
            return Ok(Vec::new());
        }
        let Some(key) = self.api_key.as_ref() else {
            return Err(EmbedError::Unauthenticated(
                "no API key configured (set embedding.api_key or OPENAI_API_KEY)".into(),
            ));
        };
        let body = EmbeddingRequest { model: &self.model, input: request.texts, dimensions: request.dimensions };

        let mut attempt = 0u32;
        loop {
            match self.send_once(key, &body).await {
                Ok(vectors) => {
                    debug!(texts = request.texts.len(), attempt, "embeddings received");
                    return Ok(vectors);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let pause = self.backoff * 2u32.saturating_pow(attempt);
                    warn!(error = %e, attempt = attempt + 1, max = self.max_retries, ?pause, "retrying embedding request");
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
