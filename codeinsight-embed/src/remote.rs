//! Embeddings from an OpenAI/Mistral-compatible HTTP API.
//!
//! Requests go to `POST {base_url}/v1/embeddings` with bearer authentication.
//! Transport errors, HTTP 429 and 5xx responses are retried up to
//! `max_retries` attempts in total, sleeping `retry_delay`, then twice that, and
//! so on between attempts.

use crate::config::RemoteEmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_to_f16};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

pub struct RemoteEmbedProvider {
    config: RemoteEmbedConfig,
    client: reqwest::Client,
    /// Dimension seen in the last response, or the configured one before that
    dimension: AtomicUsize,
}

impl std::fmt::Debug for RemoteEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension.load(Ordering::Relaxed))
            .finish()
    }
}

impl RemoteEmbedProvider {
    /// Builds the HTTP client. Fails without an API key.
    pub fn new(config: RemoteEmbedConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbedError::MissingApiKey {
                provider: config.base_url.clone(),
            });
        }
        if config.max_retries == 0 {
            return Err(EmbedError::invalid_config("max_retries must be at least 1"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            dimension: AtomicUsize::new(config.dimension),
            config,
            client,
        })
    }

    pub fn config(&self) -> &RemoteEmbedConfig {
        &self.config
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::unexpected_response(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::unexpected_response(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        let mut data = parsed.data;
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let attempts = self.config.max_retries;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let delay = self.config.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.request(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Embedding request attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(EmbedError::RetriesExhausted {
            attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!(
            "Requesting {} embeddings from {}",
            texts.len(),
            self.config.base_url
        );
        let raw = self.request_with_retry(texts).await?;

        let embeddings: Vec<_> = raw.iter().map(|e| normalize_to_f16(e)).collect();
        let result = EmbeddingResult::new(embeddings);
        if result.embeddings.iter().any(|e| e.len() != result.dimension) {
            return Err(EmbedError::unexpected_response(
                "embeddings of different dimensions in one response",
            ));
        }
        self.dimension.store(result.dimension, Ordering::Relaxed);
        Ok(result)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    fn provider_name(&self) -> &str {
        "remote"
    }
}
