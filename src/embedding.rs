//! Embedding provider abstraction and the hosted HTTP implementation.
//!
//! [`HostedEmbedder`] calls an OpenAI-compatible `POST {base_url}/embeddings`
//! endpoint (Hugging Face TEI serving the multilingual-e5 family, or any
//! gateway speaking the same shape) with batching, retry, and backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) retry with exponential
//!   backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5).
//! - Other 4xx responses fail immediately.
//! - Network errors retry.
//!
//! Exhausted retries and non-retryable failures surface as
//! [`AdvisorError::EmbeddingService`]; there is no local fallback.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::AdvisorError;

/// Maps text to fixed-dimension vectors.
///
/// One vector per input, same order, deterministic for a fixed model
/// version. Implementations must be safe for concurrent `embed` calls.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"intfloat/multilingual-e5-large"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1024`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper for single-text use cases such as embedding an
/// incoming search query.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| AdvisorError::EmbeddingService("empty embedding response".to_string()).into())
}

/// A no-op provider that always fails.
///
/// Used where a pipeline is wired up without embedding credentials, such
/// as dry-run ingestion; any attempt to embed reports a clear error.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AdvisorError::EmbeddingService("embedding provider is disabled".to_string()).into())
    }
}

/// Remote embedding backend reached over HTTP.
pub struct HostedEmbedder {
    base_url: String,
    model: String,
    dims: usize,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HostedEmbedder {
    /// Create a provider from configuration.
    ///
    /// Fails with [`AdvisorError::Configuration`] when the API key
    /// environment variable is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, AdvisorError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AdvisorError::Configuration(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            AdvisorError::EmbeddingService(format!("invalid response body: {}", e))
                        })?;
                        return parse_embeddings_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(AdvisorError::EmbeddingService(format!(
                            "embedding API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(AdvisorError::EmbeddingService(format!(
                        "embedding API error {}: {}",
                        status, body_text
                    ))
                    .into());
                }
                Err(e) => {
                    last_err = Some(AdvisorError::EmbeddingService(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| {
                AdvisorError::EmbeddingService("embedding failed after retries".to_string())
            })
            .into())
    }
}

#[async_trait]
impl EmbeddingProvider for HostedEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

/// Extract the `data[].embedding` arrays from an embeddings response,
/// in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            AdvisorError::EmbeddingService("invalid response: missing data array".to_string())
        })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                AdvisorError::EmbeddingService("invalid response: missing embedding".to_string())
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embeddings_response() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2], "index": 0 },
                { "embedding": [0.3, 0.4], "index": 1 },
            ]
        });
        let vecs = parse_embeddings_response(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[0], vec![0.1, 0.2]);
        assert_eq!(vecs[1], vec![0.3, 0.4]);
    }

    #[test]
    fn test_parse_missing_data_fails() {
        let json = serde_json::json!({ "error": "nope" });
        let err = parse_embeddings_response(&json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AdvisorError>(),
            Some(AdvisorError::EmbeddingService(_))
        ));
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
