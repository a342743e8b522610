use async_trait::async_trait;
use thiserror::Error;

use crate::config::{EmbeddingConfig, EmbeddingProvider};

pub mod openai;

pub use openai::OpenAiEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// The service signalled that request volume must slow down.
    #[error("embedding service rate limited the request: {0}")]
    RateLimited(String),
    /// Transport-level failure that a later attempt may not hit.
    #[error("transient embedding failure: {0}")]
    Transient(String),
    /// The provider rejected the request outright.
    #[error("embedding request failed: {0}")]
    Permanent(String),
}

impl EmbeddingClientError {
    /// Whether a retry with backoff can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one vector per supplied text, positionally aligned with the input.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Deterministic local embedding client.
///
/// Hashes each text's bytes into a normalized fixed-dimension vector. The
/// vectors carry no semantic signal; the client exists for offline runs and
/// for tests that need stable output without a network dependency.
pub struct DeterministicEmbeddingClient {
    dimension: usize,
}

impl DeterministicEmbeddingClient {
    /// Construct a client producing vectors of the given dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for DeterministicEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::Permanent(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|text| Self::encode(&text, self.dimension))
            .collect())
    }
}

/// Build the embedding client selected by configuration.
pub fn build_embedding_client(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    match config.provider {
        EmbeddingProvider::OpenAI => Ok(Box::new(OpenAiEmbeddingClient::new(config)?)),
        EmbeddingProvider::Deterministic => {
            Ok(Box::new(DeterministicEmbeddingClient::new(config.dimension)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_client_is_stable_and_normalized() {
        let client = DeterministicEmbeddingClient::new(8);
        let first = client
            .embed(vec!["documentation".to_string()])
            .await
            .expect("embed");
        let second = client
            .embed(vec!["documentation".to_string()])
            .await
            .expect("embed");
        assert_eq!(first, second);

        let norm: f32 = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn deterministic_client_aligns_output_with_input() {
        let client = DeterministicEmbeddingClient::new(4);
        let vectors = client
            .embed(vec!["one".to_string(), "two".to_string()])
            .await
            .expect("embed");
        assert_eq!(vectors.len(), 2);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn zero_dimension_is_rejected() {
        let client = DeterministicEmbeddingClient::new(0);
        let error = client.embed(vec!["text".to_string()]).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::Permanent(_)));
        assert!(!error.is_retryable());
    }
}
