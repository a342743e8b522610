//! Batching and retry wrapper over an embedding client.

use crate::embedding::EmbeddingClient;

use super::retry::{RetryPolicy, run_with_retry};
use super::types::{CancellationFlag, Chunk, ChunkFailure, EmbeddedChunk};

/// Embeds chunks in bounded sub-batches with retry on transient failures.
pub struct BatchEmbedder {
    client: Box<dyn EmbeddingClient>,
    batch_size: usize,
    retry: RetryPolicy,
}

/// Result of embedding a set of chunks.
///
/// Chunks appear in exactly one of the two lists; a chunk the service never
/// produced a vector for is a recorded failure, not a silent drop.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    /// Chunks paired with their vectors, in input order.
    pub embedded: Vec<EmbeddedChunk>,
    /// Chunks that reached a terminal embedding failure.
    pub failed: Vec<ChunkFailure>,
}

impl BatchEmbedder {
    /// Wrap an embedding client with batching and retry behavior.
    pub fn new(client: Box<dyn EmbeddingClient>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Maximum number of texts submitted per embedding request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed `chunks`, splitting them into sub-batches no larger than the
    /// configured batch size.
    ///
    /// A sub-batch that exhausts its retries reports every chunk it contained
    /// as failed and processing continues with the next sub-batch.
    pub async fn embed_chunks(&self, chunks: &[Chunk], cancel: &CancellationFlag) -> EmbedOutcome {
        let mut outcome = EmbedOutcome::default();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let result = run_with_retry(&self.retry, cancel, || self.client.embed(texts.clone()))
                .await;

            match result {
                Ok(vectors) => {
                    if vectors.len() < batch.len() {
                        tracing::warn!(
                            expected = batch.len(),
                            received = vectors.len(),
                            "Embedding service returned fewer vectors than inputs"
                        );
                    }
                    let mut vectors = vectors.into_iter();
                    for chunk in batch {
                        match vectors.next() {
                            Some(vector) => {
                                outcome.embedded.push(EmbeddedChunk::new(chunk, vector));
                            }
                            None => outcome.failed.push(ChunkFailure {
                                chunk_id: chunk.identity(),
                                reason: "embedding service returned no vector for this chunk"
                                    .to_string(),
                            }),
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(
                        chunks = batch.len(),
                        error = %error,
                        "Embedding sub-batch failed after retries"
                    );
                    for chunk in batch {
                        outcome.failed.push(ChunkFailure {
                            chunk_id: chunk.identity(),
                            reason: error.to_string(),
                        });
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingClientError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn chunk(index: usize) -> Chunk {
        Chunk {
            source_url: "https://docs.example.com/page".to_string(),
            chunk_index: index,
            text: format!("chunk {index}"),
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
        }
    }

    /// Client that counts calls and fails a configurable number of times.
    struct FlakyClient {
        calls: AtomicUsize,
        failures_before_success: usize,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingClient for FlakyClient {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(EmbeddingClientError::RateLimited("try later".to_string()));
            }
            Ok(texts.iter().map(|_| vec![0.5; self.dimension]).collect())
        }
    }

    /// Client that always returns one fewer vector than requested.
    struct ShortClient;

    #[async_trait]
    impl EmbeddingClient for ShortClient {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().skip(1).map(|_| vec![0.1, 0.2]).collect())
        }
    }

    #[tokio::test]
    async fn sub_batches_respect_the_batch_size() {
        let client = FlakyClient {
            calls: AtomicUsize::new(0),
            failures_before_success: 0,
            dimension: 2,
        };
        let chunks: Vec<Chunk> = (0..5).map(chunk).collect();
        let embedder = BatchEmbedder::new(Box::new(client), 2, fast_policy(3));
        let outcome = embedder
            .embed_chunks(&chunks, &CancellationFlag::default())
            .await;

        assert_eq!(outcome.embedded.len(), 5);
        assert!(outcome.failed.is_empty());
        // 5 chunks at batch size 2 means 3 requests
        let ids: Vec<&str> = outcome.embedded.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(
            outcome.embedded[3].id,
            EmbeddedChunk::id_for("https://docs.example.com/page", 3)
        );
    }

    #[tokio::test]
    async fn rate_limited_batches_eventually_succeed() {
        let client = FlakyClient {
            calls: AtomicUsize::new(0),
            failures_before_success: 2,
            dimension: 2,
        };
        let chunks: Vec<Chunk> = (0..3).map(chunk).collect();
        let embedder = BatchEmbedder::new(Box::new(client), 50, fast_policy(5));
        let outcome = embedder
            .embed_chunks(&chunks, &CancellationFlag::default())
            .await;

        assert_eq!(outcome.embedded.len(), 3);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_record_the_whole_sub_batch() {
        let client = FlakyClient {
            calls: AtomicUsize::new(0),
            failures_before_success: usize::MAX,
            dimension: 2,
        };
        let chunks: Vec<Chunk> = (0..2).map(chunk).collect();
        let embedder = BatchEmbedder::new(Box::new(client), 50, fast_policy(3));
        let outcome = embedder
            .embed_chunks(&chunks, &CancellationFlag::default())
            .await;

        assert!(outcome.embedded.is_empty());
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].chunk_id, "https://docs.example.com/page#0");
    }

    #[tokio::test]
    async fn missing_vectors_are_failures_not_silent_loss() {
        let chunks: Vec<Chunk> = (0..3).map(chunk).collect();
        let embedder = BatchEmbedder::new(Box::new(ShortClient), 50, fast_policy(1));
        let outcome = embedder
            .embed_chunks(&chunks, &CancellationFlag::default())
            .await;

        assert_eq!(outcome.embedded.len() + outcome.failed.len(), 3);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].chunk_id, "https://docs.example.com/page#2");
    }
}
