//! Index writer: batched, retried upserts into the vector store.

use crate::qdrant::types::PointRecord;
use crate::qdrant::{QdrantError, QdrantService, payload};

use super::retry::{RetryPolicy, run_with_retry};
use super::types::{CancellationFlag, ChunkFailure, EmbeddedChunk};

/// Writes embedded chunks into a Qdrant collection with retry on transient
/// failures.
pub struct IndexWriter {
    service: QdrantService,
    collection: String,
    vector_size: u64,
    retry: RetryPolicy,
}

/// Result of upserting a batch of embedded chunks.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    /// Number of records written to the index.
    pub written: usize,
    /// Chunks whose upsert reached a terminal failure.
    pub failed: Vec<ChunkFailure>,
}

impl IndexWriter {
    /// Wrap a Qdrant client for writes into `collection`.
    pub fn new(
        service: QdrantService,
        collection: String,
        vector_size: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            collection,
            vector_size,
            retry,
        }
    }

    /// Ensure the destination collection exists with the expected vector size
    /// and payload indexes. Called once before processing starts.
    pub async fn prepare(&self) -> Result<(), QdrantError> {
        self.service
            .create_collection_if_not_exists(&self.collection, self.vector_size)
            .await?;
        self.service.ensure_source_index(&self.collection).await?;
        tracing::debug!(collection = %self.collection, "Index ready for writes");
        Ok(())
    }

    /// Upsert one batch of embedded chunks.
    ///
    /// The batch is retried as a unit under the shared policy; exhausted
    /// retries report every chunk in the batch as failed rather than aborting
    /// the run.
    pub async fn upsert(
        &self,
        chunks: Vec<EmbeddedChunk>,
        cancel: &CancellationFlag,
    ) -> UpsertOutcome {
        if chunks.is_empty() {
            return UpsertOutcome::default();
        }

        let timestamp = payload::current_timestamp_rfc3339();
        let points: Vec<PointRecord> = chunks
            .iter()
            .map(|chunk| PointRecord {
                id: chunk.id.clone(),
                vector: chunk.vector.clone(),
                payload: payload::build_payload(
                    &chunk.source_url,
                    chunk.chunk_index,
                    &chunk.text,
                    &timestamp,
                ),
            })
            .collect();

        let result = run_with_retry(&self.retry, cancel, || {
            self.service.upsert_points(&self.collection, points.clone())
        })
        .await;

        match result {
            Ok(written) => UpsertOutcome {
                written,
                failed: Vec::new(),
            },
            Err(error) => {
                tracing::error!(
                    collection = %self.collection,
                    chunks = chunks.len(),
                    error = %error,
                    "Upsert batch failed after retries"
                );
                UpsertOutcome {
                    written: 0,
                    failed: chunks
                        .iter()
                        .map(|chunk| ChunkFailure {
                            chunk_id: format!("{}#{}", chunk.source_url, chunk.chunk_index),
                            reason: error.to_string(),
                        })
                        .collect(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QdrantConfig;
    use crate::pipeline::types::Chunk;
    use httpmock::{Method::PUT, MockServer};
    use std::time::Duration;

    fn writer_for(server: &MockServer, max_attempts: usize) -> IndexWriter {
        let service = QdrantService::new(&QdrantConfig {
            url: server.base_url(),
            collection_name: "docs".to_string(),
            api_key: None,
        })
        .expect("service");
        IndexWriter::new(
            service,
            "docs".to_string(),
            8,
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(1),
                multiplier: 2.0,
            },
        )
    }

    fn embedded(index: usize) -> EmbeddedChunk {
        EmbeddedChunk::new(
            &Chunk {
                source_url: "https://docs.example.com/page".to_string(),
                chunk_index: index,
                text: format!("chunk {index}"),
            },
            vec![0.1; 8],
        )
    }

    #[tokio::test]
    async fn upsert_reports_written_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(200).json_body(serde_json::json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let writer = writer_for(&server, 3);
        let outcome = writer
            .upsert(vec![embedded(0), embedded(1)], &CancellationFlag::default())
            .await;

        mock.assert();
        assert_eq!(outcome.written, 2);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_record_every_chunk() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(503).body("unavailable");
            })
            .await;

        let writer = writer_for(&server, 3);
        let outcome = writer
            .upsert(vec![embedded(0), embedded(1)], &CancellationFlag::default())
            .await;

        assert_eq!(mock.hits(), 3);
        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(
            outcome.failed[0].chunk_id,
            "https://docs.example.com/page#0"
        );
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let server = MockServer::start_async().await;
        let writer = writer_for(&server, 3);
        let outcome = writer.upsert(Vec::new(), &CancellationFlag::default()).await;
        assert_eq!(outcome.written, 0);
        assert!(outcome.failed.is_empty());
    }
}
