//! Core data types and error definitions for the ingestion pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::CountersSnapshot;
use crate::qdrant::QdrantError;
use crate::source::SourceError;

/// A bounded slice of one document's text, the unit of retrieval.
///
/// `chunk_index` is dense and 0-based within the document, so the pair
/// `(source_url, chunk_index)` is globally unique and stable across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// URL of the document this chunk came from.
    pub source_url: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Chunk text, including any overlap carried from the previous chunk.
    pub text: String,
}

impl Chunk {
    /// Human-readable identity used in failure reports.
    pub fn identity(&self) -> String {
        format!("{}#{}", self.source_url, self.chunk_index)
    }
}

/// Chunk paired with its embedding vector, ready for upsert.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// Stable point id derived from `(source_url, chunk_index)`.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// URL of the originating document.
    pub source_url: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Chunk text carried along for payload storage.
    pub text: String,
}

impl EmbeddedChunk {
    /// Pair a chunk with its vector, deriving the stable point id.
    pub fn new(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: Self::id_for(&chunk.source_url, chunk.chunk_index),
            vector,
            source_url: chunk.source_url.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
        }
    }

    /// Derive the stable point id for a `(source_url, chunk_index)` pair.
    ///
    /// UUIDv5 over the URL namespace, so re-ingesting the same source with
    /// the same chunking parameters overwrites prior records in place.
    pub fn id_for(source_url: &str, chunk_index: usize) -> String {
        let name = format!("{source_url}#{chunk_index}");
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }
}

/// A chunk that reached a terminal failure, with its identity preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    /// Identity of the failed chunk (`source_url#chunk_index`).
    pub chunk_id: String,
    /// Why the chunk failed.
    pub reason: String,
}

/// Errors produced while splitting a document into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The document contained no text worth indexing.
    #[error("document has no extractable text")]
    EmptyDocument,
    /// Chunking was configured with an impossible size budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in every chunk.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidOverlap {
        /// Configured overlap.
        overlap: usize,
        /// Configured chunk size.
        chunk_size: usize,
    },
}

/// Fatal errors that prevent a run from producing a summary.
///
/// Per-document and per-chunk failures are captured in the summary instead;
/// only setup problems surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The content source rejected the crawl as a whole.
    #[error("content source request failed: {0}")]
    Source(#[from] SourceError),
    /// The vector index could not be prepared for writes.
    #[error("vector index bootstrap failed: {0}")]
    Bootstrap(#[from] QdrantError),
}

/// Terminal status of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// All discovered work reached a terminal state.
    Completed,
    /// The failed-document fraction exceeded the configured threshold.
    Aborted,
}

/// Summary record reported at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique id for this run.
    pub run_id: String,
    /// Terminal run status.
    pub status: RunStatus,
    /// Aggregate counters accumulated during the run.
    #[serde(flatten)]
    pub counters: CountersSnapshot,
    /// URLs of documents that failed fetch, extraction, or chunking.
    pub failed_document_ids: Vec<String>,
    /// Identities of chunks that failed embedding or upsert.
    pub failed_chunk_ids: Vec<String>,
}

/// Cooperative run-level cancellation flag.
///
/// Setting the flag stops new work from being pulled; in-flight network calls
/// are allowed to complete, and retry loops stop scheduling further attempts.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Request cancellation of the run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic_per_chunk() {
        let a = EmbeddedChunk::id_for("https://docs.example.com/page", 0);
        let b = EmbeddedChunk::id_for("https://docs.example.com/page", 0);
        assert_eq!(a, b);

        let other_index = EmbeddedChunk::id_for("https://docs.example.com/page", 1);
        let other_url = EmbeddedChunk::id_for("https://docs.example.com/other", 0);
        assert_ne!(a, other_index);
        assert_ne!(a, other_url);
    }

    #[test]
    fn point_id_is_a_uuid() {
        let id = EmbeddedChunk::id_for("https://docs.example.com/page", 2);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn cancellation_flag_is_shared_across_clones() {
        let flag = CancellationFlag::default();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
