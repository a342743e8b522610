//! Structured events emitted by the coordinator.
//!
//! Control flow only emits events; translating them into log lines (or any
//! other telemetry) happens here and in external observers, keeping the
//! pipeline contract free of logging concerns.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle states of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Waiting on the content source to report pages.
    Discovering,
    /// Documents are flowing through chunking, embedding, and upsert.
    Processing,
    /// Intake has ended; in-flight batches are reaching terminal states.
    Draining,
    /// All discovered work reached a terminal state.
    Completed,
    /// The failed-document fraction exceeded the configured threshold.
    Aborted,
}

/// Progress events observable during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The run moved to a new lifecycle state.
    StateChanged(RunState),
    /// The content source reported a page.
    DocumentDiscovered {
        /// URL of the discovered page.
        source_url: String,
    },
    /// A page failed fetch, extraction, or chunking.
    DocumentFailed {
        /// URL of the failed page.
        source_url: String,
        /// Why the page failed.
        reason: String,
    },
    /// A document was split into chunks.
    DocumentChunked {
        /// URL of the chunked document.
        source_url: String,
        /// Number of chunks produced.
        chunk_count: usize,
    },
    /// A batch of chunks received embedding vectors.
    BatchEmbedded {
        /// Number of chunks embedded.
        chunk_count: usize,
    },
    /// A batch of embedded chunks was written to the index.
    BatchUpserted {
        /// Number of records written.
        written: usize,
    },
    /// A chunk reached a terminal failure.
    ChunkFailed {
        /// Identity of the failed chunk.
        chunk_id: String,
        /// Why the chunk failed.
        reason: String,
    },
}

/// Channel half handed to external observers.
pub type EventSender = UnboundedSender<PipelineEvent>;

/// Internal fan-out point for pipeline events.
///
/// Every event is mirrored to tracing; an optional observer channel receives
/// the structured form. A dropped receiver silently detaches the observer.
#[derive(Default)]
pub(crate) struct EventBus {
    observer: Option<EventSender>,
}

impl EventBus {
    pub(crate) fn new(observer: Option<EventSender>) -> Self {
        Self { observer }
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        log_event(&event);
        if let Some(observer) = &self.observer {
            let _ = observer.send(event);
        }
    }
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StateChanged(state) => {
            tracing::info!(state = ?state, "Run state changed");
        }
        PipelineEvent::DocumentDiscovered { source_url } => {
            tracing::debug!(source_url = %source_url, "Document discovered");
        }
        PipelineEvent::DocumentFailed { source_url, reason } => {
            tracing::warn!(source_url = %source_url, reason = %reason, "Document failed");
        }
        PipelineEvent::DocumentChunked {
            source_url,
            chunk_count,
        } => {
            tracing::debug!(source_url = %source_url, chunks = chunk_count, "Document chunked");
        }
        PipelineEvent::BatchEmbedded { chunk_count } => {
            tracing::debug!(chunks = chunk_count, "Batch embedded");
        }
        PipelineEvent::BatchUpserted { written } => {
            tracing::debug!(written, "Batch upserted");
        }
        PipelineEvent::ChunkFailed { chunk_id, reason } => {
            tracing::warn!(chunk_id = %chunk_id, reason = %reason, "Chunk failed");
        }
    }
}
