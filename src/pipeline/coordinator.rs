//! Run orchestration: discovery fan-out, backpressure, and failure
//! aggregation.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use uuid::Uuid;

use crate::metrics::RunCounters;
use crate::source::{ContentSource, CrawlRequest, Document, SourceItem};

use super::chunking;
use super::embedder::BatchEmbedder;
use super::events::{EventBus, EventSender, PipelineEvent, RunState};
use super::types::{
    CancellationFlag, ChunkFailure, PipelineError, RunStatus, RunSummary,
};
use super::writer::IndexWriter;

/// Failure fractions computed over a handful of pages are noise, so the
/// mid-discovery abort check waits for this many documents. Once intake ends
/// the fraction is evaluated over everything the source reported.
const FAILURE_RATE_MIN_SAMPLE: u64 = 8;

/// Parameters governing a single ingestion run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Crawl request handed to the content source.
    pub crawl: CrawlRequest,
    /// Target chunk size in bytes.
    pub chunk_size: usize,
    /// Overlap carried between consecutive chunks, in bytes.
    pub chunk_overlap: usize,
    /// Maximum number of documents processed concurrently.
    pub max_concurrent_documents: usize,
    /// Fraction of failed documents (0..=1) above which the run aborts.
    pub failure_threshold: f64,
}

/// Coordinates one ingestion run: pulls documents from the content source and
/// fans them through chunking, embedding, and upsert with bounded concurrency.
///
/// Per-document and per-chunk failures are captured into the run summary and
/// never unwind the pipeline; only the aggregate failure-rate check can turn
/// a run into an abort.
pub struct IngestionPipeline {
    source: Box<dyn ContentSource>,
    embedder: BatchEmbedder,
    writer: IndexWriter,
    options: RunOptions,
    events: EventBus,
}

enum DocumentOutcome {
    Processed { chunk_failures: Vec<ChunkFailure> },
    Skipped { source_url: String },
}

impl IngestionPipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        source: Box<dyn ContentSource>,
        embedder: BatchEmbedder,
        writer: IndexWriter,
        options: RunOptions,
    ) -> Self {
        Self {
            source,
            embedder,
            writer,
            options,
            events: EventBus::new(None),
        }
    }

    /// Attach an observer that receives structured progress events.
    #[must_use]
    pub fn with_observer(mut self, observer: EventSender) -> Self {
        self.events = EventBus::new(Some(observer));
        self
    }

    /// Execute the run to completion and report the summary.
    ///
    /// Returns `Err` only for setup failures (index bootstrap, crawl request
    /// rejected as a whole). A run that trips the failure-rate threshold
    /// still returns `Ok`, with [`RunStatus::Aborted`] in the summary.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let counters = RunCounters::new();
        let cancel = CancellationFlag::default();
        let max_in_flight = self.options.max_concurrent_documents.max(1);

        self.writer.prepare().await?;

        self.events
            .emit(PipelineEvent::StateChanged(RunState::Discovering));
        let pages = self.source.fetch(&self.options.crawl).await?;
        self.events
            .emit(PipelineEvent::StateChanged(RunState::Processing));

        let mut pages = pages.fuse();
        let mut in_flight = FuturesUnordered::new();
        let mut failed_documents: Vec<String> = Vec::new();
        let mut failed_chunks: Vec<ChunkFailure> = Vec::new();
        let mut draining = false;
        let mut aborted = false;

        let exceeds_threshold = |discovered: u64, failed: usize| {
            discovered > 0 && failed as f64 / discovered as f64 > self.options.failure_threshold
        };

        loop {
            tokio::select! {
                item = pages.next(), if !draining
                    && !cancel.is_cancelled()
                    && in_flight.len() < max_in_flight =>
                {
                    match item {
                        Some(SourceItem::Page(document)) => {
                            counters.record_document_discovered();
                            self.events.emit(PipelineEvent::DocumentDiscovered {
                                source_url: document.source_url.clone(),
                            });
                            in_flight.push(self.process_document(document, &cancel, &counters));
                        }
                        Some(SourceItem::Failed(failure)) => {
                            counters.record_document_discovered();
                            counters.record_document_failed();
                            self.events.emit(PipelineEvent::DocumentFailed {
                                source_url: failure.source_url.clone(),
                                reason: failure.reason,
                            });
                            failed_documents.push(failure.source_url);
                            if !aborted
                                && counters.documents_discovered() >= FAILURE_RATE_MIN_SAMPLE
                                && exceeds_threshold(
                                    counters.documents_discovered(),
                                    failed_documents.len(),
                                )
                            {
                                aborted = true;
                                cancel.cancel();
                            }
                        }
                        None => {
                            draining = true;
                            self.events.emit(PipelineEvent::StateChanged(RunState::Draining));
                            if !aborted
                                && exceeds_threshold(
                                    counters.documents_discovered(),
                                    failed_documents.len(),
                                )
                            {
                                aborted = true;
                                cancel.cancel();
                            }
                        }
                    }
                }
                Some(outcome) = in_flight.next() => {
                    match outcome {
                        DocumentOutcome::Processed { chunk_failures } => {
                            failed_chunks.extend(chunk_failures);
                        }
                        DocumentOutcome::Skipped { source_url } => {
                            failed_documents.push(source_url);
                            let sampled = draining
                                || counters.documents_discovered() >= FAILURE_RATE_MIN_SAMPLE;
                            if !aborted
                                && sampled
                                && exceeds_threshold(
                                    counters.documents_discovered(),
                                    failed_documents.len(),
                                )
                            {
                                aborted = true;
                                cancel.cancel();
                            }
                        }
                    }
                }
                else => break,
            }
        }

        let status = if aborted {
            tracing::error!(
                failed_documents = failed_documents.len(),
                discovered = counters.documents_discovered(),
                threshold = self.options.failure_threshold,
                "Failure rate exceeded threshold; run aborted"
            );
            self.events
                .emit(PipelineEvent::StateChanged(RunState::Aborted));
            RunStatus::Aborted
        } else {
            self.events
                .emit(PipelineEvent::StateChanged(RunState::Completed));
            RunStatus::Completed
        };

        failed_documents.sort();
        failed_documents.dedup();
        let mut failed_chunk_ids: Vec<String> = failed_chunks
            .into_iter()
            .map(|failure| failure.chunk_id)
            .collect();
        failed_chunk_ids.sort();

        let summary = RunSummary {
            run_id,
            status,
            counters: counters.snapshot(),
            failed_document_ids: failed_documents,
            failed_chunk_ids,
        };
        tracing::info!(
            run_id = %summary.run_id,
            status = ?summary.status,
            documents = summary.counters.documents_discovered,
            chunks_produced = summary.counters.chunks_produced,
            chunks_upserted = summary.counters.chunks_upserted,
            failures = summary.counters.chunks_failed + summary.counters.documents_failed,
            "Ingestion run finished"
        );
        Ok(summary)
    }

    /// Chunk one document and push its batches through embed → upsert.
    ///
    /// Every chunk ends up either upserted or in the returned failure list;
    /// after cancellation, batches that have not started are recorded as
    /// failed instead of being attempted.
    async fn process_document(
        &self,
        document: Document,
        cancel: &CancellationFlag,
        counters: &RunCounters,
    ) -> DocumentOutcome {
        let source_url = document.source_url.clone();

        let chunks = match chunking::split_document(
            &document,
            self.options.chunk_size,
            self.options.chunk_overlap,
        ) {
            Ok(chunks) => chunks,
            Err(error) => {
                counters.record_document_failed();
                self.events.emit(PipelineEvent::DocumentFailed {
                    source_url: source_url.clone(),
                    reason: error.to_string(),
                });
                return DocumentOutcome::Skipped { source_url };
            }
        };

        counters.add_chunks_produced(chunks.len() as u64);
        self.events.emit(PipelineEvent::DocumentChunked {
            source_url: source_url.clone(),
            chunk_count: chunks.len(),
        });

        let mut chunk_failures = Vec::new();
        for batch in chunks.chunks(self.embedder.batch_size()) {
            if cancel.is_cancelled() {
                chunk_failures.extend(batch.iter().map(|chunk| ChunkFailure {
                    chunk_id: chunk.identity(),
                    reason: "run cancelled before batch started".to_string(),
                }));
                continue;
            }

            let embed = self.embedder.embed_chunks(batch, cancel).await;
            counters.add_chunks_embedded(embed.embedded.len() as u64);
            self.events.emit(PipelineEvent::BatchEmbedded {
                chunk_count: embed.embedded.len(),
            });
            chunk_failures.extend(embed.failed);

            if !embed.embedded.is_empty() {
                let upsert = self.writer.upsert(embed.embedded, cancel).await;
                counters.add_chunks_upserted(upsert.written as u64);
                self.events.emit(PipelineEvent::BatchUpserted {
                    written: upsert.written,
                });
                chunk_failures.extend(upsert.failed);
            }
        }

        counters.add_chunks_failed(chunk_failures.len() as u64);
        for failure in &chunk_failures {
            self.events.emit(PipelineEvent::ChunkFailed {
                chunk_id: failure.chunk_id.clone(),
                reason: failure.reason.clone(),
            });
        }

        DocumentOutcome::Processed { chunk_failures }
    }
}
