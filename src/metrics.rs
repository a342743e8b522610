use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing a single ingestion run.
///
/// These are the only values mutated from concurrent workers; everything else
/// in the pipeline flows through owned data.
#[derive(Default)]
pub struct RunCounters {
    documents_discovered: AtomicU64,
    documents_failed: AtomicU64,
    chunks_produced: AtomicU64,
    chunks_embedded: AtomicU64,
    chunks_upserted: AtomicU64,
    chunks_failed: AtomicU64,
}

impl RunCounters {
    /// Create an empty counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a page reported by the content source, successful or not.
    pub fn record_document_discovered(&self) {
        self.documents_discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document that failed at fetch, extraction, or chunking.
    pub fn record_document_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record chunks produced by splitting a document.
    pub fn add_chunks_produced(&self, count: u64) {
        self.chunks_produced.fetch_add(count, Ordering::Relaxed);
    }

    /// Record chunks that received embedding vectors.
    pub fn add_chunks_embedded(&self, count: u64) {
        self.chunks_embedded.fetch_add(count, Ordering::Relaxed);
    }

    /// Record chunks written to the vector index.
    pub fn add_chunks_upserted(&self, count: u64) {
        self.chunks_upserted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record chunks that exhausted retries or were otherwise lost.
    pub fn add_chunks_failed(&self, count: u64) {
        self.chunks_failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Number of pages seen so far, successful or failed.
    pub fn documents_discovered(&self) -> u64 {
        self.documents_discovered.load(Ordering::Relaxed)
    }

    /// Number of documents recorded as failed so far.
    pub fn documents_failed(&self) -> u64 {
        self.documents_failed.load(Ordering::Relaxed)
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            documents_discovered: self.documents_discovered.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            chunks_embedded: self.chunks_embedded.load(Ordering::Relaxed),
            chunks_upserted: self.chunks_upserted.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of run counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CountersSnapshot {
    /// Pages reported by the content source, successful or failed.
    pub documents_discovered: u64,
    /// Documents that failed at fetch, extraction, or chunking.
    pub documents_failed: u64,
    /// Chunks produced across all documents.
    pub chunks_produced: u64,
    /// Chunks that received embedding vectors.
    pub chunks_embedded: u64,
    /// Chunks written to the vector index.
    pub chunks_upserted: u64,
    /// Chunks recorded as failed.
    pub chunks_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = RunCounters::new();
        counters.record_document_discovered();
        counters.record_document_discovered();
        counters.record_document_failed();
        counters.add_chunks_produced(5);
        counters.add_chunks_embedded(4);
        counters.add_chunks_upserted(4);
        counters.add_chunks_failed(1);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.documents_discovered, 2);
        assert_eq!(snapshot.documents_failed, 1);
        assert_eq!(snapshot.chunks_produced, 5);
        assert_eq!(snapshot.chunks_embedded, 4);
        assert_eq!(snapshot.chunks_upserted, 4);
        assert_eq!(snapshot.chunks_failed, 1);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        let counters = RunCounters::new();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.documents_discovered, 0);
        assert_eq!(snapshot.chunks_upserted, 0);
    }
}
