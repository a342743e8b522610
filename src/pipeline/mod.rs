//! Document ingestion pipeline: chunking, batching, retries, and
//! orchestration.

pub mod chunking;
pub mod coordinator;
pub mod embedder;
pub mod events;
pub mod retry;
pub mod types;
pub mod writer;

pub use chunking::split_document;
pub use coordinator::{IngestionPipeline, RunOptions};
pub use embedder::{BatchEmbedder, EmbedOutcome};
pub use events::{EventSender, PipelineEvent, RunState};
pub use retry::RetryPolicy;
pub use types::{
    CancellationFlag, Chunk, ChunkFailure, ChunkingError, EmbeddedChunk, PipelineError, RunStatus,
    RunSummary,
};
pub use writer::{IndexWriter, UpsertOutcome};
