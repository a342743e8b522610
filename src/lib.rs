#![deny(missing_docs)]

//! Core library for the docingest documentation ingestion pipeline.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Run-level ingestion counters.
pub mod metrics;
/// Ingestion pipeline: chunking, batching, retries, and orchestration.
pub mod pipeline;
/// Qdrant vector index integration.
pub mod qdrant;
/// Content source boundary and the crawl API adapter.
pub mod source;
