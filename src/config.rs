use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::retry::RetryPolicy;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for an ingestion process.
///
/// Loaded once at startup and handed to each component at construction; no
/// part of the crate reads the environment after this point.
#[derive(Debug, Clone)]
pub struct Config {
    /// Crawl service settings.
    pub crawl: CrawlServiceConfig,
    /// Embedding service settings.
    pub embedding: EmbeddingConfig,
    /// Vector index settings.
    pub qdrant: QdrantConfig,
    /// Chunking, concurrency, and retry settings for the pipeline itself.
    pub pipeline: PipelineConfig,
}

/// Connection settings for the crawl service that discovers pages.
#[derive(Debug, Clone)]
pub struct CrawlServiceConfig {
    /// Base URL of the crawl API.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
}

/// Settings for the embedding service boundary.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding backend used to generate vector representations.
    pub provider: EmbeddingProvider,
    /// Base URL of the embedding API (OpenAI-compatible).
    pub base_url: String,
    /// Optional API key; required for the hosted provider.
    pub api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub model: String,
    /// Dimensionality of the produced vectors.
    pub dimension: usize,
    /// Maximum number of texts submitted in one embedding request.
    pub batch_size: usize,
}

/// Connection settings for the Qdrant instance that stores vectors.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL of the Qdrant instance.
    pub url: String,
    /// Name of the collection that receives upserts.
    pub collection_name: String,
    /// Optional API key required to access Qdrant.
    pub api_key: Option<String>,
}

/// Tuning knobs for chunking, concurrency, and failure handling.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target chunk size in bytes.
    pub chunk_size: usize,
    /// Overlap carried between consecutive chunks, in bytes.
    pub chunk_overlap: usize,
    /// Maximum number of documents processed concurrently.
    pub max_concurrent_documents: usize,
    /// Fraction of failed documents (0..=1) above which the run aborts.
    pub failure_threshold: f64,
    /// Backoff policy shared by the embedder and the index writer.
    pub retry: RetryPolicy,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Local hash-based vectors; useful for offline runs and tests.
    Deterministic,
}

impl Config {
    /// Load configuration from environment variables, validating along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            crawl: CrawlServiceConfig {
                base_url: load_env_or("CRAWL_API_URL", "https://api.tavily.com"),
                api_key: load_env("CRAWL_API_KEY")?,
            },
            embedding: EmbeddingConfig {
                provider: load_env_or("EMBEDDING_PROVIDER", "openai")
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
                base_url: load_env_or("EMBEDDING_API_URL", "https://api.openai.com/v1"),
                api_key: load_env_optional("OPENAI_API_KEY"),
                model: load_env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
                dimension: parse_env_or("EMBEDDING_DIMENSION", 1536)?,
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 50)?,
            },
            qdrant: QdrantConfig {
                url: load_env("QDRANT_URL")?,
                collection_name: load_env_or("QDRANT_COLLECTION_NAME", "docs-index"),
                api_key: load_env_optional("QDRANT_API_KEY"),
            },
            pipeline: PipelineConfig {
                chunk_size: parse_env_or("CHUNK_SIZE", 1000)?,
                chunk_overlap: parse_env_or("CHUNK_OVERLAP", 100)?,
                max_concurrent_documents: parse_env_or("MAX_CONCURRENT_DOCUMENTS", 8)?,
                failure_threshold: parse_env_or("DOCUMENT_FAILURE_THRESHOLD", 0.5)?,
                retry: RetryPolicy {
                    max_attempts: parse_env_or("RETRY_MAX_ATTEMPTS", 5)?,
                    base_delay: Duration::from_millis(parse_env_or("RETRY_BASE_DELAY_MS", 10_000)?),
                    multiplier: parse_env_or("RETRY_BACKOFF_MULTIPLIER", 2.0)?,
                },
            },
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "deterministic" => Ok(Self::Deterministic),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_known_values() {
        assert_eq!(
            "openai".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::OpenAI)
        );
        assert_eq!(
            "Deterministic".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Deterministic)
        );
        assert!("chroma".parse::<EmbeddingProvider>().is_err());
    }
}
