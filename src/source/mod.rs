//! Content source boundary: pages discovered by an external crawl service.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub mod tavily;

pub use tavily::TavilyCrawler;

/// A page discovered and extracted by the content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Canonical URL the content was extracted from.
    pub source_url: String,
    /// Raw text extracted from the page.
    pub raw_content: String,
}

/// A page the source failed to fetch or extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// URL of the page that failed.
    pub source_url: String,
    /// Human-readable failure reason reported by the source.
    pub reason: String,
}

/// One element of the discovery stream.
///
/// Per-page failures travel through the same stream as successful pages so
/// that a single broken page never aborts the whole fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    /// A successfully extracted page.
    Page(Document),
    /// A page-level fetch or extraction failure.
    Failed(PageFailure),
}

/// Crawl parameters forwarded to the content source.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Root URL the crawl starts from.
    pub root_url: String,
    /// Maximum link depth explored from the root.
    pub max_depth: usize,
    /// Maximum number of links followed per page.
    pub max_breadth: usize,
    /// Upper bound on the number of pages fetched.
    pub max_pages: usize,
    /// Optional free-text instructions guiding content extraction.
    pub instructions: Option<String>,
}

/// Errors that abort discovery as a whole, as opposed to per-page failures.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP layer failed before receiving a response.
    #[error("crawl request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The crawl service responded with an unexpected status code.
    #[error("unexpected crawl response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the crawl service.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Supplier of documents for one ingestion run.
///
/// Implementations yield pages as a finite stream. Sources that only produce
/// a complete batch expose that batch as the full stream; streaming sources
/// may yield pages while the crawl is still in progress.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Discover pages under `request.root_url`.
    ///
    /// Every page the crawl reports appears exactly once in the stream,
    /// either as [`SourceItem::Page`] or as [`SourceItem::Failed`].
    async fn fetch(
        &self,
        request: &CrawlRequest,
    ) -> Result<BoxStream<'static, SourceItem>, SourceError>;
}
