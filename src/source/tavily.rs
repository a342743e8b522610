//! Tavily-style crawl API adapter.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::CrawlServiceConfig;

use super::{ContentSource, CrawlRequest, Document, PageFailure, SourceError, SourceItem};

/// HTTP adapter for a Tavily-style crawl-and-extract API.
pub struct TavilyCrawler {
    client: Client,
    base_url: String,
}

impl TavilyCrawler {
    /// Construct a new adapter from crawl service configuration.
    pub fn new(config: &CrawlServiceConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        if let Ok(value) = HeaderValue::from_str(&auth) {
            headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder()
            .user_agent("docingest/0.1")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ContentSource for TavilyCrawler {
    async fn fetch(
        &self,
        request: &CrawlRequest,
    ) -> Result<BoxStream<'static, SourceItem>, SourceError> {
        let body = CrawlBody {
            url: &request.root_url,
            max_depth: request.max_depth,
            max_breadth: request.max_breadth,
            limit: request.max_pages,
            extract_depth: "advanced",
            instructions: request.instructions.as_deref(),
        };

        tracing::info!(
            root_url = %request.root_url,
            max_depth = request.max_depth,
            max_breadth = request.max_breadth,
            max_pages = request.max_pages,
            "Requesting crawl"
        );

        let response = self
            .client
            .post(format!("{}/crawl", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = SourceError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Crawl request rejected");
            return Err(error);
        }

        let payload: CrawlResponse = response.json().await?;
        let items = into_items(payload);
        tracing::info!(pages = items.len(), "Crawl returned");

        Ok(stream::iter(items).boxed())
    }
}

/// Map the batch-shaped crawl response into the discovery stream's items.
///
/// Pages with empty extracted content are reported as failures rather than
/// flowing downstream as empty documents.
fn into_items(payload: CrawlResponse) -> Vec<SourceItem> {
    let mut items = Vec::with_capacity(payload.results.len() + payload.errors.len());

    for result in payload.results {
        match result.raw_content {
            Some(content) if !content.trim().is_empty() => {
                items.push(SourceItem::Page(Document {
                    source_url: result.url,
                    raw_content: content,
                }));
            }
            _ => {
                items.push(SourceItem::Failed(PageFailure {
                    source_url: result.url,
                    reason: "page extraction returned no content".to_string(),
                }));
            }
        }
    }

    for error in payload.errors {
        items.push(SourceItem::Failed(PageFailure {
            source_url: error.url,
            reason: error.reason,
        }));
    }

    items
}

#[derive(Serialize)]
struct CrawlBody<'a> {
    url: &'a str,
    max_depth: usize,
    max_breadth: usize,
    limit: usize,
    extract_depth: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Deserialize)]
struct CrawlResponse {
    #[serde(default)]
    results: Vec<CrawlResult>,
    #[serde(default)]
    errors: Vec<CrawlPageError>,
}

#[derive(Deserialize)]
struct CrawlResult {
    url: String,
    #[serde(default)]
    raw_content: Option<String>,
}

#[derive(Deserialize)]
struct CrawlPageError {
    url: String,
    #[serde(default, alias = "error")]
    reason: String,
}
