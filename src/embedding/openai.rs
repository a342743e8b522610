//! OpenAI-compatible embeddings API client.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;

use super::{EmbeddingClient, EmbeddingClientError};

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbeddingClient {
    /// Build a client from embedding configuration.
    ///
    /// Requires an API key and a model name; the vector dimension is passed
    /// through to the service so the index and the provider stay in sync.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingClientError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                EmbeddingClientError::Permanent("missing embedding API key".to_string())
            })?;
        if config.model.trim().is_empty() {
            return Err(EmbeddingClientError::Permanent(
                "missing embedding model name".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {api_key}");
        let auth_value = HeaderValue::from_str(&auth).map_err(|_| {
            EmbeddingClientError::Permanent("embedding API key is not a valid header".to_string())
        })?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent("docingest/0.1")
            .default_headers(headers)
            .build()
            .map_err(|err| EmbeddingClientError::Permanent(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: Some(config.dimension),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: &texts,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let mut parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|err| EmbeddingClientError::Permanent(err.to_string()))?;
            parsed.data.sort_by_key(|entry| entry.index);
            if parsed.data.len() > texts.len() {
                return Err(EmbeddingClientError::Permanent(format!(
                    "service returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                )));
            }
            return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            Err(EmbeddingClientError::RateLimited(body))
        } else if status.is_server_error() {
            Err(EmbeddingClientError::Transient(format!("{status}: {body}")))
        } else {
            Err(EmbeddingClientError::Permanent(format!("{status}: {body}")))
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> EmbeddingClientError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        EmbeddingClientError::Transient(err.to_string())
    } else {
        EmbeddingClientError::Permanent(err.to_string())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::new(&EmbeddingConfig {
            provider: EmbeddingProvider::OpenAI,
            base_url: server.base_url(),
            api_key: Some("sk-test".to_string()),
            model: "text-embedding-3-small".to_string(),
            dimension: 3,
            batch_size: 50,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn embed_aligns_vectors_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        json!({
                            "model": "text-embedding-3-small",
                            "input": ["alpha", "beta"],
                            "dimensions": 3
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.4, 0.5, 0.6] },
                        { "index": 0, "embedding": [0.1, 0.2, 0.3] }
                    ]
                }));
            })
            .await;

        let client = client_for(&server);
        let vectors = client
            .embed(vec!["alpha".to_string(), "beta".to_string()])
            .await
            .expect("embed");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    }

    #[tokio::test]
    async fn rate_limit_is_distinguishable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(429).body("slow down");
            })
            .await;

        let client = client_for(&server);
        let error = client.embed(vec!["alpha".to_string()]).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::RateLimited(_)));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(503).body("overloaded");
            })
            .await;

        let client = client_for(&server);
        let error = client.embed(vec!["alpha".to_string()]).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::Transient(_)));
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(400).body("bad request");
            })
            .await;

        let client = client_for(&server);
        let error = client.embed(vec!["alpha".to_string()]).await.unwrap_err();
        assert!(matches!(error, EmbeddingClientError::Permanent(_)));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let server = MockServer::start_async().await;
        let client = client_for(&server);
        let vectors = client.embed(Vec::new()).await.expect("embed");
        assert!(vectors.is_empty());
    }
}
