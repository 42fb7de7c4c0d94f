//! OpenAI-compatible embedding and captioning backend

use super::{l2_normalize, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Instruction sent to the multimodal model for each image
const CAPTION_INSTRUCTION: &str = "Describe this image in detail for a retrieval system.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Embedding client that talks to OpenAI-compatible endpoints
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: Client,
    embeddings_url: String,
    chat_url: String,
    model: String,
    caption_model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Build a new client from config; the API key is read from the
    /// environment variable the config names
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            Error::Config(format!(
                "embedding API key not set; export {}",
                config.api_key_env
            ))
        })?;

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| Error::Config("embedding API key is not valid in a header".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let base = config.endpoint.trim_end_matches('/');
        Ok(Self {
            client,
            embeddings_url: format!("{}/embeddings", base),
            chat_url: format!("{}/chat/completions", base),
            model: config.model.clone(),
            caption_model: config.caption_model.clone(),
            dimension: config.dimension,
        })
    }

    /// Map a non-success provider response onto the error taxonomy: bad
    /// requests are permanent, everything else (429, 5xx) is transient.
    fn classify_status(status: StatusCode, body: &str, context: &str) -> Error {
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            Error::InvalidInput(format!("{} rejected ({}): {}", context, status, body))
        } else {
            Error::Embedding(format!("{} failed ({}): {}", context, status, body))
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "refusing to embed empty text".to_string(),
            ));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(&self.embeddings_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Self::classify_status(status, &body, "embedding request"));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {}", e)))?;
        parsed.data.sort_by_key(|entry| entry.index);

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| Error::Embedding("provider returned no embedding".to_string()))?;

        if vector.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model,
                self.dimension,
                vector.len()
            )));
        }

        l2_normalize(vector)
    }

    async fn describe_image(&self, bytes: &[u8], mime: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput(
                "refusing to caption empty image data".to_string(),
            ));
        }

        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));
        let request = ChatRequest {
            model: &self.caption_model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: CAPTION_INSTRUCTION,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
        };

        debug!("Requesting caption for {} byte image", bytes.len());

        let response = self
            .client
            .post(&self.chat_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("caption request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Self::classify_status(status, &body, "caption request"));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse caption response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|caption| !caption.trim().is_empty())
            .ok_or_else(|| Error::Embedding("provider returned an empty caption".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str, api_key_env: &str, dimension: usize) -> EmbeddingConfig {
        std::env::set_var(api_key_env, "test-key");
        EmbeddingConfig {
            endpoint: endpoint.to_string(),
            api_key_env: api_key_env.to_string(),
            model: "test-embed".to_string(),
            caption_model: "test-caption".to_string(),
            dimension,
            concurrency: 4,
        }
    }

    #[tokio::test]
    async fn test_embed_text_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [3.0, 4.0], "index": 0}]
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_NORM", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let vector = embedder.embed_text("some paragraph").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_embed_text_rejects_empty_input_before_calling() {
        let server = MockServer::start().await;
        // No mock mounted: a request would come back 404 and show up as a
        // provider failure instead of the expected input rejection.
        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_EMPTY", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let err = embedder.embed_text("   \n  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_text_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_RATE", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let err = embedder.embed_text("text").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_embed_text_bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("malformed input"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_BAD", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let err = embedder.embed_text("text").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_embed_text_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0, 0.0], "index": 0}]
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_DIM", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let err = embedder.embed_text("text").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_describe_image_sends_data_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("data:image/png;base64,"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "A line chart of monthly revenue."}}]
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_CAPTION", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let caption = embedder
            .describe_image(b"fake png bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(caption, "A line chart of monthly revenue.");
    }

    #[tokio::test]
    async fn test_describe_image_empty_caption_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": ""}}]
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "CURATOR_TEST_KEY_EMPTYCAP", 2);
        let embedder = OpenAiEmbedder::new(&config).unwrap();

        let err = embedder
            .describe_image(b"fake png bytes", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let config = EmbeddingConfig {
            api_key_env: "CURATOR_TEST_KEY_DEFINITELY_UNSET".to_string(),
            ..EmbeddingConfig::default()
        };
        let err = OpenAiEmbedder::new(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
