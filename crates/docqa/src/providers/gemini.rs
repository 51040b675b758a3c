//! Gemini backend over the Google Generative Language REST API
//!
//! Generation goes through `:generateContent`, embeddings through
//! `:embedContent` / `:batchEmbedContents`. Every request authenticates with
//! the `x-goog-api-key` header.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{EmbeddingProvider, LlmProvider, ModelHandle, ModelLoader};
use crate::config::{GeminiConfig, API_KEY_VAR};
use crate::error::{Error, Result};
use crate::types::GenerationOptions;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// `batchEmbedContents` accepts at most 100 requests per call
const MAX_EMBED_BATCH: usize = 100;

/// Resource path for a model name, accepting both `gemini-1.5-flash` and `models/gemini-1.5-flash`
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Connection details shared by the generation and embedding clients
#[derive(Clone)]
struct Endpoint {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Endpoint {
    fn url(&self, model: &str, method: Option<&str>) -> String {
        let base = self.base_url.trim_end_matches('/');
        match method {
            Some(method) => format!("{}/{}:{}", base, model_path(model), method),
            None => format!("{}/{}", base, model_path(model)),
        }
    }
}

/// Gemini generation client
pub struct GeminiClient {
    endpoint: Endpoint,
    model: String,
}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        let response = self
            .endpoint
            .http
            .post(self.endpoint.url(&self.model, Some("generateContent")))
            .header(API_KEY_HEADER, &self.endpoint.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Gemini generation failed ({}): {}",
                status, body
            )));
        }

        let gen_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse Gemini response: {}", e)))?;

        gen_response
            .into_text()
            .ok_or_else(|| Error::llm("No text in Gemini response"))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Embedding task hint understood by the Gemini embedding models
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

/// Gemini embedding provider
pub struct GeminiEmbedder {
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
}

#[derive(serde::Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
    #[serde(rename = "taskType")]
    task_type: TaskType,
}

#[derive(serde::Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(serde::Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(serde::Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    fn request(&self, text: &str, task_type: TaskType) -> EmbedRequest {
        EmbedRequest {
            model: model_path(&self.model),
            content: Content {
                role: None,
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type,
        }
    }

    async fn embed_one(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        let response = self
            .endpoint
            .http
            .post(self.endpoint.url(&self.model, Some("embedContent")))
            .header(API_KEY_HEADER, &self.endpoint.api_key)
            .json(&self.request(text, task_type))
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Gemini embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Gemini embedding failed ({}): {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse Gemini embedding: {}", e)))?;

        Ok(embed_response.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalDocument).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|t| self.request(t, TaskType::RetrievalDocument))
                    .collect(),
            };

            let response = self
                .endpoint
                .http
                .post(self.endpoint.url(&self.model, Some("batchEmbedContents")))
                .header(API_KEY_HEADER, &self.endpoint.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Gemini batch request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::embedding(format!(
                    "Gemini batch embedding failed ({}): {}",
                    status, body
                )));
            }

            let embed_response: BatchEmbedResponse = response.json().await.map_err(|e| {
                Error::embedding(format!("Failed to parse Gemini batch response: {}", e))
            })?;

            if embed_response.embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Gemini returned {} embeddings for {} texts",
                    embed_response.embeddings.len(),
                    batch.len()
                )));
            }

            all_embeddings.extend(embed_response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalQuery).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "gemini-embedding"
    }
}

/// Binds the Gemini generation and embedding models after a credential handshake
pub struct GeminiModelLoader {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiModelLoader {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    fn api_key(&self) -> Result<String> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set. Add it to your environment or a .env file.",
                    API_KEY_VAR
                ))
            })
    }
}

#[async_trait]
impl ModelLoader for GeminiModelLoader {
    async fn load(&self) -> Result<ModelHandle> {
        let endpoint = Endpoint {
            http: self.http.clone(),
            base_url: self.config.base_url.clone(),
            api_key: self.api_key()?,
        };

        let url = endpoint.url(&self.config.generate_model, None);
        tracing::debug!("Verifying Gemini credential against {}", url);

        let response = endpoint
            .http
            .get(&url)
            .header(API_KEY_HEADER, &endpoint.api_key)
            .send()
            .await
            .map_err(|e| Error::Config(format!("Could not reach Gemini: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Config(format!(
                "Gemini rejected the model handshake for '{}' ({}): {}",
                self.config.generate_model, status, body
            )));
        }

        tracing::info!(
            "Gemini ready: generation={}, embedding={}",
            self.config.generate_model,
            self.config.embed_model
        );

        let llm = GeminiClient {
            endpoint: endpoint.clone(),
            model: self.config.generate_model.clone(),
        };
        let embedder = GeminiEmbedder {
            endpoint,
            model: self.config.embed_model.clone(),
            dimensions: self.config.dimensions,
        };

        Ok(ModelHandle::new(Arc::new(llm), Arc::new(embedder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::{extract::State, routing::get, Json, Router};
    use serde_json::{json, Value};

    /// Local stand-in for the Generative Language API: accepts any model
    /// handshake and answers batch embedding calls, recording batch sizes
    #[derive(Default)]
    struct FakeGemini {
        batches: parking_lot::Mutex<Vec<usize>>,
        /// Return one embedding fewer than requested
        short_by_one: bool,
    }

    async fn batch_embed(State(fake): State<Arc<FakeGemini>>, Json(body): Json<Value>) -> Json<Value> {
        let requested = body["requests"].as_array().map(Vec::len).unwrap_or(0);
        fake.batches.lock().push(requested);
        let returned = if fake.short_by_one {
            requested.saturating_sub(1)
        } else {
            requested
        };
        let embeddings: Vec<Value> = (0..returned)
            .map(|i| json!({ "values": [i as f32, 1.0, 0.0] }))
            .collect();
        Json(json!({ "embeddings": embeddings }))
    }

    async fn serve_fake(fake: Arc<FakeGemini>) -> ModelHandle {
        let app = Router::new()
            .route(
                "/models/:name",
                get(|| async { Json(json!({ "name": "models/gemini-1.5-flash" })) }).post(batch_embed),
            )
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        GeminiModelLoader::new(GeminiConfig {
            api_key: Some("test-key".to_string()),
            base_url: format!("http://{}", addr),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
        .load()
        .await
        .unwrap()
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_embed_batch_splits_into_requests_of_100() {
        let fake = Arc::new(FakeGemini::default());
        let handle = serve_fake(Arc::clone(&fake)).await;

        let vectors = handle.embedder.embed_batch(&texts(250)).await.unwrap();

        assert_eq!(vectors.len(), 250);
        assert_eq!(*fake.batches.lock(), vec![100, 100, 50]);
        // Order is preserved across batches
        assert_eq!(vectors[0][0], 0.0);
        assert_eq!(vectors[101][0], 1.0);
        assert_eq!(vectors[249][0], 49.0);
    }

    #[tokio::test]
    async fn test_embed_batch_rejects_missing_embeddings() {
        let fake = Arc::new(FakeGemini {
            short_by_one: true,
            ..FakeGemini::default()
        });
        let handle = serve_fake(Arc::clone(&fake)).await;

        let err = handle.embedder.embed_batch(&texts(3)).await.unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("returned 2 embeddings for 3 texts"));
        assert_eq!(err.kind(), ErrorKind::RemoteService);
    }

    #[test]
    fn test_model_path() {
        assert_eq!(model_path("gemini-1.5-flash"), "models/gemini-1.5-flash");
        assert_eq!(model_path("models/embedding-001"), "models/embedding-001");
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = Endpoint {
            http: reqwest::Client::new(),
            base_url: "https://example.test/v1beta/".to_string(),
            api_key: "k".to_string(),
        };
        assert_eq!(
            endpoint.url("gemini-1.5-flash", Some("generateContent")),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(
            endpoint.url("models/embedding-001", None),
            "https://example.test/v1beta/models/embedding-001"
        );
    }

    #[test]
    fn test_embed_request_shape() {
        let embedder = GeminiEmbedder {
            endpoint: Endpoint {
                http: reqwest::Client::new(),
                base_url: String::new(),
                api_key: String::new(),
            },
            model: "models/embedding-001".to_string(),
            dimensions: 768,
        };
        let value = serde_json::to_value(embedder.request("hello", TaskType::RetrievalQuery)).unwrap();
        assert_eq!(value["model"], "models/embedding-001");
        assert_eq!(value["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(value["content"]["parts"][0]["text"], "hello");
        assert!(value["content"].get("role").is_none());
    }

    #[test]
    fn test_generate_response_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Paris"},{"text":" is the capital."}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("Paris is the capital."));

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(blocked.into_text().is_none());

        let empty: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap();
        assert!(empty.into_text().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let loader = GeminiModelLoader::new(GeminiConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap();
        let err = loader.load().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains(API_KEY_VAR));
    }

    #[tokio::test]
    async fn test_unreachable_handshake_is_config_error() {
        let loader = GeminiModelLoader::new(GeminiConfig {
            api_key: Some("test-key".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
