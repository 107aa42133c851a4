//! Embedding backend abstraction.
//!
//! Defines the [`Embedder`] trait and two implementations:
//! - **[`DisabledEmbedder`]** returns errors; used when embeddings are
//!   not configured. Lexical strategies work without one.
//! - **[`HttpEmbedder`]** POSTs `{model, prompt}` to an HTTP backend and
//!   reads `{embedding: [f32]}` back.
//!
//! Calls are strictly one-at-a-time: ingestion awaits each chunk's vector
//! before requesting the next, which bounds load on the backend at the
//! cost of ingestion latency scaling with chunk count. Failures are not
//! retried; they surface as [`RetrievalError::EmbeddingBackend`].
//!
//! Also provides the BLOB codecs for storing vectors in SQLite:
//! [`vec_to_blob`] / [`blob_to_vec`].

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Result, RetrievalError};

/// A stateless client that turns text into a fixed-length float vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. Sequential; there is no batch variant.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Model identifier, e.g. `"nomic-embed-text"`.
    fn model_name(&self) -> &str;
    /// Vector dimensionality shared by every embedding in a store.
    fn dims(&self) -> usize;
}

/// Instantiate the embedder selected by configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "http" => Ok(Box::new(HttpEmbedder::new(config)?)),
        other => Err(RetrievalError::EmbeddingBackend(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Disabled ============

/// Fails every call with a descriptive error. Semantic and hybrid
/// strategies report this per-strategy; the others never embed.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RetrievalError::EmbeddingBackend(
            "embedding provider is disabled; set [embedding] provider in config".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }
}

// ============ HTTP backend ============

/// Embedding client for an HTTP backend such as a local Ollama instance.
///
/// Sends `POST <url>/api/embeddings` with `{"model": ..., "prompt": ...}`
/// and expects `{"embedding": [f32, ...]}` back.
pub struct HttpEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RetrievalError::EmbeddingBackend("embedding.model required for http provider".into())
        })?;
        let dims = config.dims.ok_or_else(|| {
            RetrievalError::EmbeddingBackend("embedding.dims required for http provider".into())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::EmbeddingBackend(e.to_string()))?;

        Ok(Self {
            model,
            dims,
            url,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RetrievalError::EmbeddingBackend(format!(
                    "connection error (is the backend running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::EmbeddingBackend(format!(
                "backend returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::EmbeddingBackend(e.to_string()))?;

        parse_embedding_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let arr = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            RetrievalError::EmbeddingBackend("invalid response: missing embedding array".into())
        })?;

    Ok(arr
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ BLOB codecs ============

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({"embedding": [0.25, -1.0, 2.0]});
        let vec = parse_embedding_response(&json).unwrap();
        assert_eq!(vec, vec![0.25f32, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_embedding_response_missing_field() {
        let json = serde_json::json!({"response": "not an embedding"});
        assert!(parse_embedding_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_embedder_errors() {
        let err = DisabledEmbedder.embed("anything").await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingBackend(_)));
    }
}
