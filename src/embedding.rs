//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and three backends:
//! - **hashing** — deterministic local feature-hashing embeddings; no
//!   network, no model download. Useful for development, tests, and
//!   exact-text retrieval.
//! - **openai** — `POST /v1/embeddings` with retry and backoff; requires
//!   `OPENAI_API_KEY`.
//! - **ollama** — `POST /api/embed` on a local Ollama instance.
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 codec for
//!   SQLite BLOB storage
//!
//! Remote providers retry transient failures (HTTP 429/5xx, network errors)
//! with exponential backoff: 1s, 2s, 4s, ... capped at 2^5. Non-429 client
//! errors fail immediately.

use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::QaError;

/// Interface all embedding backends implement. The embedding computation
/// itself lives in [`embed_texts`] (free function, dispatched on config).
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"` or `"hashing"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
}

/// Instantiate the provider named by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>, QaError> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(HashingProvider { dims: config.dims })),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => Err(QaError::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed a batch of texts, one vector per input in the same order.
pub async fn embed_texts(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, QaError> {
    if texts.iter().any(|t| t.is_empty()) {
        return Err(QaError::Embedding("cannot embed empty text".to_string()));
    }
    match config.provider.as_str() {
        "hashing" => Ok(texts
            .iter()
            .map(|t| hashing_embed(t, config.dims))
            .collect()),
        "openai" => embed_openai(config, texts).await,
        "ollama" => embed_ollama(config, texts).await,
        other => Err(QaError::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>, QaError> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| QaError::Embedding("empty embedding response".to_string()))
}

// ============ Hashing provider ============

/// Deterministic local embeddings via character-trigram feature hashing.
///
/// Identical texts always map to identical vectors, so an exact-text query
/// scores cosine 1.0 against its chunk. Semantically weak, operationally
/// dependency-free.
pub struct HashingProvider {
    dims: usize,
}

impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hashing"
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// FNV-1a, 64-bit. Enough spread for feature hashing without pulling in a
/// hashing crate.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hashing_embed(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    let lowered = text.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();

    if chars.len() < 3 {
        let h = fnv1a(lowered.as_bytes());
        v[(h % dims as u64) as usize] = 1.0;
        return v;
    }

    let mut buf = String::new();
    for window in chars.windows(3) {
        buf.clear();
        buf.extend(window);
        let h = fnv1a(buf.as_bytes());
        let bucket = (h % dims as u64) as usize;
        // One hash bit decides the sign, which keeps collisions from
        // accumulating in one direction.
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }

    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

// ============ OpenAI provider ============

pub struct OpenAiProvider {
    model: String,
    dims: usize,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, QaError> {
        let model = config.model.clone().ok_or_else(|| {
            QaError::Embedding("embedding.model required for openai provider".to_string())
        })?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(QaError::Embedding(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            model,
            dims: config.dims,
        })
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_openai(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, QaError> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| QaError::Embedding("OPENAI_API_KEY not set".to_string()))?;
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| QaError::Embedding("embedding.model required".to_string()))?;

    let url = config
        .url
        .as_deref()
        .unwrap_or("https://api.openai.com/v1/embeddings");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| QaError::Embedding(e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| QaError::Embedding(e.to_string()))?;
                    return parse_openai_response(&json);
                }
                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(format!("OpenAI API error {}: {}", status, body_text));
                    continue;
                }
                return Err(QaError::Embedding(format!(
                    "OpenAI API error {}: {}",
                    status, body_text
                )));
            }
            Err(e) => {
                last_err = Some(e.to_string());
                continue;
            }
        }
    }

    Err(QaError::Embedding(
        last_err.unwrap_or_else(|| "embedding failed after retries".to_string()),
    ))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, QaError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| QaError::Embedding("invalid OpenAI response: missing data".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                QaError::Embedding("invalid OpenAI response: missing embedding".to_string())
            })?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

// ============ Ollama provider ============

pub struct OllamaProvider {
    model: String,
    dims: usize,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, QaError> {
        let model = config.model.clone().ok_or_else(|| {
            QaError::Embedding("embedding.model required for ollama provider".to_string())
        })?;
        Ok(Self {
            model,
            dims: config.dims,
        })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_ollama(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, QaError> {
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| QaError::Embedding("embedding.model required".to_string()))?;
    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| QaError::Embedding(e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(format!("{}/api/embed", url))
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| QaError::Embedding(e.to_string()))?;
                    return parse_ollama_response(&json);
                }
                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(format!("Ollama API error {}: {}", status, body_text));
                    continue;
                }
                return Err(QaError::Embedding(format!(
                    "Ollama API error {}: {}",
                    status, body_text
                )));
            }
            Err(e) => {
                last_err = Some(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    url, e
                ));
                continue;
            }
        }
    }

    Err(QaError::Embedding(
        last_err.unwrap_or_else(|| "Ollama embedding failed after retries".to_string()),
    ))
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, QaError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            QaError::Embedding("invalid Ollama response: missing embeddings".to_string())
        })?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                QaError::Embedding("invalid Ollama response: embedding is not an array".to_string())
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }
    Ok(result)
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
