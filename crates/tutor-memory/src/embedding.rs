//! Embedding generation for semantic search.
//!
//! Chunks and queries are embedded through an OpenAI-compatible embeddings
//! endpoint. Without an API key the generator falls back to feature hashing
//! over words: texts sharing vocabulary still score as similar, so retrieval
//! keeps working offline and in tests.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::chunk::DEFAULT_EMBEDDING_DIM;
use crate::error::{MemoryError, Result};

/// Environment variable for OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable for OpenRouter API key (fallback).
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Overrides the embedding model name.
pub const EMBEDDING_MODEL_ENV: &str = "TUTORBOT_EMBEDDING_MODEL";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

const OPENAI_API_URL: &str = "https://api.openai.com/v1/embeddings";
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/embeddings";

/// Inputs sent per embeddings request.
const MAX_BATCH: usize = 64;

/// Where embeddings come from.
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API.
    OpenAI { api_key: String, model: String },
    /// OpenRouter's OpenAI-compatible embeddings API.
    OpenRouter { api_key: String, model: String },
    /// Local feature hashing, no network.
    HashBased { dimension: usize },
}

impl EmbeddingProvider {
    /// Pick a provider from the environment: OpenAI key first, then
    /// OpenRouter, else hashing.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_override = lookup(EMBEDDING_MODEL_ENV).filter(|m| !m.trim().is_empty());

        if let Some(api_key) = lookup(OPENAI_API_KEY_ENV).filter(|k| !k.is_empty()) {
            debug!("Using OpenAI embedding provider");
            return Self::OpenAI {
                api_key,
                model: model_override.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            };
        }

        if let Some(api_key) = lookup(OPENROUTER_API_KEY_ENV).filter(|k| !k.is_empty()) {
            debug!("Using OpenRouter embedding provider");
            return Self::OpenRouter {
                api_key,
                model: model_override.unwrap_or_else(|| format!("openai/{}", DEFAULT_MODEL)),
            };
        }

        warn!("No embedding API key found, using hashed word features");
        Self::HashBased {
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }

    /// `false` for the hashing fallback.
    pub fn is_real(&self) -> bool {
        !matches!(self, Self::HashBased { .. })
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::OpenAI { .. } | Self::OpenRouter { .. } => DEFAULT_EMBEDDING_DIM,
            Self::HashBased { dimension } => *dimension,
        }
    }

    fn target(&self) -> Option<ApiTarget<'_>> {
        match self {
            Self::OpenAI { api_key, model } => Some(ApiTarget {
                url: OPENAI_API_URL,
                api_key,
                model,
            }),
            Self::OpenRouter { api_key, model } => Some(ApiTarget {
                url: OPENROUTER_API_URL,
                api_key,
                model,
            }),
            Self::HashBased { .. } => None,
        }
    }
}

struct ApiTarget<'a> {
    url: &'static str,
    api_key: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Turns text into vectors.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: EmbeddingProvider,
    client: reqwest::Client,
}

impl EmbeddingGenerator {
    pub fn new(provider: EmbeddingProvider) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EmbeddingProvider::from_env())
    }

    /// Offline generator, used by tests.
    pub fn hash_based(dimension: usize) -> Self {
        Self::new(EmbeddingProvider::HashBased { dimension })
    }

    pub fn is_real(&self) -> bool {
        self.provider.is_real()
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| MemoryError::EmbeddingError("Empty embedding response".to_string()))
    }

    /// Embed many texts, one vector per input in input order.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let Some(target) = self.provider.target() else {
            let dimension = self.provider.dimension();
            return Ok(texts.iter().map(|t| hashed_word_features(t, dimension)).collect());
        };

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let vectors = self.request(&target, batch).await?;
            if vectors.len() != batch.len() {
                return Err(MemoryError::EmbeddingError(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
        }
        debug!(count = embeddings.len(), model = target.model, "Generated embeddings");
        Ok(embeddings)
    }

    async fn request(&self, target: &ApiTarget<'_>, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(target.url)
            .bearer_auth(target.api_key)
            .json(&serde_json::json!({
                "model": target.model,
                "input": inputs
            }))
            .send()
            .await
            .map_err(|e| MemoryError::EmbeddingError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MemoryError::EmbeddingError(e.to_string()))?;
        if !status.is_success() {
            return Err(MemoryError::EmbeddingError(format!(
                "Embeddings API error {}: {}",
                status, body
            )));
        }

        parse_embedding_response(&body)
    }
}

/// Vectors from an embeddings response body, ordered by their `index`.
fn parse_embedding_response(body: &str) -> Result<Vec<Vec<f32>>> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| MemoryError::EmbeddingError(format!("Invalid response: {}", e)))?;

    let mut data: Vec<(usize, Vec<f32>)> = response
        .data
        .into_iter()
        .enumerate()
        .map(|(position, d)| (d.index.unwrap_or(position), d.embedding))
        .collect();
    data.sort_by_key(|(index, _)| *index);
    Ok(data.into_iter().map(|(_, v)| v).collect())
}

/// Signed feature hashing over lowercase words, scaled to unit length.
/// Text without words maps to the zero vector.
fn hashed_word_features(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut features = vec![0.0f32; dimension];
    if dimension == 0 {
        return features;
    }

    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let hash = hasher.finish();
        let slot = (hash % dimension as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        features[slot] += sign;
    }

    let norm = features.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        features.iter_mut().for_each(|x| *x /= norm);
    }
    features
}

/// Cosine similarity; mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
