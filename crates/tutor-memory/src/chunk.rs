//! Document chunk data model.
//!
//! A `DocumentChunk` is a fragment of an uploaded document together with its
//! vector embedding. Chunks belong either to one user's private collection or
//! to the global corpus every user retrieves from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tutor_models::{ChunkId, UserId};

/// Default embedding dimension for OpenAI text-embedding-3-small.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Which collection a chunk lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// A single user's uploads.
    User(UserId),
    /// Shared course material.
    Global,
}

impl Collection {
    /// Stable key, also used as the storage file stem.
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("user-{}", id),
            Self::Global => "global".to_string(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A text fragment with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,

    pub collection: Collection,

    /// File name the chunk was cut from.
    pub source: String,

    /// Position of the chunk within its source.
    pub index: usize,

    pub content: String,

    pub embedding: Vec<f32>,

    pub created_at: DateTime<Utc>,
}

impl DocumentChunk {
    /// Create a chunk with a generated ID and the current timestamp.
    pub fn new(
        collection: Collection,
        source: impl Into<String>,
        index: usize,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: ChunkId::new(),
            collection,
            source: source.into(),
            index,
            content: content.into(),
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// A chunk matched by a similarity search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: DocumentChunk,

    /// Cosine similarity (higher is more similar).
    pub score: f32,
}

impl SearchHit {
    pub fn new(chunk: DocumentChunk, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// Hits from the user's own collection and from the global corpus.
#[derive(Debug, Clone, Default)]
pub struct ScopedHits {
    pub user: Vec<SearchHit>,
    pub global: Vec<SearchHit>,
}

impl ScopedHits {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.global.is_empty()
    }
}

/// One uploaded document as seen from its collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_keys() {
        assert_eq!(Collection::User(UserId(12)).key(), "user-12");
        assert_eq!(Collection::Global.key(), "global");
        assert_eq!(Collection::Global.to_string(), "global");
    }

    #[test]
    fn test_chunk_new() {
        let chunk = DocumentChunk::new(Collection::Global, "notes.pdf", 3, "text", vec![0.1; 4]);
        assert!(chunk.id.as_str().starts_with("chunk-"));
        assert_eq!(chunk.source, "notes.pdf");
        assert_eq!(chunk.index, 3);
        assert_eq!(chunk.embedding.len(), 4);
    }

    #[test]
    fn test_collection_serialization() {
        let json = serde_json::to_string(&Collection::User(UserId(3))).unwrap();
        assert_eq!(json, r#"{"user":3}"#);
        let json = serde_json::to_string(&Collection::Global).unwrap();
        assert_eq!(json, r#""global""#);
    }
}
