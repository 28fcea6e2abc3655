//! Document collections with semantic search for retrieval-augmented replies.
//!
//! Uploaded documents are converted to text, cut into overlapping chunks,
//! embedded and stored either in the uploader's own collection or in the
//! global corpus shared by every user.
//!
//! - **LocalStore**: file-backed [`ChunkStore`] with brute-force cosine search
//! - **EmbeddingGenerator**: OpenAI / OpenRouter embeddings with a hash-based
//!   fallback when no API key is set
//! - **Ingestor**: sniff → extract → chunk → embed → store
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tutor_memory::{ChunkStore, Collection, EmbeddingGenerator, Ingestor, LocalStore};
//! use tutor_models::UserId;
//!
//! # async fn example() -> tutor_memory::Result<()> {
//! let store: Arc<dyn ChunkStore> = Arc::new(LocalStore::new("/tmp/docs".into()).await?);
//! let embedder = EmbeddingGenerator::from_env();
//! let ingestor = Ingestor::new(store.clone(), embedder.clone(), 1000, 200)?;
//!
//! ingestor
//!     .ingest(Collection::User(UserId(42)), "notes.txt", b"Kirchhoff's laws...")
//!     .await?;
//!
//! let query = embedder.embed("current law").await?;
//! let hits = store.search_scoped(&query, UserId(42), 4).await?;
//! for hit in hits.user {
//!     println!("{:.2} {}", hit.score, hit.chunk.source);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod local;
pub mod store;

pub use chunk::{
    Collection, DocumentChunk, ScopedHits, SearchHit, SourceSummary, DEFAULT_EMBEDDING_DIM,
};
pub use embedding::{cosine_similarity, EmbeddingGenerator, EmbeddingProvider};
pub use error::{MemoryError, Result};
pub use ingest::{chunk_text, extract_text, sniff, FileKind, IngestReport, Ingestor};
pub use local::LocalStore;
pub use store::ChunkStore;
