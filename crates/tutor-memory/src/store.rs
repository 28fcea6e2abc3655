//! ChunkStore trait definition for vector store backends.
//!
//! Every chunk belongs to exactly one [`Collection`]. Searches never cross
//! collections except through [`ChunkStore::search_scoped`], which queries a
//! user's own collection and the global corpus separately.

use async_trait::async_trait;
use tutor_models::UserId;

use crate::chunk::{Collection, DocumentChunk, ScopedHits, SearchHit, SourceSummary};
use crate::error::Result;

/// Trait for document chunk storage backends.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Store chunks. Chunks may target different collections.
    async fn insert_many(&self, chunks: Vec<DocumentChunk>) -> Result<()>;

    /// Search one collection for the chunks most similar to `query_embedding`.
    ///
    /// Results are ordered by similarity (highest first); equal scores keep
    /// insertion order.
    async fn search(
        &self,
        query_embedding: &[f32],
        collection: &Collection,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Uploaded documents in a collection, oldest first.
    async fn list_sources(&self, collection: &Collection) -> Result<Vec<SourceSummary>>;

    /// Number of chunks in a collection.
    async fn count(&self, collection: &Collection) -> Result<usize>;

    /// Delete every chunk of a collection, returning how many were removed.
    async fn clear(&self, collection: &Collection) -> Result<usize>;

    /// Search the user's collection and the global collection, `limit` hits each.
    async fn search_scoped(
        &self,
        query_embedding: &[f32],
        user_id: UserId,
        limit: usize,
    ) -> Result<ScopedHits> {
        tracing::debug!(user_id = %user_id, limit = limit, "Scoped chunk search");

        let user = self
            .search(query_embedding, &Collection::User(user_id), limit)
            .await?;
        let global = self
            .search(query_embedding, &Collection::Global, limit)
            .await?;
        Ok(ScopedHits { user, global })
    }
}
