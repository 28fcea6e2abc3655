//! Local file-based chunk store.
//!
//! Each collection is persisted as one JSON array under the storage
//! directory (`user-42.json`, `global.json`) and searched with brute-force
//! cosine similarity, which is adequate for course-sized corpora.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chunk::{Collection, DocumentChunk, SearchHit, SourceSummary};
use crate::embedding::cosine_similarity;
use crate::error::{MemoryError, Result};
use crate::store::ChunkStore;

/// Local file-based chunk store.
pub struct LocalStore {
    storage_dir: PathBuf,
    /// Chunks per collection key, in insertion order.
    collections: RwLock<HashMap<String, Vec<DocumentChunk>>>,
}

impl LocalStore {
    /// Open (or create) a store in `storage_dir`, loading any saved collections.
    pub async fn new(storage_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)?;

        let store = Self {
            storage_dir,
            collections: RwLock::new(HashMap::new()),
        };

        store.load().await?;
        Ok(store)
    }

    fn collection_file(&self, key: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", key))
    }

    async fn load(&self) -> Result<()> {
        let mut collections = self.collections.write().await;

        for entry in std::fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Vec<DocumentChunk>>(&data) {
                Ok(chunks) => {
                    collections.insert(key.to_string(), chunks);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable collection"),
            }
        }

        let total: usize = collections.values().map(Vec::len).sum();
        info!(
            collections = collections.len(),
            chunks = total,
            "Loaded document collections"
        );
        Ok(())
    }

    /// Write one collection to disk via temp file + rename.
    fn save_collection(&self, key: &str, chunks: &[DocumentChunk]) -> Result<()> {
        let file = self.collection_file(key);
        if chunks.is_empty() {
            if file.exists() {
                std::fs::remove_file(&file)?;
            }
            return Ok(());
        }

        let json = serde_json::to_string(chunks)?;
        let temp_file = file.with_extension("json.tmp");
        std::fs::write(&temp_file, json)?;
        std::fs::rename(&temp_file, &file).map_err(|e| {
            MemoryError::DatabaseError(format!("failed to save {}: {}", file.display(), e))
        })?;

        debug!(collection = %key, count = chunks.len(), "Saved collection to disk");
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for LocalStore {
    async fn insert_many(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let mut collections = self.collections.write().await;

        let mut staged: Vec<(String, Vec<DocumentChunk>)> = Vec::new();
        for chunk in chunks {
            let key = chunk.collection.key();
            match staged.iter_mut().find(|(k, _)| *k == key) {
                Some((_, pending)) => pending.push(chunk),
                None => {
                    let mut pending = collections.get(&key).cloned().unwrap_or_default();
                    pending.push(chunk);
                    staged.push((key, pending));
                }
            }
        }

        // The map only changes once the collection is on disk.
        for (key, pending) in staged {
            self.save_collection(&key, &pending)?;
            collections.insert(key, pending);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        collection: &Collection,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let Some(chunks) = collections.get(&collection.key()) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = chunks
            .iter()
            .map(|c| SearchHit::new(c.clone(), cosine_similarity(query_embedding, &c.embedding)))
            .collect();

        // sort_by is stable, so equal scores keep insertion order
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        Ok(hits)
    }

    async fn list_sources(&self, collection: &Collection) -> Result<Vec<SourceSummary>> {
        let collections = self.collections.read().await;
        let Some(chunks) = collections.get(&collection.key()) else {
            return Ok(Vec::new());
        };

        let mut by_source: BTreeMap<&str, SourceSummary> = BTreeMap::new();
        for chunk in chunks {
            by_source
                .entry(chunk.source.as_str())
                .and_modify(|s| {
                    s.chunks += 1;
                    s.uploaded_at = s.uploaded_at.min(chunk.created_at);
                })
                .or_insert_with(|| SourceSummary {
                    source: chunk.source.clone(),
                    chunks: 1,
                    uploaded_at: chunk.created_at,
                });
        }

        let mut sources: Vec<SourceSummary> = by_source.into_values().collect();
        sources.sort_by_key(|s| s.uploaded_at);
        Ok(sources)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection.key()).map_or(0, Vec::len))
    }

    async fn clear(&self, collection: &Collection) -> Result<usize> {
        let key = collection.key();
        let mut collections = self.collections.write().await;
        self.save_collection(&key, &[])?;
        let removed = collections.remove(&key).map_or(0, |c| c.len());
        info!(collection = %key, removed = removed, "Cleared collection");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tutor_models::UserId;

    async fn create_test_store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().to_path_buf()).await.unwrap();
        (store, temp_dir)
    }

    fn chunk(collection: Collection, source: &str, content: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk::new(collection, source, 0, content, embedding)
    }

    #[tokio::test]
    async fn test_search_stays_in_collection() {
        let (store, _dir) = create_test_store().await;
        let alice = Collection::User(UserId(1));
        let bob = Collection::User(UserId(2));

        store
            .insert_many(vec![
                chunk(alice, "a.pdf", "alice notes", vec![1.0, 0.0]),
                chunk(bob, "b.pdf", "bob notes", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], &alice, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content, "alice notes");
        assert!(store.search(&[1.0, 0.0], &Collection::Global, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranking_and_ties() {
        let (store, _dir) = create_test_store().await;
        let global = Collection::Global;

        store
            .insert_many(vec![
                chunk(global, "s", "partial", vec![0.7, 0.7, 0.0]),
                chunk(global, "s", "first exact", vec![1.0, 0.0, 0.0]),
                chunk(global, "s", "none", vec![0.0, 0.0, 1.0]),
                chunk(global, "s", "second exact", vec![2.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], &global, 3).await.unwrap();
        let order: Vec<_> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
        assert_eq!(order, vec!["first exact", "second exact", "partial"]);
    }

    #[tokio::test]
    async fn test_search_scoped() {
        let (store, _dir) = create_test_store().await;
        store
            .insert_many(vec![
                chunk(Collection::User(UserId(1)), "mine.txt", "mine", vec![1.0, 0.0]),
                chunk(Collection::User(UserId(2)), "theirs.txt", "theirs", vec![1.0, 0.0]),
                chunk(Collection::Global, "course.pdf", "course", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search_scoped(&[1.0, 0.0], UserId(1), 4).await.unwrap();
        assert_eq!(hits.user.len(), 1);
        assert_eq!(hits.user[0].chunk.content, "mine");
        assert_eq!(hits.global.len(), 1);
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_list_sources_and_count() {
        let (store, _dir) = create_test_store().await;
        let col = Collection::User(UserId(5));
        store
            .insert_many(vec![
                chunk(col, "a.pdf", "1", vec![0.1]),
                chunk(col, "a.pdf", "2", vec![0.1]),
                chunk(col, "b.docx", "3", vec![0.1]),
            ])
            .await
            .unwrap();

        assert_eq!(store.count(&col).await.unwrap(), 3);
        let sources = store.list_sources(&col).await.unwrap();
        assert_eq!(sources.len(), 2);
        let a = sources.iter().find(|s| s.source == "a.pdf").unwrap();
        assert_eq!(a.chunks, 2);
    }

    #[tokio::test]
    async fn test_clear_only_target_collection() {
        let (store, dir) = create_test_store().await;
        let col = Collection::User(UserId(1));
        store
            .insert_many(vec![
                chunk(col, "a", "1", vec![0.1]),
                chunk(col, "a", "2", vec![0.1]),
                chunk(Collection::Global, "g", "3", vec![0.1]),
            ])
            .await
            .unwrap();

        assert_eq!(store.clear(&col).await.unwrap(), 2);
        assert_eq!(store.count(&col).await.unwrap(), 0);
        assert_eq!(store.count(&Collection::Global).await.unwrap(), 1);
        assert!(!dir.path().join("user-1.json").exists());
        assert_eq!(store.clear(&col).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_collection_untouched() {
        let (store, dir) = create_test_store().await;
        let col = Collection::User(UserId(1));
        store
            .insert_many(vec![chunk(col, "a.txt", "first", vec![1.0])])
            .await
            .unwrap();

        // A directory in the temp file's place makes the write fail.
        std::fs::create_dir(dir.path().join("user-1.json.tmp")).unwrap();
        let result = store
            .insert_many(vec![chunk(col, "b.txt", "second", vec![1.0])])
            .await;
        assert!(result.is_err());

        assert_eq!(store.count(&col).await.unwrap(), 1);
        let sources = store.list_sources(&col).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source, "a.txt");

        let reopened = LocalStore::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(reopened.count(&col).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_chunks() {
        let (store, dir) = create_test_store().await;
        let col = Collection::User(UserId(3));
        store
            .insert_many(vec![chunk(col, "a.txt", "kept", vec![1.0])])
            .await
            .unwrap();

        // remove_file refuses a directory
        let file = dir.path().join("user-3.json");
        std::fs::remove_file(&file).unwrap();
        std::fs::create_dir(&file).unwrap();

        assert!(store.clear(&col).await.is_err());
        assert_eq!(store.count(&col).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_path_buf();

        {
            let store = LocalStore::new(path.clone()).await.unwrap();
            store
                .insert_many(vec![chunk(Collection::Global, "g.pdf", "kept", vec![0.5, 0.5])])
                .await
                .unwrap();
        }

        let store = LocalStore::new(path).await.unwrap();
        let hits = store.search(&[0.5, 0.5], &Collection::Global, 1).await.unwrap();
        assert_eq!(hits[0].chunk.content, "kept");
    }
}
