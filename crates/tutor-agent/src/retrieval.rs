//! Retrieval context from the user's documents and the global corpus.

use tracing::debug;
use tutor_memory::{ChunkStore, EmbeddingGenerator, ScopedHits, SearchHit};
use tutor_models::UserId;

use crate::error::Result;
use crate::prompts::CONTEXT_HEADER;

/// Search both collections and render the hits as a prompt block.
///
/// Returns an empty string when neither collection has anything.
pub async fn gather_context(
    store: &dyn ChunkStore,
    embedder: &EmbeddingGenerator,
    user_id: UserId,
    query: &str,
    k: usize,
) -> Result<String> {
    if k == 0 || query.trim().is_empty() {
        return Ok(String::new());
    }

    let embedding = embedder.embed(query).await?;
    let hits = store.search_scoped(&embedding, user_id, k).await?;
    debug!(
        user_id = %user_id,
        user_hits = hits.user.len(),
        global_hits = hits.global.len(),
        "Gathered retrieval context"
    );
    Ok(render_context(&hits))
}

/// Render hits as `[source:origin] text` blocks under a header.
pub fn render_context(hits: &ScopedHits) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut out = String::from(CONTEXT_HEADER);
    out.push('\n');
    let tagged = hits
        .user
        .iter()
        .map(|h| ("your notes", h))
        .chain(hits.global.iter().map(|h| ("course", h)));
    for (origin, hit) in tagged {
        push_hit(&mut out, origin, hit);
    }
    out
}

fn push_hit(out: &mut String, origin: &str, hit: &SearchHit) {
    out.push_str(&format!(
        "\n[{} | {}]\n{}\n",
        origin,
        hit.chunk.source,
        hit.chunk.content.trim()
    ));
}
