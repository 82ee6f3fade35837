use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use engine::ranking::{normalize, rank_scenes, MAX_RETRIEVAL_QUERIES, SCENES_PER_QUERY};
use engine::thumbnail_for_token;

use crate::collaborators::{EmbeddingKind, Embedder, ObjectStore, Translator};
use crate::embeddings::load_scene_embeddings;
use crate::error::PipelineError;

/// Scene tokens the model nominated per query for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkSelections {
    pub order: u32,
    pub selections: BTreeMap<String, Vec<String>>,
}

pub fn selections_prefix(movie_id: i64) -> String {
    format!("selections/{}/", movie_id)
}

pub fn selections_key(movie_id: i64, order: u32) -> String {
    format!("{}chunk_{}.json", selections_prefix(movie_id), order)
}

pub async fn save_selections(store: &dyn ObjectStore, movie_id: i64, selections: &ChunkSelections) -> Result<()> {
    store
        .put(&selections_key(movie_id, selections.order), serde_json::to_vec(selections)?)
        .await
}

/// Selection bundles of chunks with `order <= up_to_order`, sorted by order.
pub async fn load_selections(
    store: &dyn ObjectStore,
    movie_id: i64,
    up_to_order: u32,
) -> Result<Vec<ChunkSelections>> {
    let mut bundles = Vec::new();
    for key in store.list(&selections_prefix(movie_id)).await? {
        let Some(bytes) = store.get(&key).await? else {
            continue;
        };
        let bundle: ChunkSelections =
            serde_json::from_slice(&bytes).with_context(|| format!("Corrupt selection bundle {}", key))?;
        if bundle.order <= up_to_order {
            bundles.push(bundle);
        }
    }
    bundles.sort_by_key(|b| b.order);
    Ok(bundles)
}

/// Merges model nominations with image-embedding similarity into a short
/// scene list per retrieval query.
pub struct HybridSceneRetriever<'a> {
    pub embedder: &'a dyn Embedder,
    pub translator: &'a dyn Translator,
    pub store: &'a dyn ObjectStore,
}

impl HybridSceneRetriever<'_> {
    /// Maps each query (at most [`MAX_RETRIEVAL_QUERIES`]) to up to
    /// [`SCENES_PER_QUERY`] thumbnail references, most relevant first.
    pub async fn retrieve(
        &self,
        movie_id: i64,
        queries: &[String],
        selections: &[ChunkSelections],
    ) -> Result<BTreeMap<String, Vec<String>>, PipelineError> {
        let mut results = BTreeMap::new();
        if queries.len() > MAX_RETRIEVAL_QUERIES {
            warn!(
                count = queries.len(),
                kept = MAX_RETRIEVAL_QUERIES,
                "too many retrieval queries, extra ones ignored"
            );
        }
        let queries = &queries[..queries.len().min(MAX_RETRIEVAL_QUERIES)];
        if queries.is_empty() {
            return Ok(results);
        }

        let pool = load_scene_embeddings(self.store, movie_id)
            .await
            .map_err(PipelineError::Persistence)?;

        let translated = self
            .translator
            .translate(queries)
            .await
            .map_err(PipelineError::external("query translation"))?;
        if translated.len() != queries.len() {
            return Err(PipelineError::external("query translation")(anyhow::anyhow!(
                "expected {} translations, got {}",
                queries.len(),
                translated.len()
            )));
        }

        for (query, text) in queries.iter().zip(&translated) {
            let nominated: Vec<String> = selections
                .iter()
                .filter_map(|bundle| bundle.selections.get(query))
                .flatten()
                .filter_map(|token| {
                    let resolved = thumbnail_for_token(movie_id, token);
                    if resolved.is_none() {
                        warn!(token = %token, "unrecognised scene token");
                    }
                    resolved
                })
                .collect();

            let embedding = self
                .embedder
                .embed(EmbeddingKind::Text, text)
                .await
                .map_err(PipelineError::external("query embedding"))?;

            let ranked = rank_scenes(&normalize(&embedding), &nominated, &pool, SCENES_PER_QUERY);
            info!(
                query = %query,
                nominated = nominated.len(),
                from_nominations = ranked.iter().filter(|r| r.nominated).count(),
                picked = ranked.len(),
                "ranked scenes"
            );
            results.insert(query.clone(), ranked.into_iter().map(|r| r.scene).collect());
        }

        Ok(results)
    }
}
