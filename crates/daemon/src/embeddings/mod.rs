use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeMap;
use tracing::{info, warn};

use engine::{thumbnail_key, SceneDescriptor};

use crate::collaborators::{Collaborators, EmbeddingKind, ObjectStore};
use crate::error::PipelineError;

/// Thumbnail reference to image embedding, one blob per movie.
pub type SceneEmbeddings = BTreeMap<String, Vec<f32>>;

pub fn blob_key(movie_id: i64) -> String {
    format!("embeddings/{}.json", movie_id)
}

pub async fn load_scene_embeddings(store: &dyn ObjectStore, movie_id: i64) -> Result<SceneEmbeddings> {
    match store.get(&blob_key(movie_id)).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt scene embedding blob for movie {}", movie_id)),
        None => Ok(SceneEmbeddings::new()),
    }
}

/// Merges `new_entries` into the stored blob; new entries win on duplicate keys.
pub async fn merge_scene_embeddings(
    store: &dyn ObjectStore,
    movie_id: i64,
    new_entries: SceneEmbeddings,
) -> Result<usize> {
    let mut blob = load_scene_embeddings(store, movie_id).await?;
    blob.extend(new_entries);
    store
        .put(&blob_key(movie_id), serde_json::to_vec(&blob)?)
        .await?;
    Ok(blob.len())
}

/// Writes a thumbnail and an image embedding for every scene of chunk `order`.
pub async fn persist_chunk_scenes(
    collaborators: &Collaborators,
    movie_id: i64,
    order: u32,
    scenes: &[SceneDescriptor],
) -> Result<(), PipelineError> {
    let mut new_entries = SceneEmbeddings::new();

    for (i, scene) in scenes.iter().enumerate() {
        if scene.image.is_empty() {
            warn!(order, scene = i + 1, "scene has no frame image, skipping thumbnail");
            continue;
        }
        let jpeg = STANDARD
            .decode(scene.image.as_bytes())
            .context("scene frame image is not valid base64")
            .map_err(PipelineError::external("scene detection"))?;

        let key = thumbnail_key(movie_id, order, i + 1);
        collaborators
            .store
            .put(&key, jpeg)
            .await
            .map_err(PipelineError::Persistence)?;

        let embedding = collaborators
            .embedder
            .embed(EmbeddingKind::Image, &scene.image)
            .await
            .map_err(PipelineError::external("image embedding"))?;

        new_entries.insert(key, embedding);
    }

    if new_entries.is_empty() {
        return Ok(());
    }
    let added = new_entries.len();
    let total = merge_scene_embeddings(collaborators.store.as_ref(), movie_id, new_entries)
        .await
        .map_err(PipelineError::Persistence)?;
    info!(order, added, total, "stored scene embeddings");
    Ok(())
}
