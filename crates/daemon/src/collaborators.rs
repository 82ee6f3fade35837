use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use engine::{SceneDescriptor, Utterance};

use crate::media::ChunkArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    Text,
    /// Payload is a base64 encoded image.
    Image,
}

#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media: &Path, language_code: &str) -> Result<Vec<Utterance>>;
}

#[async_trait::async_trait]
pub trait SceneDetector: Send + Sync {
    async fn detect_scenes(&self, media: &Path, threshold: f64) -> Result<Vec<SceneDescriptor>>;
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// `images` are base64 frames sent alongside the prompt text.
    async fn summarize(&self, images: &[String], prompt: &str) -> Result<String>;
}

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, kind: EmbeddingKind, payload: &str) -> Result<Vec<f32>>;
}

#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Translates every string into the common retrieval language.
    /// Implementations must answer with one entry per input, in order.
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>>;
}

#[async_trait::async_trait]
pub trait MediaTool: Send + Sync {
    async fn probe_duration(&self, media: &Path) -> Result<f64>;

    async fn extract_segment(&self, media: &Path, start: f64, duration: f64) -> Result<ChunkArtifact>;
}

/// Key/value blob storage addressed by `/` separated keys.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Every key under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Where `key` lives, in a form a client can open.
    fn location(&self, key: &str) -> String;
}

/// Handles to every external service a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub scene_detector: Arc<dyn SceneDetector>,
    pub summarizer: Arc<dyn Summarizer>,
    pub embedder: Arc<dyn Embedder>,
    pub translator: Arc<dyn Translator>,
    pub media: Arc<dyn MediaTool>,
    pub store: Arc<dyn ObjectStore>,
}

impl Collaborators {
    /// Routes every model call through one ML service client.
    pub fn from_ml_service<C>(client: Arc<C>, media: Arc<dyn MediaTool>, store: Arc<dyn ObjectStore>) -> Self
    where
        C: Transcriber + SceneDetector + Summarizer + Embedder + Translator + 'static,
    {
        Collaborators {
            transcriber: client.clone(),
            scene_detector: client.clone(),
            summarizer: client.clone(),
            embedder: client.clone(),
            translator: client,
            media,
            store,
        }
    }
}
