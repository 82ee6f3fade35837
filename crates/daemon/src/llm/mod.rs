use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use engine::{SceneDescriptor, Utterance};

use crate::collaborators::{EmbeddingKind, Embedder, SceneDetector, Summarizer, Transcriber, Translator};

/// Language queries are translated into before text embedding.
pub const COMMON_LANGUAGE: &str = "en";

/// Client for the ML service that hosts speech, scene, summarization,
/// embedding and translation models.
pub struct MlServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    utterances: Vec<Utterance>,
}

#[derive(Deserialize)]
struct ScenesResponse {
    scenes: Vec<SceneDescriptor>,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    text: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<String>,
}

impl MlServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build ML service HTTP client")?;
        Ok(MlServiceClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("ML service request to {} failed", path))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .with_context(|| format!("Invalid response format from ML service {}", path))
        } else {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            Err(anyhow::anyhow!("ML service {} returned error {}: {}", path, status, error_text))
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for MlServiceClient {
    async fn transcribe(&self, media: &Path, language_code: &str) -> Result<Vec<Utterance>> {
        let response: TranscribeResponse = self
            .post_json(
                "/transcribe",
                serde_json::json!({
                    "media_path": media.to_string_lossy(),
                    "language_code": language_code,
                }),
            )
            .await?;
        Ok(response.utterances)
    }
}

#[async_trait::async_trait]
impl SceneDetector for MlServiceClient {
    async fn detect_scenes(&self, media: &Path, threshold: f64) -> Result<Vec<SceneDescriptor>> {
        let response: ScenesResponse = self
            .post_json(
                "/scenes/detect",
                serde_json::json!({
                    "media_path": media.to_string_lossy(),
                    "threshold": threshold,
                }),
            )
            .await?;
        Ok(response.scenes)
    }
}

#[async_trait::async_trait]
impl Summarizer for MlServiceClient {
    async fn summarize(&self, images: &[String], prompt: &str) -> Result<String> {
        let response: SummarizeResponse = self
            .post_json(
                "/summarize",
                serde_json::json!({
                    "images": images,
                    "prompt": prompt,
                }),
            )
            .await?;
        Ok(response.text)
    }
}

#[async_trait::async_trait]
impl Embedder for MlServiceClient {
    async fn embed(&self, kind: EmbeddingKind, payload: &str) -> Result<Vec<f32>> {
        let response: EmbeddingResponse = match kind {
            EmbeddingKind::Text => {
                self.post_json("/embeddings/text", serde_json::json!({ "text": payload }))
                    .await?
            }
            EmbeddingKind::Image => {
                self.post_json("/embeddings/image", serde_json::json!({ "image": payload }))
                    .await?
            }
        };
        if response.embedding.is_empty() {
            anyhow::bail!("ML service returned an empty {:?} embedding", kind);
        }
        Ok(response.embedding)
    }
}

#[async_trait::async_trait]
impl Translator for MlServiceClient {
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>> {
        let response: TranslateResponse = self
            .post_json(
                "/translate",
                serde_json::json!({
                    "texts": texts,
                    "target_language": COMMON_LANGUAGE,
                }),
            )
            .await?;
        Ok(response.translations)
    }
}
