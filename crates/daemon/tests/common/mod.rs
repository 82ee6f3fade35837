#![allow(dead_code)]

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use engine::synthesis::ANSWER_DELIMITER;
use engine::{SceneDescriptor, Utterance};
use moviemanager::collaborators::{
    Collaborators, EmbeddingKind, Embedder, MediaTool, SceneDetector, Summarizer, Transcriber, Translator,
};
use moviemanager::config::Config;
use moviemanager::db::Database;
use moviemanager::jobs::{JobManager, MediaInput, Pipeline, RunRequest};
use moviemanager::media::ChunkArtifact;
use moviemanager::store::FsObjectStore;

/// What the fake services answer for one chunk, keyed by the chunk file's content.
#[derive(Default, Clone)]
pub struct ChunkScript {
    pub utterances: Vec<Utterance>,
    pub scenes: Vec<SceneDescriptor>,
    /// Lines placed inside the selection block, e.g. `Q1: 1, 2`.
    pub selection: Option<String>,
}

impl ChunkScript {
    /// One line of dialogue and `scene_count` ten-second scenes.
    pub fn with_content(label: &str, scene_count: usize) -> Self {
        ChunkScript {
            utterances: vec![Utterance {
                speaker: "spk_0".into(),
                start: 1.0,
                end: 3.0,
                text: format!("LABEL:{} hello", label),
            }],
            scenes: (1..=scene_count).map(|k| scene(label, k)).collect(),
            selection: None,
        }
    }
}

pub fn scene_image(label: &str, k: usize) -> String {
    STANDARD.encode(format!("{}-s{}", label, k))
}

pub fn scene(label: &str, k: usize) -> SceneDescriptor {
    SceneDescriptor {
        start: (k as f64 - 1.0) * 10.0,
        end: k as f64 * 10.0,
        start_frame: (k as i64 - 1) * 240,
        end_frame: k as i64 * 240,
        image: scene_image(label, k),
    }
}

/// Every model-backed collaborator, answering from scripts and recording calls.
#[derive(Default)]
pub struct FakeServices {
    pub scripts: HashMap<String, ChunkScript>,
    pub final_response: Mutex<String>,
    pub fail_summary_for: Mutex<Option<String>>,
    pub fail_transcription_for: Mutex<Option<String>>,
    pub image_embeddings: HashMap<String, Vec<f32>>,
    pub text_embeddings: HashMap<String, Vec<f32>>,
    pub transcribed: Mutex<Vec<String>>,
    pub detected: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeServices {
    fn script(&self, media: &Path) -> Result<(String, ChunkScript)> {
        let label = std::fs::read_to_string(media)?.trim().to_string();
        let script = self.scripts.get(&label).cloned().unwrap_or_default();
        Ok((label, script))
    }

    pub fn transcribed(&self) -> Vec<String> {
        self.transcribed.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn label_of(prompt: &str, images: &[String]) -> Option<String> {
        if let Some(pos) = prompt.find("LABEL:") {
            let rest = &prompt[pos + "LABEL:".len()..];
            return rest.split_whitespace().next().map(String::from);
        }
        let bytes = STANDARD.decode(images.first()?).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        text.split("-s").next().map(String::from)
    }
}

#[async_trait::async_trait]
impl Transcriber for FakeServices {
    async fn transcribe(&self, media: &Path, _language_code: &str) -> Result<Vec<Utterance>> {
        let (label, script) = self.script(media)?;
        if self.fail_transcription_for.lock().unwrap().as_deref() == Some(label.as_str()) {
            return Err(anyhow!("transcription service timed out on {}", label));
        }
        self.transcribed.lock().unwrap().push(label);
        Ok(script.utterances)
    }
}

#[async_trait::async_trait]
impl SceneDetector for FakeServices {
    async fn detect_scenes(&self, media: &Path, _threshold: f64) -> Result<Vec<SceneDescriptor>> {
        let (label, script) = self.script(media)?;
        self.detected.lock().unwrap().push(label);
        Ok(script.scenes)
    }
}

#[async_trait::async_trait]
impl Summarizer for FakeServices {
    async fn summarize(&self, images: &[String], prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains(ANSWER_DELIMITER) {
            return Ok(self.final_response.lock().unwrap().clone());
        }

        let label = Self::label_of(prompt, images).ok_or_else(|| anyhow!("cannot tell which chunk this is"))?;
        if self.fail_summary_for.lock().unwrap().as_deref() == Some(label.as_str()) {
            return Err(anyhow!("summarizer unavailable for {}", label));
        }

        let mut response = format!("summary of {}", label);
        if let Some(selection) = self.scripts.get(&label).and_then(|s| s.selection.as_ref()) {
            response.push_str(&format!("\n\n[SCENE_SELECTION]\n{}\n[/SCENE_SELECTION]", selection));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Embedder for FakeServices {
    async fn embed(&self, kind: EmbeddingKind, payload: &str) -> Result<Vec<f32>> {
        let table = match kind {
            EmbeddingKind::Text => &self.text_embeddings,
            EmbeddingKind::Image => &self.image_embeddings,
        };
        Ok(table.get(payload).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
    }
}

#[async_trait::async_trait]
impl Translator for FakeServices {
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>> {
        Ok(texts.iter().map(|t| format!("en:{}", t)).collect())
    }
}

/// Slices a "video" by writing the slice start into a scratch file.
pub struct FakeMedia {
    pub duration: f64,
    pub scratch: TempDir,
    pub extracted: Mutex<Vec<PathBuf>>,
}

impl FakeMedia {
    pub fn new(duration: f64) -> Self {
        FakeMedia {
            duration,
            scratch: tempfile::tempdir().unwrap(),
            extracted: Mutex::new(Vec::new()),
        }
    }

    pub fn extracted(&self) -> Vec<PathBuf> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MediaTool for FakeMedia {
    async fn probe_duration(&self, _media: &Path) -> Result<f64> {
        Ok(self.duration)
    }

    async fn extract_segment(&self, _media: &Path, start: f64, _duration: f64) -> Result<ChunkArtifact> {
        let file = tempfile::NamedTempFile::new_in(self.scratch.path())?;
        std::fs::write(file.path(), format!("at{}", start as u64))?;
        let artifact = ChunkArtifact::new(file.into_temp_path());
        self.extracted.lock().unwrap().push(artifact.path().to_path_buf());
        Ok(artifact)
    }
}

pub struct Harness {
    pub db: Arc<Database>,
    pub jobs: Arc<JobManager>,
    pub services: Arc<FakeServices>,
    pub media: Arc<FakeMedia>,
    pub store_dir: TempDir,
    pub media_dir: TempDir,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub fn new(services: FakeServices) -> Self {
        Self::with_media(services, FakeMedia::new(0.0))
    }

    pub fn with_media(services: FakeServices, media: FakeMedia) -> Self {
        Self::with_database(services, media, Database::open_in_memory().unwrap())
    }

    pub fn with_database(services: FakeServices, media: FakeMedia, db: Database) -> Self {
        let db = Arc::new(db);
        let jobs = Arc::new(JobManager::new());
        let services = Arc::new(services);
        let media = Arc::new(media);
        let store_dir = tempfile::tempdir().unwrap();
        let media_dir = tempfile::tempdir().unwrap();

        let collaborators = Collaborators::from_ml_service(
            services.clone(),
            media.clone(),
            Arc::new(FsObjectStore::new(store_dir.path())),
        );
        let pipeline = Arc::new(Pipeline::new(
            db.clone(),
            jobs.clone(),
            collaborators,
            Arc::new(Config::default()),
        ));

        Harness {
            db,
            jobs,
            services,
            media,
            store_dir,
            media_dir,
            pipeline,
        }
    }

    /// Writes one video file per label (content = label) and returns the folder.
    pub fn folder(&self, labels: &[&str]) -> String {
        let dir = self.media_dir.path().join("clips");
        std::fs::create_dir_all(&dir).unwrap();
        for (i, label) in labels.iter().enumerate() {
            std::fs::write(dir.join(format!("{:02}_{}.mp4", i + 1, label)), label).unwrap();
        }
        dir.display().to_string()
    }

    pub fn movie(&self, prompts: &[&str], queries: &[&str]) -> i64 {
        let prompts: Vec<String> = prompts.iter().map(|s| s.to_string()).collect();
        let queries: Vec<String> = queries.iter().map(|s| s.to_string()).collect();
        self.db.create_movie(Some("test"), &prompts, &queries).unwrap()
    }

    pub fn summary_ids(&self, movie_id: i64) -> Vec<i64> {
        self.db
            .list_summaries(movie_id)
            .unwrap()
            .into_iter()
            .map(|s| s.summary_id)
            .collect()
    }

    pub fn status(&self, movie_id: i64) -> String {
        self.db.get_status(movie_id).unwrap().unwrap()
    }
}

pub fn folder_request(movie_id: i64, folder: &str, init: bool) -> RunRequest {
    RunRequest {
        movie_id,
        input: MediaInput::Folder(folder.to_string()),
        segment_seconds: None,
        characters_info: "Mina is the detective.".to_string(),
        init,
        language_code: None,
        threshold: None,
    }
}

pub fn scripts(entries: impl IntoIterator<Item = (&'static str, ChunkScript)>) -> HashMap<String, ChunkScript> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub fn answers(parts: &[&str]) -> String {
    parts.join(&format!("\n{}\n", ANSWER_DELIMITER))
}
