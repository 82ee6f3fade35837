use std::path::{Path, PathBuf};
use tracing::{info, warn};

use engine::prompt::{nomination_tokens, parse_chunk_response, ChunkPrompt};
use engine::ranking::MAX_RETRIEVAL_QUERIES;
use engine::{ChunkDescriptor, Stage};

use crate::collaborators::Collaborators;
use crate::db::Database;
use crate::embeddings::persist_chunk_scenes;
use crate::error::PipelineError;
use crate::jobs::persist_stage;
use crate::jobs::resume::RunState;
use crate::media::ChunkArtifact;
use crate::retrieval::{save_selections, ChunkSelections};

#[derive(Debug, Clone)]
pub enum ChunkSource {
    /// One long video, sliced per chunk.
    Video(PathBuf),
    /// One file per chunk, used in place.
    Folder(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub source: ChunkSource,
    pub chunks: Vec<ChunkDescriptor>,
}

/// Per-run inputs shared by every chunk.
#[derive(Debug, Clone)]
pub struct ChunkSettings {
    pub characters_info: String,
    pub language_code: String,
    pub threshold: f64,
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Summarized { summary_id: i64 },
    /// Neither dialogue nor scenes were found.
    Skipped,
}

enum ChunkMedia<'p> {
    Extracted(ChunkArtifact),
    InPlace(&'p Path),
}

impl ChunkMedia<'_> {
    fn path(&self) -> &Path {
        match self {
            ChunkMedia::Extracted(artifact) => artifact.path(),
            ChunkMedia::InPlace(path) => *path,
        }
    }

    fn release(self, order: u32) {
        if let ChunkMedia::Extracted(artifact) = self {
            if let Err(e) = artifact.cleanup() {
                warn!(order, error = %e, "failed to remove chunk artifact");
            }
        }
    }
}

pub struct SequentialChunkProcessor<'a> {
    pub db: &'a Database,
    pub collaborators: &'a Collaborators,
    pub movie_id: i64,
    pub settings: &'a ChunkSettings,
}

impl SequentialChunkProcessor<'_> {
    /// Processes chunks `state.start_index..` strictly in order. The first
    /// error aborts the loop.
    pub async fn run(&self, plan: &ChunkPlan, state: &mut RunState) -> Result<(), PipelineError> {
        let total = plan.chunks.len() as u32;
        for index in state.start_index..plan.chunks.len() {
            let chunk = &plan.chunks[index];
            persist_stage(
                self.db,
                self.movie_id,
                Stage::Proceeding {
                    current: chunk.order,
                    total,
                },
            )?;
            info!(order = chunk.order, total, "processing chunk");

            match self.process_chunk(plan, index, state).await? {
                ChunkOutcome::Summarized { summary_id } => {
                    info!(order = chunk.order, summary_id, "chunk summarized")
                }
                ChunkOutcome::Skipped => {
                    warn!(order = chunk.order, "chunk has no dialogue and no scenes, skipped")
                }
            }
        }
        Ok(())
    }

    async fn acquire<'p>(&self, plan: &'p ChunkPlan, index: usize) -> Result<ChunkMedia<'p>, PipelineError> {
        let chunk = &plan.chunks[index];
        match &plan.source {
            ChunkSource::Video(path) => {
                let artifact = self
                    .collaborators
                    .media
                    .extract_segment(path, chunk.start, chunk.duration)
                    .await
                    .map_err(PipelineError::external("segment extraction"))?;
                Ok(ChunkMedia::Extracted(artifact))
            }
            ChunkSource::Folder(files) => files
                .get(index)
                .map(|path| ChunkMedia::InPlace(path.as_path()))
                .ok_or_else(|| PipelineError::validation(format!("no file for chunk {}", chunk.order))),
        }
    }

    /// Runs one chunk. The media slice lives only for this call, so it is
    /// gone before the next chunk starts whatever the outcome.
    pub async fn process_chunk(
        &self,
        plan: &ChunkPlan,
        index: usize,
        state: &mut RunState,
    ) -> Result<ChunkOutcome, PipelineError> {
        let order = plan.chunks[index].order;
        let media = self.acquire(plan, index).await?;

        let (utterances, scenes) = tokio::join!(
            self.collaborators
                .transcriber
                .transcribe(media.path(), &self.settings.language_code),
            self.collaborators
                .scene_detector
                .detect_scenes(media.path(), self.settings.threshold),
        );
        media.release(order);
        let utterances = utterances.map_err(PipelineError::external("transcription"))?;
        let scenes = scenes.map_err(PipelineError::external("scene detection"))?;

        if utterances.is_empty() && scenes.is_empty() {
            return Ok(ChunkOutcome::Skipped);
        }
        if utterances.is_empty() {
            warn!(order, "no dialogue transcribed");
        }
        if scenes.is_empty() {
            warn!(order, "no scenes detected");
        }

        let queries = &self.settings.queries[..self.settings.queries.len().min(MAX_RETRIEVAL_QUERIES)];
        let context = state.window.render(index);
        let prompt = ChunkPrompt {
            characters_info: &self.settings.characters_info,
            context: context.as_deref(),
            utterances: &utterances,
            scenes: &scenes,
            queries,
        }
        .build();
        let images: Vec<String> = scenes.iter().map(|s| s.image.clone()).collect();

        let response = self
            .collaborators
            .summarizer
            .summarize(&images, &prompt)
            .await
            .map_err(PipelineError::external("summarization"))?;
        let parsed = parse_chunk_response(&response, queries.len(), scenes.len());
        for entry in &parsed.rejected {
            warn!(order, entry = %entry, "dropping invalid scene nomination");
        }
        if parsed.summary.is_empty() {
            return Err(PipelineError::external("summarization")(anyhow::anyhow!(
                "empty summary for chunk {}",
                order
            )));
        }

        persist_chunk_scenes(self.collaborators, self.movie_id, order, &scenes).await?;

        let selections = ChunkSelections {
            order,
            selections: nomination_tokens(order, queries, &parsed.nominations),
        };
        if !queries.is_empty() {
            save_selections(self.collaborators.store.as_ref(), self.movie_id, &selections)
                .await
                .map_err(PipelineError::Persistence)?;
        }

        let summary_id = order as i64;
        if !self.db.save_summary(self.movie_id, summary_id, &parsed.summary) {
            state.failed_saves.push(summary_id);
        }
        state.window.push(parsed.summary.clone());
        state.video_summaries.push(parsed.summary);
        state.selections.push(selections);

        Ok(ChunkOutcome::Summarized { summary_id })
    }
}
