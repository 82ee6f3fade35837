pub mod processor;
pub mod resume;
pub mod synthesis;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use engine::{plan_assets, plan_chunks, thumbnail_folder, PromptAnswer, Stage};

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::db::{Database, Movie};
use crate::error::PipelineError;
use crate::media::{list_video_files, resolve_media_ref};
use crate::retrieval::HybridSceneRetriever;

use processor::{ChunkPlan, ChunkSettings, ChunkSource, SequentialChunkProcessor};
use resume::{ResumePlanner, RunState};
use synthesis::FinalSynthesizer;

/// Writes `stage` as the movie's status.
pub(crate) fn persist_stage(db: &Database, movie_id: i64, stage: Stage) -> Result<(), PipelineError> {
    let updated = db
        .set_status(movie_id, &stage.encode())
        .map_err(PipelineError::Persistence)?;
    if updated {
        Ok(())
    } else {
        Err(PipelineError::NotFound(movie_id))
    }
}

/// Tracks which movies have a run in flight so the same job never runs twice at once.
#[derive(Default)]
pub struct JobManager {
    in_flight: Mutex<HashSet<i64>>,
}

/// Releases the movie's run slot on drop.
pub struct RunGuard<'a> {
    manager: &'a JobManager,
    movie_id: i64,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, movie_id: i64) -> Result<RunGuard<'_>, PipelineError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(movie_id) {
            return Err(PipelineError::Busy(movie_id));
        }
        Ok(RunGuard {
            manager: self,
            movie_id,
        })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.manager
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.movie_id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaInput {
    /// Folder of pre-cut videos, one chunk per file.
    Folder(String),
    /// A single long video to slice.
    Video(String),
}

enum ResolvedInput {
    Folder(PathBuf),
    Video(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub movie_id: i64,
    pub input: MediaInput,
    pub segment_seconds: Option<u32>,
    pub characters_info: String,
    pub init: bool,
    pub language_code: Option<String>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub movie_id: i64,
    pub status: String,
    pub answers: Vec<PromptAnswer>,
    pub scenes: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_folder: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_summary_saves: Vec<i64>,
}

/// Drives a movie from its persisted status to `COMPLETE`.
pub struct Pipeline {
    db: Arc<Database>,
    jobs: Arc<JobManager>,
    collaborators: Collaborators,
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(db: Arc<Database>, jobs: Arc<JobManager>, collaborators: Collaborators, config: Arc<Config>) -> Self {
        Pipeline {
            db,
            jobs,
            collaborators,
            config,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", movie_id = request.movie_id, %run_id);
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: RunRequest) -> Result<RunOutcome, PipelineError> {
        if request.segment_seconds == Some(0) {
            return Err(PipelineError::validation("segment_seconds must be greater than zero"));
        }
        if let Some(threshold) = request.threshold {
            if !(threshold.is_finite() && threshold >= 0.0) {
                return Err(PipelineError::validation("threshold must be a non-negative number"));
            }
        }
        let input = match &request.input {
            MediaInput::Folder(raw) => ResolvedInput::Folder(resolve_media_ref(raw)?),
            MediaInput::Video(raw) => ResolvedInput::Video(resolve_media_ref(raw)?),
        };

        // Claim before reading the movie so the status snapshot cannot predate
        // a run that finishes in between.
        let _guard = self.jobs.claim(request.movie_id)?;
        let movie = self
            .db
            .get_movie(request.movie_id)
            .map_err(PipelineError::Persistence)?
            .ok_or(PipelineError::NotFound(request.movie_id))?;

        let plan = self.plan(input, request.segment_seconds).await?;
        info!(chunks = plan.chunks.len(), init = request.init, "planned run");

        let result = self.execute(&movie, &plan, &request).await;
        if let Err(e) = &result {
            if e.marks_job_failed() {
                match self.db.mark_failed(movie.id) {
                    Ok(status) => error!(error = %e, status = ?status, "run aborted"),
                    Err(mark_err) => error!(error = %e, mark_error = %mark_err, "run aborted, status not updated"),
                }
            }
        }
        result
    }

    async fn plan(&self, input: ResolvedInput, segment_seconds: Option<u32>) -> Result<ChunkPlan, PipelineError> {
        match input {
            ResolvedInput::Folder(dir) => {
                let files = list_video_files(&dir).await?;
                Ok(ChunkPlan {
                    chunks: plan_assets(files.len()),
                    source: ChunkSource::Folder(files),
                })
            }
            ResolvedInput::Video(path) => {
                let duration = self
                    .collaborators
                    .media
                    .probe_duration(&path)
                    .await
                    .map_err(PipelineError::external("duration probe"))?;
                let segment_seconds = segment_seconds.unwrap_or(self.config.segment_seconds);
                let chunks = plan_chunks(duration, segment_seconds);
                if chunks.is_empty() {
                    return Err(PipelineError::external("duration probe")(anyhow::anyhow!(
                        "video {} has no playable duration ({})",
                        path.display(),
                        duration
                    )));
                }
                Ok(ChunkPlan {
                    source: ChunkSource::Video(path),
                    chunks,
                })
            }
        }
    }

    async fn execute(&self, movie: &Movie, plan: &ChunkPlan, request: &RunRequest) -> Result<RunOutcome, PipelineError> {
        let store = self.collaborators.store.as_ref();
        let total_chunks = plan.chunks.len();

        let planner = ResumePlanner { db: &self.db, store };
        let mut state: RunState = planner
            .plan(movie.id, &movie.status, total_chunks, request.init)
            .await?;

        let settings = ChunkSettings {
            characters_info: request.characters_info.clone(),
            language_code: request
                .language_code
                .clone()
                .unwrap_or_else(|| self.config.language_code.clone()),
            threshold: request.threshold.unwrap_or(self.config.scene_threshold),
            queries: movie.custom_retrievals.clone(),
        };
        SequentialChunkProcessor {
            db: &self.db,
            collaborators: &self.collaborators,
            movie_id: movie.id,
            settings: &settings,
        }
        .run(plan, &mut state)
        .await?;

        persist_stage(&self.db, movie.id, Stage::Organizing)?;
        info!(summaries = state.video_summaries.len(), "organizing results");

        let answers = FinalSynthesizer {
            summarizer: self.collaborators.summarizer.as_ref(),
        }
        .synthesize(&state.video_summaries, &movie.custom_prompts, &request.characters_info)
        .await?;
        let final_summary_id = total_chunks as i64 + 1;
        let payload = serde_json::to_string(&answers).map_err(|e| PipelineError::Persistence(e.into()))?;
        if !self.db.save_summary(movie.id, final_summary_id, &payload) {
            state.failed_saves.push(final_summary_id);
        }

        let scenes = HybridSceneRetriever {
            embedder: self.collaborators.embedder.as_ref(),
            translator: self.collaborators.translator.as_ref(),
            store,
        }
        .retrieve(movie.id, &movie.custom_retrievals, &state.selections)
        .await?;

        let folder = thumbnail_folder(movie.id);
        let has_thumbnails = !store
            .list(&folder)
            .await
            .map_err(PipelineError::Persistence)?
            .is_empty();

        persist_stage(&self.db, movie.id, Stage::Complete)?;
        info!(answers = answers.len(), queries = scenes.len(), "run complete");

        Ok(RunOutcome {
            movie_id: movie.id,
            status: Stage::Complete.encode(),
            answers,
            scenes,
            thumbnail_folder: has_thumbnails.then(|| store.location(&folder)),
            failed_summary_saves: state.failed_saves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_per_movie() {
        let manager = JobManager::new();
        let guard = manager.claim(1).unwrap();
        assert!(matches!(manager.claim(1), Err(PipelineError::Busy(1))));
        assert!(manager.claim(2).is_ok());
        drop(guard);
        assert!(manager.claim(1).is_ok());
    }

    #[test]
    fn test_persist_stage_missing_movie() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            persist_stage(&db, 42, Stage::Complete),
            Err(PipelineError::NotFound(42))
        ));
    }
}
