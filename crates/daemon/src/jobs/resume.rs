use anyhow::Result;
use tracing::{info, warn};

use engine::{thumbnail_folder, JobStatus, RollingContextWindow, Stage};

use crate::collaborators::ObjectStore;
use crate::db::Database;
use crate::embeddings::blob_key;
use crate::error::PipelineError;
use crate::retrieval::{load_selections, selections_prefix, ChunkSelections};
use crate::store::delete_prefix;

/// Everything a run carries from the resume decision to the final stages.
#[derive(Debug)]
pub struct RunState {
    /// 0-based index of the first chunk to process.
    pub start_index: usize,
    pub total_chunks: usize,
    /// Summary texts in processing order, reloaded ones first.
    pub video_summaries: Vec<String>,
    pub window: RollingContextWindow,
    pub selections: Vec<ChunkSelections>,
    /// Summary ids whose save failed during this run.
    pub failed_saves: Vec<i64>,
}

impl RunState {
    pub fn fresh(total_chunks: usize) -> Self {
        RunState {
            start_index: 0,
            total_chunks,
            video_summaries: Vec::new(),
            window: RollingContextWindow::new(),
            selections: Vec::new(),
            failed_saves: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    pub start_index: usize,
    /// Highest summary id to reload; 0 reloads nothing.
    pub reload_up_to: usize,
}

/// Decides where a non-init run restarts.
///
/// `PROCEEDING[c/t]` is written before chunk `c` starts, so chunk `c` is
/// redone unless `committed(c)` reports its summary already persisted.
pub fn resume_point(
    status: Option<&JobStatus>,
    total_chunks: usize,
    committed: impl FnOnce(u32) -> Result<bool>,
) -> Result<ResumePoint, PipelineError> {
    let Some(status) = status else {
        return Ok(ResumePoint {
            start_index: 0,
            reload_up_to: 0,
        });
    };

    match status.stage {
        Stage::Pending => Ok(ResumePoint {
            start_index: 0,
            reload_up_to: 0,
        }),
        Stage::Organizing | Stage::Complete => Ok(ResumePoint {
            start_index: total_chunks,
            reload_up_to: total_chunks,
        }),
        Stage::Proceeding { current, total } => {
            if total as usize != total_chunks {
                return Err(PipelineError::validation(format!(
                    "status expects {} chunks but the input plans {}; rerun with init",
                    total, total_chunks
                )));
            }
            if current == 0 {
                return Ok(ResumePoint {
                    start_index: 0,
                    reload_up_to: 0,
                });
            }
            let start_index = if committed(current).map_err(PipelineError::Persistence)? {
                current as usize
            } else {
                current as usize - 1
            };
            Ok(ResumePoint {
                start_index,
                reload_up_to: current as usize,
            })
        }
    }
}

pub struct ResumePlanner<'a> {
    pub db: &'a Database,
    pub store: &'a dyn ObjectStore,
}

impl ResumePlanner<'_> {
    /// Builds the run state from persisted progress. With `init` every prior
    /// result of the movie is discarded first.
    pub async fn plan(
        &self,
        movie_id: i64,
        raw_status: &str,
        total_chunks: usize,
        init: bool,
    ) -> Result<RunState, PipelineError> {
        if init {
            self.reset(movie_id).await?;
            return Ok(RunState::fresh(total_chunks));
        }

        let status = JobStatus::decode(raw_status);
        if status.is_none() {
            warn!(movie_id, status = raw_status, "unrecognised status, starting fresh");
        }
        let point = resume_point(status.as_ref(), total_chunks, |current| {
            self.db.summary_exists(movie_id, current as i64)
        })?;
        if point.reload_up_to == 0 {
            return Ok(RunState {
                start_index: point.start_index,
                ..RunState::fresh(total_chunks)
            });
        }

        let summaries = self
            .db
            .list_summaries_up_to(movie_id, point.reload_up_to as i64)
            .map_err(PipelineError::Persistence)?;
        let video_summaries: Vec<String> = summaries.into_iter().map(|s| s.summary_text).collect();
        let selections = load_selections(self.store, movie_id, point.start_index as u32)
            .await
            .map_err(PipelineError::Persistence)?;

        info!(
            movie_id,
            start_index = point.start_index,
            reloaded = video_summaries.len(),
            "resuming from persisted progress"
        );

        Ok(RunState {
            start_index: point.start_index,
            total_chunks,
            window: RollingContextWindow::seeded(video_summaries.iter().cloned()),
            video_summaries,
            selections,
            failed_saves: Vec::new(),
        })
    }

    async fn reset(&self, movie_id: i64) -> Result<(), PipelineError> {
        let deleted = self
            .db
            .delete_summaries_from(movie_id, 1)
            .map_err(PipelineError::Persistence)?;

        self.store
            .delete(&blob_key(movie_id))
            .await
            .map_err(PipelineError::Persistence)?;
        delete_prefix(self.store, &selections_prefix(movie_id))
            .await
            .map_err(PipelineError::Persistence)?;
        delete_prefix(self.store, &thumbnail_folder(movie_id))
            .await
            .map_err(PipelineError::Persistence)?;

        self.db
            .set_status(movie_id, &Stage::Pending.encode())
            .map_err(PipelineError::Persistence)?;
        info!(movie_id, deleted, "reset movie for a fresh run");
        Ok(())
    }
}
