use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::jobs::{MediaInput, Pipeline, RunOutcome, RunRequest};

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    movie_id: i64,
    #[serde(default)]
    folder_path: Option<String>,
    #[serde(default)]
    video_path: Option<String>,
    #[serde(default)]
    segment_seconds: Option<u32>,
    #[serde(default)]
    characters_info: String,
    #[serde(default)]
    init: bool,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    threshold: Option<f64>,
}

impl TryFrom<ProcessRequest> for RunRequest {
    type Error = PipelineError;

    fn try_from(req: ProcessRequest) -> Result<Self, Self::Error> {
        let input = match (req.folder_path, req.video_path) {
            (Some(folder), None) => MediaInput::Folder(folder),
            (None, Some(video)) => MediaInput::Video(video),
            (Some(_), Some(_)) => {
                return Err(PipelineError::validation(
                    "provide either folder_path or video_path, not both",
                ))
            }
            (None, None) => return Err(PipelineError::validation("folder_path or video_path is required")),
        };
        Ok(RunRequest {
            movie_id: req.movie_id,
            input,
            segment_seconds: req.segment_seconds,
            characters_info: req.characters_info,
            init: req.init,
            language_code: req.language_code,
            threshold: req.threshold,
        })
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/moviemanager", post(process_movie))
        .with_state(pipeline)
}

async fn process_movie(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<RunOutcome>, PipelineError> {
    let request = RunRequest::try_from(req)?;
    let outcome = pipeline.run(request).await?;
    Ok(Json(outcome))
}
