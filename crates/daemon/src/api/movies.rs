use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use engine::{JobStatus, Stage};

use crate::db::{Database, Summary};
use crate::error::PipelineError;

#[derive(Deserialize)]
pub struct CreateMovieRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    custom_prompts: Vec<String>,
    #[serde(default)]
    custom_retrievals: Vec<String>,
}

#[derive(Serialize)]
pub struct CreateMovieResponse {
    id: i64,
}

#[derive(Serialize)]
pub struct MovieResponse {
    id: i64,
    title: Option<String>,
    status: String,
    stage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u32>,
    failed: bool,
    summary_count: usize,
    custom_prompts: Vec<String>,
    custom_retrievals: Vec<String>,
    created_at: String,
    updated_at: String,
}

pub fn router(db: Arc<Database>) -> Router {
    Router::new()
        .route("/", post(create_movie))
        .route("/:id", get(get_movie))
        .route("/:id/summaries", get(list_summaries))
        .with_state(db)
}

fn non_blank(field: &str, values: &[String]) -> Result<(), PipelineError> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(PipelineError::validation(format!("{} must not contain blank entries", field)));
    }
    Ok(())
}

async fn create_movie(
    State(db): State<Arc<Database>>,
    Json(req): Json<CreateMovieRequest>,
) -> Result<Json<CreateMovieResponse>, PipelineError> {
    non_blank("custom_prompts", &req.custom_prompts)?;
    non_blank("custom_retrievals", &req.custom_retrievals)?;

    let id = db
        .create_movie(req.title.as_deref(), &req.custom_prompts, &req.custom_retrievals)
        .map_err(PipelineError::Persistence)?;
    Ok(Json(CreateMovieResponse { id }))
}

async fn get_movie(
    State(db): State<Arc<Database>>,
    Path(id): Path<i64>,
) -> Result<Json<MovieResponse>, PipelineError> {
    let movie = db
        .get_movie(id)
        .map_err(PipelineError::Persistence)?
        .ok_or(PipelineError::NotFound(id))?;
    let summary_count = db.list_summaries(id).map_err(PipelineError::Persistence)?.len();

    let decoded = JobStatus::decode(&movie.status);
    let (current, total) = match decoded.map(|s| s.stage) {
        Some(Stage::Proceeding { current, total }) => (Some(current), Some(total)),
        _ => (None, None),
    };

    Ok(Json(MovieResponse {
        id: movie.id,
        title: movie.title,
        stage: decoded.map(|s| s.stage.name()).unwrap_or("unknown"),
        failed: decoded.map(|s| s.failed).unwrap_or(false),
        status: movie.status,
        current,
        total,
        summary_count,
        custom_prompts: movie.custom_prompts,
        custom_retrievals: movie.custom_retrievals,
        created_at: movie.created_at.to_rfc3339(),
        updated_at: movie.updated_at.to_rfc3339(),
    }))
}

async fn list_summaries(
    State(db): State<Arc<Database>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Summary>>, PipelineError> {
    if db.get_movie(id).map_err(PipelineError::Persistence)?.is_none() {
        return Err(PipelineError::NotFound(id));
    }
    let summaries = db.list_summaries(id).map_err(PipelineError::Persistence)?;
    Ok(Json(summaries))
}
