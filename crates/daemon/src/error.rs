use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request. Raised before any state is touched.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("movie {0} not found")]
    NotFound(i64),
    #[error("movie {0} already has a run in progress")]
    Busy(i64),
    /// A collaborator call failed or answered with something unusable.
    #[error("{stage} failed: {source:#}")]
    ExternalService {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    /// Adapter for `map_err` on collaborator results.
    pub fn external(stage: &'static str) -> impl FnOnce(anyhow::Error) -> PipelineError {
        move |source| PipelineError::ExternalService { stage, source }
    }

    /// Whether the run got far enough that the persisted status must record the failure.
    pub fn marks_job_failed(&self) -> bool {
        matches!(
            self,
            PipelineError::ExternalService { .. } | PipelineError::Persistence(_)
        )
    }
}
