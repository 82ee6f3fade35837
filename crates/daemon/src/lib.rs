pub mod api;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod media;
pub mod retrieval;
pub mod store;

pub use error::PipelineError;
