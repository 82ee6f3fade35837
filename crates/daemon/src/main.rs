use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};

use moviemanager::api;
use moviemanager::collaborators::Collaborators;
use moviemanager::config::Config;
use moviemanager::db::Database;
use moviemanager::jobs::{JobManager, Pipeline};
use moviemanager::llm::MlServiceClient;
use moviemanager::media::ffmpeg::FFmpegWrapper;
use moviemanager::store::FsObjectStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(Database::new(&config.db_path)?);
    info!("Database initialized at {:?}", config.db_path);

    std::fs::create_dir_all(&config.store_root)?;
    let ml_client = Arc::new(MlServiceClient::new(&config.ml_service_url, config.ml_service_timeout)?);
    let collaborators = Collaborators::from_ml_service(
        ml_client,
        Arc::new(FFmpegWrapper::new(config.scratch_dir.clone())),
        Arc::new(FsObjectStore::new(config.store_root.clone())),
    );
    info!(ml_service = %config.ml_service_url, store = ?config.store_root, "collaborators ready");

    let addr = config.bind;
    let pipeline = Arc::new(Pipeline::new(
        db,
        Arc::new(JobManager::new()),
        collaborators,
        Arc::new(config),
    ));
    let app = api::app(pipeline);

    info!("Starting moviemanager server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
