pub mod ffmpeg;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::error::PipelineError;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "m4v", "webm"];

/// A scratch media slice. The file is removed when the artifact drops.
#[derive(Debug)]
pub struct ChunkArtifact {
    path: TempPath,
}

impl ChunkArtifact {
    pub fn new(path: TempPath) -> Self {
        ChunkArtifact { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file now so a failure can be reported instead of ignored on drop.
    pub fn cleanup(self) -> Result<()> {
        let display = self.path.display().to_string();
        self.path
            .close()
            .with_context(|| format!("failed to remove chunk artifact {}", display))
    }
}

/// Accepts a local path or a `file://` URI. Any other scheme is rejected.
pub fn resolve_media_ref(raw: &str) -> Result<PathBuf, PipelineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PipelineError::validation("media reference is empty"));
    }
    if let Some(path) = raw.strip_prefix("file://") {
        if path.is_empty() {
            return Err(PipelineError::validation("file:// reference has no path"));
        }
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = raw.split_once("://") {
        return Err(PipelineError::validation(format!(
            "unsupported media reference scheme {:?}",
            scheme
        )));
    }
    Ok(PathBuf::from(raw))
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Video files directly inside `dir`, sorted by file name.
pub async fn list_video_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        PipelineError::validation(format!("cannot read folder {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    loop {
        let entry = entries.next_entry().await.map_err(|e| {
            PipelineError::validation(format!("cannot read folder {}: {}", dir.display(), e))
        })?;
        let Some(entry) = entry else {
            break;
        };
        let path = entry.path();
        if path.is_file() && is_video_file(&path) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(PipelineError::validation(format!(
            "folder {} contains no video files",
            dir.display()
        )));
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
