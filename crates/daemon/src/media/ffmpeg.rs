use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::collaborators::MediaTool;
use crate::media::ChunkArtifact;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

/// `ffprobe`/`ffmpeg` backed media tool. Slices are written into `scratch_dir`.
pub struct FFmpegWrapper {
    scratch_dir: PathBuf,
}

impl FFmpegWrapper {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        FFmpegWrapper {
            scratch_dir: scratch_dir.into(),
        }
    }
}

fn parse_duration(stdout: &[u8]) -> Result<f64> {
    let probe_output: ProbeOutput =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe JSON output")?;

    probe_output
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .context("ffprobe reported no container duration")
}

#[async_trait::async_trait]
impl MediaTool for FFmpegWrapper {
    async fn probe_duration(&self, media: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(media)
            .output()
            .await
            .context("Failed to execute ffprobe. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr);
        }

        parse_duration(&output.stdout)
    }

    async fn extract_segment(&self, media: &Path, start: f64, duration: f64) -> Result<ChunkArtifact> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let extension = media
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| ".mp4".to_string());
        // Owned before ffmpeg runs so a failed extraction still removes the file.
        let artifact = ChunkArtifact::new(
            tempfile::Builder::new()
                .prefix("chunk_")
                .suffix(&extension)
                .tempfile_in(&self.scratch_dir)
                .context("Failed to create scratch file for chunk")?
                .into_temp_path(),
        );

        let output = Command::new("ffmpeg")
            .arg("-ss")
            .arg(format!("{:.3}", start))
            .arg("-i")
            .arg(media)
            .arg("-t")
            .arg(format!("{:.3}", duration))
            .args(["-c", "copy", "-avoid_negative_ts", "make_zero", "-y"])
            .arg(artifact.path())
            .output()
            .await
            .context("Failed to execute ffmpeg. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg failed to extract segment at {:.1}s: {}", start, stderr);
        }

        Ok(artifact)
    }
}
