use super::engine::MediaEngine;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Transient network failures are retried inside yt-dlp itself.
const RETRIES: &str = "10";

pub struct YtDlpEngine;

impl YtDlpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(&self, url: &str) -> Result<Value, AppError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let output = tokio::time::timeout(
            EXTRACT_TIMEOUT,
            Command::new("yt-dlp")
                .arg("--dump-single-json")
                .arg("--no-download")
                .arg("--no-warnings")
                .arg("--ignore-errors")
                .arg("--retries")
                .arg(RETRIES)
                .arg(url)
                .output(),
        )
        .await
        .map_err(|_| AppError::Extraction("metadata extraction timed out".to_string()))?
        .map_err(|e| AppError::Extraction(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Extraction(format!(
                "metadata extraction failed: {}",
                error.trim()
            )));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        debug!("yt-dlp JSON output: {}", json_str);

        serde_json::from_str(&json_str)
            .map_err(|e| AppError::Extraction(format!("unparsable metadata: {e}")))
    }

    async fn download(
        &self,
        url: &str,
        format_id: &str,
        out_dir: &Path,
        basename: &str,
    ) -> Result<PathBuf, AppError> {
        info!("Downloading format {} with yt-dlp: {}", format_id, url);

        let outtmpl = out_dir.join(format!("{basename}.%(ext)s"));

        let output = tokio::time::timeout(
            DOWNLOAD_TIMEOUT,
            Command::new("yt-dlp")
                .arg("--format")
                .arg(format_id)
                .arg("--output")
                .arg(&outtmpl)
                .arg("--merge-output-format")
                .arg("mp4")
                .arg("--recode-video")
                .arg("mp4")
                .arg("--no-warnings")
                .arg("--retries")
                .arg(RETRIES)
                .arg("--fragment-retries")
                .arg(RETRIES)
                .arg(url)
                .output(),
        )
        .await
        .map_err(|_| AppError::Download("download timed out".to_string()))?
        .map_err(|e| AppError::Download(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Download(format!(
                "download failed: {}",
                error.trim()
            )));
        }

        // The recode step should leave an .mp4, but older engine builds have
        // been seen keeping the source container.
        for ext in ["mp4", "webm", "mkv"] {
            let candidate = out_dir.join(format!("{basename}.{ext}"));
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(AppError::Download(
            "engine reported success but produced no file".to_string(),
        ))
    }

    async fn test_availability() -> bool {
        let yt_dlp_available = match Command::new("yt-dlp").arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("✅ yt-dlp is available, version: {}", version.trim());
                    true
                } else {
                    warn!("❌ yt-dlp command failed");
                    false
                }
            }
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                false
            }
        };

        // ffmpeg is required for merging and the mp4 recode step
        let ffmpeg_available = match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                warn!("❌ ffmpeg not found: {} (required for merging/recoding)", e);
                false
            }
        };

        if yt_dlp_available && !ffmpeg_available {
            warn!("⚠️  yt-dlp will work but merging/recoding to mp4 will be disabled");
        }

        yt_dlp_available
    }
}
