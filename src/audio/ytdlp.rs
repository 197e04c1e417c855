// src/audio/ytdlp.rs
// yt-dlp extraction adapter (ffmpeg post-processing to 16 kHz mono PCM)

use super::{probe_wav, size_in_mb, write_synthetic_wav, AudioExtractor, AudioOutput};
use crate::jobs::JobId;
use crate::stage::StageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;

const POSTPROCESSOR_ARGS: &str = "ffmpeg:-ar 16000 -ac 1 -c:a pcm_s16le";

pub struct YtDlpExtractor {
    bin_path: PathBuf,
    output_dir: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(bin_path: PathBuf, output_dir: PathBuf) -> Self {
        tracing::info!(
            "yt-dlp extractor initialized: bin={}, output={}",
            bin_path.display(),
            output_dir.display()
        );

        Self {
            bin_path,
            output_dir,
        }
    }
}

#[async_trait]
impl AudioExtractor for YtDlpExtractor {
    async fn extract(&self, source_ref: &str, job_id: JobId) -> Result<AudioOutput, StageError> {
        let started = Instant::now();
        let url = source_ref.trim();
        if url.is_empty() {
            return Err(StageError::InvalidSource("empty source reference".to_string()));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StageError::Io(e.to_string()))?;

        let template = self.output_dir.join(format!("{}.%(ext)s", job_id));
        let target = self.output_dir.join(format!("{}.wav", job_id));

        tracing::info!("Extracting audio from: {}", url);

        let output = Command::new(&self.bin_path)
            .args([
                "--no-playlist",
                "--quiet",
                "--no-progress",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                "-x",
                "--audio-format",
                "wav",
                "--postprocessor-args",
                POSTPROCESSOR_ARGS,
                "-o",
            ])
            .arg(&template)
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    StageError::ToolUnavailable(format!("{}: {}", self.bin_path.display(), e))
                }
                _ => StageError::Provider(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        let (size_bytes, duration_seconds) = probe_wav(&target).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Audio extracted in {}ms: {:.2}MB, {:.1}s",
            duration_ms,
            size_in_mb(size_bytes),
            duration_seconds
        );

        Ok(AudioOutput {
            reference: target,
            duration_seconds,
            size_mb: size_in_mb(size_bytes),
            duration_ms,
            synthetic: false,
        })
    }

    async fn fallback(&self, _source_ref: &str, job_id: JobId) -> Result<AudioOutput, StageError> {
        write_synthetic_wav(&self.output_dir, job_id).await
    }

    fn name(&self) -> &str {
        "yt-dlp"
    }
}

/// Map yt-dlp stderr to a stage error. Videos that can never be fetched are fatal.
fn classify_failure(stderr: &str) -> StageError {
    let lowered = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim()
        .to_string();

    const UNAVAILABLE: [&str; 5] = [
        "video unavailable",
        "private video",
        "confirm your age",
        "has been removed",
        "no longer available",
    ];

    if UNAVAILABLE.iter().any(|marker| lowered.contains(marker)) {
        StageError::SourceUnavailable(detail)
    } else if lowered.contains("unsupported url") || lowered.contains("is not a valid url") {
        StageError::InvalidSource(detail)
    } else if lowered.contains("ffmpeg not found") || lowered.contains("ffprobe and ffmpeg not found") {
        StageError::ToolUnavailable(detail)
    } else {
        StageError::Provider(detail)
    }
}
