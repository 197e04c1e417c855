// src/audio/mod.rs
// Audio extraction stage: source video -> 16 kHz mono WAV

pub mod buffer;
mod ytdlp;

pub use buffer::AudioBuffer;
pub use ytdlp::YtDlpExtractor;

use crate::jobs::JobId;
use crate::stage::{Details, StageError, StageOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;
pub const SYNTHETIC_DURATION_SECS: u32 = 30;
const SYNTHETIC_TONE_HZ: f32 = 440.0;
const HEADER_PROBE_BYTES: usize = 4096;

/// Output of the extraction stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioOutput {
    /// Path of the extracted WAV file
    pub reference: PathBuf,
    pub duration_seconds: f64,
    pub size_mb: f64,
    /// Time spent inside the extraction tool
    pub duration_ms: u64,
    /// True when the file is the generated fallback tone
    pub synthetic: bool,
}

impl StageOutput for AudioOutput {
    fn details(&self) -> Details {
        let mut details = Details::new();
        details.insert("format".into(), "wav".into());
        details.insert("sample_rate".into(), "16kHz".into());
        details.insert("channels".into(), "mono".into());
        details.insert("bit_depth".into(), "16-bit".into());
        details.insert("size_mb".into(), self.size_mb.into());
        details.insert("duration_seconds".into(), self.duration_seconds.into());
        details.insert("synthetic".into(), self.synthetic.into());
        details
    }
}

/// Audio extraction adapter
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, source_ref: &str, job_id: JobId) -> Result<AudioOutput, StageError>;

    /// Deterministic output used when extraction fails recoverably
    async fn fallback(&self, source_ref: &str, job_id: JobId) -> Result<AudioOutput, StageError>;

    fn name(&self) -> &str;
}

/// Write the fallback tone for `job_id` into `dir`
pub async fn write_synthetic_wav(dir: &Path, job_id: JobId) -> Result<AudioOutput, StageError> {
    let started = std::time::Instant::now();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StageError::Io(format!("audio dir: {}", e)))?;

    let path = dir.join(format!("{}.wav", job_id));
    let tone = AudioBuffer::sine_tone(SYNTHETIC_TONE_HZ, SYNTHETIC_DURATION_SECS, TARGET_SAMPLE_RATE);
    let wav = tone.to_wav_bytes();
    let size_bytes = wav.len() as u64;

    tokio::fs::write(&path, wav)
        .await
        .map_err(|e| StageError::Io(format!("audio fallback write failed: {}", e)))?;

    tracing::info!("Synthetic WAV file created: {}", path.display());

    Ok(AudioOutput {
        reference: path,
        duration_seconds: SYNTHETIC_DURATION_SECS as f64,
        size_mb: size_in_mb(size_bytes),
        duration_ms: started.elapsed().as_millis() as u64,
        synthetic: true,
    })
}

/// Read size and duration of a WAV file without loading it
pub async fn probe_wav(path: &Path) -> Result<(u64, f64), StageError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| StageError::Provider(format!("{}: {}", path.display(), e)))?;
    let size_bytes = file
        .metadata()
        .await
        .map_err(|e| StageError::Provider(e.to_string()))?
        .len();

    let mut header = vec![0u8; HEADER_PROBE_BYTES];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .await
            .map_err(|e| StageError::Provider(e.to_string()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);

    let duration = buffer::wav_duration_secs(&header, size_bytes)
        .ok_or_else(|| StageError::Provider(format!("{} is not a PCM WAV file", path.display())))?;

    Ok((size_bytes, duration))
}

pub fn size_in_mb(bytes: u64) -> f64 {
    ((bytes as f64 / (1024.0 * 1024.0)) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_wav_is_probeable() {
        let dir = tempfile::tempdir().unwrap();
        let job_id = uuid::Uuid::new_v4();

        let output = write_synthetic_wav(dir.path(), job_id).await.unwrap();
        assert!(output.synthetic);
        assert_eq!(output.reference, dir.path().join(format!("{}.wav", job_id)));
        assert_eq!(output.size_mb, 0.92);

        let (size, duration) = probe_wav(&output.reference).await.unwrap();
        assert_eq!(size, 44 + 16_000 * 2 * 30);
        assert!((duration - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_wav(&dir.path().join("absent.wav")).await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_size_in_mb_rounds_to_two_places() {
        assert_eq!(size_in_mb(960_044), 0.92);
        assert_eq!(size_in_mb(0), 0.0);
    }
}
