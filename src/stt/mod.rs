// src/stt/mod.rs
// Transcription stage: WAV -> ordered sentences

mod elevenlabs;
mod sample;
mod types;

pub use elevenlabs::ElevenLabsTranscriber;
pub use sample::{sample_transcript, SAMPLE_SERVICE};
pub use types::{Sentence, TranscriptOutput};

use crate::stage::StageError;
use async_trait::async_trait;
use std::path::Path;

/// Transcription adapter
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the WAV file at `audio_ref` into ordered sentences
    async fn transcribe(&self, audio_ref: &Path) -> Result<TranscriptOutput, StageError>;

    /// Deterministic transcript used when transcription fails recoverably
    async fn fallback(&self) -> Result<TranscriptOutput, StageError> {
        Ok(sample_transcript())
    }

    fn name(&self) -> &str;
}
