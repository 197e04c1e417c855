// src/stt/types.rs
// Transcript types

use crate::detection::AiSource;
use crate::stage::{Details, StageOutput};
use serde::{Deserialize, Serialize};

/// One transcribed sentence, later enriched by the scoring stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Recognition confidence (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_source: Option<AiSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_details: Option<Details>,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_time: None,
            end_time: None,
            speaker: None,
            confidence: None,
            ai_probability: None,
            ai_source: None,
            ai_details: None,
        }
    }

    pub fn timed(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
            ..Self::new(text)
        }
    }
}

/// Output of the transcription stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptOutput {
    /// Service that produced the sentences (e.g., "ElevenLabs", "Sample")
    pub service: String,
    pub sentences: Vec<Sentence>,
    /// Detected language (e.g., "en")
    pub language: Option<String>,
}

impl StageOutput for TranscriptOutput {
    fn details(&self) -> Details {
        let mut details = Details::new();
        details.insert("service".into(), self.service.clone().into());
        details.insert("sentences_count".into(), self.sentences.len().into());
        details.insert(
            "has_timestamps".into(),
            self.sentences.iter().any(|s| s.start_time.is_some()).into(),
        );
        details.insert(
            "has_speaker_diarization".into(),
            self.sentences.iter().any(|s| s.speaker.is_some()).into(),
        );
        if let Some(language) = &self.language {
            details.insert("language".into(), language.clone().into());
        }
        details
    }
}
