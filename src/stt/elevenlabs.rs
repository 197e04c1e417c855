// src/stt/elevenlabs.rs
// ElevenLabs Scribe STT Adapter

use super::{Sentence, TranscriptOutput, Transcriber};
use crate::stage::StageError;
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";
const MODEL_ID: &str = "scribe_v1";
const TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
struct ElevenLabsResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Word {
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(rename = "type", default = "default_word_type")]
    pub kind: String,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub logprob: Option<f64>,
}

fn default_word_type() -> String {
    "word".to_string()
}

pub struct ElevenLabsTranscriber {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ElevenLabsTranscriber {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        if api_key.is_some() {
            tracing::info!("ElevenLabs transcriber initialized");
        } else {
            tracing::info!("ElevenLabs API key not configured, transcription will use sample data");
        }

        Self { api_key, client }
    }
}

#[async_trait]
impl Transcriber for ElevenLabsTranscriber {
    async fn transcribe(&self, audio_ref: &Path) -> Result<TranscriptOutput, StageError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| StageError::Unconfigured("ElevenLabs API key".to_string()))?;

        let wav_bytes = tokio::fs::read(audio_ref)
            .await
            .map_err(|e| StageError::MissingInput(format!("{}: {}", audio_ref.display(), e)))?;

        tracing::info!(
            "ElevenLabs STT: transcribing {:.2}MB audio...",
            wav_bytes.len() as f64 / (1024.0 * 1024.0)
        );

        let file_part = multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| StageError::Provider(e.to_string()))?;

        let form = multipart::Form::new()
            .text("model_id", MODEL_ID)
            .text("diarize", "true")
            .text("timestamps_granularity", "word")
            .part("file", file_part);

        let response = self
            .client
            .post(ELEVENLABS_API_URL)
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let eleven_resp: ElevenLabsResponse = resp
                        .json()
                        .await
                        .map_err(|e| StageError::Provider(e.to_string()))?;

                    let sentences = if eleven_resp.words.is_empty() {
                        split_plain_text(&eleven_resp.text)
                    } else {
                        group_words(&eleven_resp.words)
                    };

                    Ok(TranscriptOutput {
                        service: "ElevenLabs".to_string(),
                        sentences,
                        language: eleven_resp.language_code,
                    })
                } else if status.as_u16() == 401 {
                    Err(StageError::Provider("authentication failed".to_string()))
                } else if status.as_u16() == 429 {
                    Err(StageError::Provider("rate limit exceeded".to_string()))
                } else {
                    let error_text = resp.text().await.unwrap_or_default();
                    Err(StageError::Provider(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )))
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(StageError::Timeout(TIMEOUT_SECS))
                } else {
                    Err(StageError::Network(e.to_string()))
                }
            }
        }
    }

    fn name(&self) -> &str {
        "ElevenLabs Scribe"
    }
}

#[derive(Default)]
struct SentenceBuilder {
    text: String,
    start: Option<f64>,
    end: Option<f64>,
    speaker: Option<String>,
    confidences: Vec<f64>,
}

impl SentenceBuilder {
    fn push_word(&mut self, word: &Word) {
        self.text.push_str(&word.text);
        if self.start.is_none() {
            self.start = word.start;
        }
        if word.end.is_some() {
            self.end = word.end;
        }
        if self.speaker.is_none() {
            self.speaker = word.speaker_id.clone();
        }
        if let Some(logprob) = word.logprob {
            self.confidences.push(logprob.exp().clamp(0.0, 1.0));
        }
    }

    fn finish(&mut self) -> Option<Sentence> {
        let built = std::mem::take(self);
        let text = built.text.trim();
        if text.is_empty() {
            return None;
        }

        let confidence = if built.confidences.is_empty() {
            None
        } else {
            Some(built.confidences.iter().sum::<f64>() / built.confidences.len() as f64)
        };

        Some(Sentence {
            start_time: built.start,
            end_time: built.end,
            speaker: built.speaker,
            confidence,
            ..Sentence::new(text)
        })
    }
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end_matches(['"', '\'', ')', '”', '’'])
        .ends_with(['.', '!', '?'])
}

/// Group word-level timestamps into sentences on terminal punctuation
pub(crate) fn group_words(words: &[Word]) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut current = SentenceBuilder::default();

    for word in words {
        match word.kind.as_str() {
            "audio_event" => continue,
            "spacing" => {
                if !current.text.is_empty() {
                    current.text.push_str(&word.text);
                }
                continue;
            }
            _ => {}
        }

        current.push_word(word);
        if ends_sentence(&word.text) {
            sentences.extend(current.finish());
        }
    }

    sentences.extend(current.finish());
    sentences
}

/// Untimed sentence split for responses without word data
pub(crate) fn split_plain_text(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        let terminal = matches!(ch, '.' | '!' | '?');
        let run_continues = matches!(chars.peek(), Some('.' | '!' | '?'));
        if terminal && !run_continues {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(Sentence::new(trimmed));
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(Sentence::new(trimmed));
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64, logprob: f64) -> Word {
        Word {
            text: text.to_string(),
            start: Some(start),
            end: Some(end),
            kind: "word".to_string(),
            speaker_id: Some("speaker_0".to_string()),
            logprob: Some(logprob),
        }
    }

    fn spacing() -> Word {
        Word {
            text: " ".to_string(),
            start: None,
            end: None,
            kind: "spacing".to_string(),
            speaker_id: None,
            logprob: None,
        }
    }

    #[test]
    fn test_group_words_splits_on_terminal_punctuation() {
        let words = vec![
            word("Hello", 0.0, 0.4, 0.0),
            spacing(),
            word("there.", 0.5, 0.9, 0.0),
            spacing(),
            word("How", 1.2, 1.4, 0.0),
            spacing(),
            word("are", 1.5, 1.6, 0.0),
            spacing(),
            word("you?", 1.7, 2.0, 0.0),
        ];

        let sentences = group_words(&words);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "Hello there.");
        assert_eq!(sentences[0].start_time, Some(0.0));
        assert_eq!(sentences[0].end_time, Some(0.9));
        assert_eq!(sentences[1].text, "How are you?");
        assert_eq!(sentences[1].speaker.as_deref(), Some("speaker_0"));
        assert_eq!(sentences[1].confidence, Some(1.0));
    }

    #[test]
    fn test_group_words_keeps_trailing_fragment_and_skips_events() {
        let mut laughter = word("(laughter)", 0.9, 1.1, 0.0);
        laughter.kind = "audio_event".to_string();

        let words = vec![word("So", 0.0, 0.2, -0.1), spacing(), laughter, word("yeah", 0.3, 0.6, -0.3)];
        let sentences = group_words(&words);

        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "So yeah");
        let confidence = sentences[0].confidence.unwrap();
        assert!(confidence > 0.7 && confidence < 0.9);
    }

    #[test]
    fn test_split_plain_text() {
        let sentences = split_plain_text("It works. Does it?! Yes... mostly");
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["It works.", "Does it?!", "Yes...", "mostly"]);
        assert!(sentences.iter().all(|s| s.start_time.is_none()));
    }

    #[tokio::test]
    async fn test_unconfigured_is_recoverable() {
        let transcriber = ElevenLabsTranscriber::new(None);
        let err = transcriber
            .transcribe(Path::new("/nonexistent/audio.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Unconfigured(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_missing_audio_is_recoverable() {
        let transcriber = ElevenLabsTranscriber::new(Some("sk_test".to_string()));
        let err = transcriber
            .transcribe(Path::new("/nonexistent/audio.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingInput(_)));
        assert!(err.is_recoverable());
    }
}
