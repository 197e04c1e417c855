// src/stt/sample.rs
// Fixed transcript substituted when transcription is unavailable

use super::{Sentence, TranscriptOutput};

pub const SAMPLE_SERVICE: &str = "Sample";

const SAMPLE_LINES: [(&str, f64, f64, f64); 7] = [
    ("Hey everyone, welcome back to the channel!", 0.5, 2.8, 0.98),
    (
        "Today we're going to dive deep into artificial intelligence and machine learning.",
        3.2,
        7.1,
        0.95,
    ),
    (
        "This technology is revolutionizing how we process and understand data.",
        7.5,
        11.8,
        0.97,
    ),
    (
        "Machine learning algorithms can identify patterns that humans might miss.",
        12.2,
        16.5,
        0.94,
    ),
    (
        "The applications are endless, from healthcare to autonomous vehicles.",
        17.0,
        21.3,
        0.96,
    ),
    (
        "But we also need to consider the ethical implications of AI development.",
        21.8,
        25.9,
        0.93,
    ),
    (
        "Thanks for watching, and don't forget to subscribe for more content!",
        26.4,
        30.2,
        0.98,
    ),
];

pub fn sample_transcript() -> TranscriptOutput {
    let sentences = SAMPLE_LINES
        .iter()
        .map(|&(text, start, end, confidence)| Sentence {
            speaker: Some("Speaker_1".to_string()),
            confidence: Some(confidence),
            ..Sentence::timed(text, start, end)
        })
        .collect();

    TranscriptOutput {
        service: SAMPLE_SERVICE.to_string(),
        sentences,
        language: Some("en".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_ordered_and_unscored() {
        let transcript = sample_transcript();
        assert_eq!(transcript.sentences.len(), 7);
        assert!(transcript
            .sentences
            .windows(2)
            .all(|w| w[0].end_time <= w[1].start_time));
        assert!(transcript.sentences.iter().all(|s| s.ai_probability.is_none()));
    }
}
