// detection/heuristic.rs — Rules-based authorship scoring without a remote classifier

use super::types::{AiSource, AuthorshipScore, ScoringError};
use crate::stage::Details;
use regex::Regex;
use std::sync::OnceLock;

const BASE_PROBABILITY: f64 = 0.3;
const LONG_TEXT_WORDS: usize = 25;
const MAX_COMMA_PARTS: usize = 3;

/// Phrasing typical of generated text
const AI_PATTERNS: [&str; 10] = [
    "as an ai|artificial intelligence",
    "i don't have|i cannot|i'm not able to",
    "i'm just a|i'm an ai",
    "please note that|it's worth noting",
    "furthermore|moreover|additionally",
    "in conclusion|to summarize",
    "it is important to|it's important to",
    "revolutionary|transformative|cutting-edge",
    "paradigm shift|unprecedented",
    "leverage|utilize|optimize",
];

/// Phrasing typical of spoken, human text
const HUMAN_PATTERNS: [&str; 7] = [
    "i think|i feel|in my opinion",
    "personally|honestly|frankly",
    "um|uh|well|you know",
    "gonna|wanna|gotta",
    "hey|hello|hi there",
    "awesome|cool|amazing|wow",
    "by the way|speaking of",
];

struct PatternSet {
    ai: Vec<Regex>,
    human: Vec<Regex>,
}

fn compile(groups: &[&str]) -> Result<Vec<Regex>, String> {
    groups
        .iter()
        .map(|group| {
            // straight and typographic apostrophes are interchangeable in transcripts
            let alternatives = group.replace('\'', "['’]");
            // anchored at the word start only, so inflections ("leveraged") still count
            Regex::new(&format!(r"(?i)\b(?:{})", alternatives)).map_err(|e| e.to_string())
        })
        .collect()
}

fn patterns() -> Result<&'static PatternSet, ScoringError> {
    static PATTERNS: OnceLock<Result<PatternSet, String>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Ok(PatternSet {
                ai: compile(&AI_PATTERNS)?,
                human: compile(&HUMAN_PATTERNS)?,
            })
        })
        .as_ref()
        .map_err(|e| ScoringError::PatternError(e.clone()))
}

/// Deterministic authorship probability for `text`
pub fn score(text: &str) -> Result<AuthorshipScore, ScoringError> {
    let patterns = patterns()?;

    let ai_score = patterns.ai.iter().filter(|re| re.is_match(text)).count();
    let human_score = patterns.human.iter().filter(|re| re.is_match(text)).count();

    let mut probability = if ai_score > human_score {
        0.7 + 0.1 * ai_score as f64
    } else if human_score > ai_score {
        0.2 - 0.05 * human_score as f64
    } else {
        BASE_PROBABILITY
    };

    // Long, heavily punctuated sentences read as generated
    let word_count = text.split_whitespace().count();
    if word_count > LONG_TEXT_WORDS {
        probability += 0.1;
    }
    if text.contains(';') || text.split(',').count() > MAX_COMMA_PARTS {
        probability += 0.1;
    }

    if !probability.is_finite() {
        return Err(ScoringError::NonFinite);
    }

    let mut details = Details::new();
    details.insert("ai_indicators".into(), ai_score.into());
    details.insert("human_indicators".into(), human_score.into());
    details.insert("word_count".into(), word_count.into());
    details.insert("method".into(), "pattern_analysis".into());

    Ok(AuthorshipScore {
        probability: probability.clamp(0.0, 1.0),
        source: AiSource::Heuristic,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Scalar;

    fn indicators(score: &AuthorshipScore) -> (i64, i64) {
        let get = |key: &str| match score.details.get(key) {
            Some(Scalar::Integer(n)) => *n,
            other => panic!("missing {}: {:?}", key, other),
        };
        (get("ai_indicators"), get("human_indicators"))
    }

    #[test]
    fn test_casual_greeting_reads_human() {
        let result = score("Hey everyone, I honestly think this is awesome!").unwrap();
        let (ai, human) = indicators(&result);

        assert_eq!(ai, 0);
        assert_eq!(human, 3);
        assert!((result.probability - 0.05).abs() < 1e-9);
        assert_eq!(result.source, AiSource::Heuristic);
    }

    #[test]
    fn test_long_formal_text_clamps_to_one() {
        let text = "Our team believes it is important to leverage this paradigm shift; every department \
                    should plan carefully and measure results over the next several quarters before \
                    scaling the program across regions.";
        let result = score(text).unwrap();
        let (ai, _) = indicators(&result);

        assert_eq!(result.details.get("word_count"), Some(&Scalar::Integer(30)));
        assert!(ai >= 2);
        assert_eq!(result.probability, 1.0);
    }

    #[test]
    fn test_neutral_text_keeps_base() {
        let result = score("The meeting starts at noon.").unwrap();
        assert!((result.probability - BASE_PROBABILITY).abs() < 1e-9);
    }

    #[test]
    fn test_many_commas_add_complexity() {
        let result = score("Apples, pears, plums, and cherries were sold.").unwrap();
        assert!((result.probability - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_matches_word_starts_only() {
        // "summarize" and "document" must not trigger "um"
        let result = score("Summarize the document.").unwrap();
        assert_eq!(indicators(&result), (0, 0));
    }

    #[test]
    fn test_inflected_buzzwords_count() {
        let result = score("We leveraged new tools and optimized everything.").unwrap();
        assert_eq!(indicators(&result), (1, 0));
        assert!((result.probability - 0.8).abs() < 1e-9);

        let result = score("They behaved transformatively.").unwrap();
        assert_eq!(indicators(&result).0, 1);
    }

    #[test]
    fn test_typographic_apostrophe() {
        let result = score("It’s worth noting that I cannot verify this.").unwrap();
        assert_eq!(indicators(&result).0, 2);
        assert!((result.probability - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_many_human_markers_floor_at_zero() {
        let result =
            score("Hey, um, honestly I think it's gonna be awesome, by the way you know").unwrap();
        assert!(result.probability >= 0.0);
        assert!(result.probability < 0.1);
    }

    #[test]
    fn test_is_pure() {
        let text = "Furthermore, we must optimize the pipeline.";
        let first = score(text).unwrap();
        for _ in 0..10 {
            assert_eq!(score(text).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_text() {
        let result = score("").unwrap();
        assert!((result.probability - BASE_PROBABILITY).abs() < 1e-9);
        assert_eq!(result.details.get("word_count"), Some(&Scalar::Integer(0)));
    }
}
