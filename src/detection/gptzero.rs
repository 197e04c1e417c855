// detection/gptzero.rs — GPTZero remote classifier

use super::types::{RemoteVerdict, ScoringError};
use super::RemoteClassifier;
use crate::stage::Details;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GPTZERO_API_URL: &str = "https://api.gptzero.me/v2/predict/text";
const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    document: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    documents: Vec<DocumentVerdict>,
}

#[derive(Debug, Deserialize)]
struct DocumentVerdict {
    average_generated_prob: Option<f64>,
    #[serde(default)]
    completely_generated_prob: Option<f64>,
    #[serde(default)]
    overall_burstiness: Option<f64>,
}

pub struct GptZeroClassifier {
    api_key: String,
    client: reqwest::Client,
}

impl GptZeroClassifier {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        tracing::info!("GPTZero classifier initialized");
        Self { api_key, client }
    }
}

fn verdict_from(response: PredictResponse) -> Result<RemoteVerdict, ScoringError> {
    let document = response
        .documents
        .into_iter()
        .next()
        .ok_or_else(|| ScoringError::InvalidResponse("no documents in response".to_string()))?;

    let probability = document
        .average_generated_prob
        .ok_or_else(|| ScoringError::InvalidResponse("missing average_generated_prob".to_string()))?;

    let mut details = Details::new();
    if let Some(prob) = document.completely_generated_prob {
        details.insert("completely_generated_prob".into(), prob.into());
    }
    if let Some(burstiness) = document.overall_burstiness {
        details.insert("overall_burstiness".into(), burstiness.into());
    }

    Ok(RemoteVerdict {
        probability,
        details,
    })
}

#[async_trait]
impl RemoteClassifier for GptZeroClassifier {
    async fn classify(&self, text: &str) -> Result<RemoteVerdict, ScoringError> {
        let response = self
            .client
            .post(GPTZERO_API_URL)
            .header("x-api-key", &self.api_key)
            .json(&PredictRequest { document: text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::Timeout
                } else {
                    ScoringError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScoringError::ProviderError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;

        verdict_from(parsed)
    }

    fn name(&self) -> &str {
        "GPTZero"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_from_first_document() {
        let response: PredictResponse = serde_json::from_str(
            r#"{"documents":[{"average_generated_prob":0.82,"completely_generated_prob":0.9,"overall_burstiness":12.5}]}"#,
        )
        .unwrap();

        let verdict = verdict_from(response).unwrap();
        assert_eq!(verdict.probability, 0.82);
        assert_eq!(verdict.details.len(), 2);
    }

    #[test]
    fn test_verdict_requires_document() {
        let response: PredictResponse = serde_json::from_str(r#"{"documents":[]}"#).unwrap();
        assert!(matches!(
            verdict_from(response),
            Err(ScoringError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_verdict_requires_probability() {
        let response: PredictResponse =
            serde_json::from_str(r#"{"documents":[{"overall_burstiness":3.0}]}"#).unwrap();
        assert!(verdict_from(response).is_err());
    }
}
