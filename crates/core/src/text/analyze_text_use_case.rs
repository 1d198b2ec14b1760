use std::collections::BTreeMap;

use serde::Serialize;

use crate::shared::constants::NEUTRAL_EMOTION;
use crate::text::domain::text_analyzer::{TextAnalysisError, TextEmotionAnalyzer};

/// Score reported when no analyzer is configured.
const UNCONFIGURED_SCORE: f64 = 0.5;

/// Answer for one text analysis request. Failures are folded into a
/// neutral result carrying `error` instead of failing the request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextAnalysisResponse {
    pub emotion: String,
    pub score: f64,
    pub breakdown: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TextAnalysisResponse {
    fn neutral(score: f64, error: &TextAnalysisError) -> Self {
        Self {
            emotion: NEUTRAL_EMOTION.to_string(),
            score,
            breakdown: BTreeMap::new(),
            error: Some(error.to_string()),
        }
    }
}

pub struct AnalyzeTextUseCase {
    analyzer: Option<Box<dyn TextEmotionAnalyzer>>,
}

impl AnalyzeTextUseCase {
    pub fn new(analyzer: Option<Box<dyn TextEmotionAnalyzer>>) -> Self {
        if analyzer.is_none() {
            log::warn!("Text analysis API key not set; /analyze_text returns a neutral fallback");
        }
        Self { analyzer }
    }

    pub fn is_configured(&self) -> bool {
        self.analyzer.is_some()
    }

    pub fn execute(&self, text: &str) -> TextAnalysisResponse {
        let Some(analyzer) = &self.analyzer else {
            return TextAnalysisResponse::neutral(
                UNCONFIGURED_SCORE,
                &TextAnalysisError::NotConfigured,
            );
        };

        match analyzer.analyze(text) {
            Ok(result) => TextAnalysisResponse {
                emotion: result.emotion,
                score: result.score,
                breakdown: result.breakdown,
                error: None,
            },
            Err(e) => {
                log::warn!("Text analysis failed: {e}");
                TextAnalysisResponse::neutral(0.0, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::domain::text_analyzer::TextEmotion;

    struct StubAnalyzer(fn(&str) -> Result<TextEmotion, TextAnalysisError>);

    impl TextEmotionAnalyzer for StubAnalyzer {
        fn analyze(&self, text: &str) -> Result<TextEmotion, TextAnalysisError> {
            (self.0)(text)
        }
    }

    #[test]
    fn test_unconfigured_returns_neutral_half() {
        let response = AnalyzeTextUseCase::new(None).execute("anything");
        assert_eq!(response.emotion, "Neutral");
        assert_eq!(response.score, 0.5);
        assert!(response.breakdown.is_empty());
        assert_eq!(response.error.as_deref(), Some("Gemini API Key Not Configured"));
    }

    #[test]
    fn test_success_passes_result_through() {
        let use_case = AnalyzeTextUseCase::new(Some(Box::new(StubAnalyzer(|_| {
            Ok(TextEmotion {
                emotion: "Happy".into(),
                score: 0.9,
                breakdown: BTreeMap::from([("Happy".to_string(), 0.9)]),
            })
        }))));

        let response = use_case.execute("great news");

        assert!(use_case.is_configured());
        assert_eq!(response.emotion, "Happy");
        assert_eq!(response.error, None);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_returns_neutral_zero_with_reason() {
        let use_case = AnalyzeTextUseCase::new(Some(Box::new(StubAnalyzer(|_| {
            Err(TextAnalysisError::EmptyResponse)
        }))));

        let response = use_case.execute("hmm");

        assert_eq!(response.emotion, "Neutral");
        assert_eq!(response.score, 0.0);
        assert!(response.breakdown.is_empty());
        assert_eq!(
            response.error.as_deref(),
            Some("analysis service returned no text")
        );
    }
}
