use std::time::Duration;

use serde_json::{json, Value};

use crate::text::domain::text_analyzer::{TextAnalysisError, TextEmotion, TextEmotionAnalyzer};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Asks a Gemini model to classify text and parses its JSON answer.
pub struct GeminiTextAnalyzer {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiTextAnalyzer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Points the client at another endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl TextEmotionAnalyzer for GeminiTextAnalyzer {
    fn analyze(&self, text: &str) -> Result<TextEmotion, TextAnalysisError> {
        let request_err = |e: reqwest::Error| TextAnalysisError::Request(e.to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(request_err)?;

        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(text) }] }]
        });
        let response = client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TextAnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().map_err(request_err)?;
        let answer = candidate_text(&payload).ok_or(TextAnalysisError::EmptyResponse)?;
        log::debug!("Gemini answered: {answer}");
        parse_analysis(answer)
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"Analyze the underlying emotion of this text: "{text}"

Return a JSON object with:
1. "emotion": The dominant emotion (Choose from: Happy, Sad, Angry, Fear, Surprise, Neutral)
2. "score": A confidence score between 0.0 and 1.0
3. "breakdown": A dictionary of suspected emotions and their probabilities.

Example JSON:
{{ "emotion": "Happy", "score": 0.9, "breakdown": {{ "Happy": 0.9, "Excitement": 0.1 }} }}"#
    )
}

/// First text part of the first candidate.
fn candidate_text(payload: &Value) -> Option<&str> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

/// Parses the model's answer, which is often wrapped in a markdown fence.
fn parse_analysis(answer: &str) -> Result<TextEmotion, TextAnalysisError> {
    let cleaned = answer.replace("```json", "").replace("```", "");
    Ok(serde_json::from_str(cleaned.trim())?)
}
