use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Emotion read from a piece of free text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextEmotion {
    pub emotion: String,
    pub score: f64,
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
}

#[derive(Error, Debug)]
pub enum TextAnalysisError {
    #[error("Gemini API Key Not Configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(String),
    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("analysis service returned no text")]
    EmptyResponse,
    #[error("could not parse analysis: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Domain interface for text emotion analysis.
///
/// Implementations block on network I/O; async callers must run them on a
/// blocking thread.
pub trait TextEmotionAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<TextEmotion, TextAnalysisError>;
}
