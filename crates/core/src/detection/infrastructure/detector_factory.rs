use std::path::PathBuf;

use crate::detection::domain::emotion_detector::EmotionDetector;
use crate::shared::model_resolver::ModelResolver;

use super::mock_emotion_detector::MockEmotionDetector;
use super::onnx_emotion_detector::OnnxEmotionDetector;

/// Detector backend preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    Mock,
    Onnx,
}

/// Creates the requested detector, falling back to the mock.
///
/// The ONNX backend needs both models on disk (or a reachable download);
/// when loading fails the server still runs, reporting mock emotions, and
/// the reason is logged.
pub fn create_detector(
    kind: DetectorKind,
    confidence: f64,
    bundled_models: Option<PathBuf>,
) -> Box<dyn EmotionDetector> {
    match kind {
        DetectorKind::Mock => {
            log::info!("Using mock emotion detector");
            Box::new(MockEmotionDetector::new())
        }
        DetectorKind::Onnx => {
            let loaded = ModelResolver::with_default_cache(bundled_models)
                .map_err(Box::<dyn std::error::Error>::from)
                .and_then(|resolver| OnnxEmotionDetector::from_resolver(&resolver, confidence));
            match loaded {
                Ok(detector) => {
                    log::info!("Using ONNX emotion detector (confidence={confidence})");
                    Box::new(detector)
                }
                Err(e) => {
                    log::warn!("ONNX emotion detector unavailable ({e}), using mock detector");
                    Box::new(MockEmotionDetector::new())
                }
            }
        }
    }
}
