//! Two-stage emotion detector: YOLO locates faces, FER+ scores each one.

use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::emotion_detector::EmotionDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{
    EMOTION_MODEL_NAME, EMOTION_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{ModelResolver, ModelSpec};

use super::ferplus_classifier::FerPlusClassifier;
use super::yolo_face_locator::YoloFaceLocator;

pub struct OnnxEmotionDetector {
    locator: YoloFaceLocator,
    classifier: FerPlusClassifier,
}

impl OnnxEmotionDetector {
    pub fn new(
        face_model: &Path,
        emotion_model: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            locator: YoloFaceLocator::new(face_model, confidence)?,
            classifier: FerPlusClassifier::new(emotion_model)?,
        })
    }

    /// Resolves both models (downloading on first use) and loads them.
    pub fn from_resolver(
        resolver: &ModelResolver,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let face_model = resolver.resolve(ModelSpec {
            name: YOLO_MODEL_NAME,
            url: YOLO_MODEL_URL,
        })?;
        let emotion_model = resolver.resolve(ModelSpec {
            name: EMOTION_MODEL_NAME,
            url: EMOTION_MODEL_URL,
        })?;
        Self::new(&face_model, &emotion_model, confidence)
    }
}

impl EmotionDetector for OnnxEmotionDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let faces = self.locator.locate(frame)?;

        let mut detections = Vec::with_capacity(faces.len());
        for face in faces {
            let bbox = BoundingBox::from_corners(face.x1, face.y1, face.x2, face.y2);
            // Boxes can reach past the frame edge after un-letterboxing.
            let Some(bbox) = bbox.clamped(frame.width(), frame.height()) else {
                continue;
            };
            let emotions = self.classifier.classify(frame, &bbox)?;
            detections.push(Detection::new(bbox, emotions));
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires downloading both ONNX models
    fn test_detects_nothing_on_blank_frame() {
        let resolver = ModelResolver::with_default_cache(None).unwrap();
        let mut detector = OnnxEmotionDetector::from_resolver(&resolver, 0.25).unwrap();
        let frame = Frame::new(vec![0u8; 320 * 240 * 3], 320, 240, 3, 0);

        let detections = detector.detect(&frame).unwrap();

        assert!(detections.is_empty());
    }
}
