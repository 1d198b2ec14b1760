use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for facial emotion detection.
///
/// Implementations may keep state between frames (model sessions, sticky
/// mock labels), hence `&mut self`.
pub trait EmotionDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
