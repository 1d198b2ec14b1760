pub mod detection;
pub mod emotion_detector;
