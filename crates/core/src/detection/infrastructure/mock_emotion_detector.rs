use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::emotion_detector::EmotionDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::shared::frame::Frame;

/// Labels the mock draws from; "Happy" is listed twice to weight it.
const MOCK_EMOTIONS: &[&str] = &["Happy", "Happy", "Neutral", "Surprise", "Angry"];

/// Chance per detection that the mock switches to a new label.
const SWITCH_PROBABILITY: f64 = 0.05;

const BASE_SCORE: f64 = 0.88;
const SCORE_JITTER: f64 = 0.1;

/// Box side on a full-size frame.
const BOX_SIDE: f64 = 200.0;

/// Stand-in detector for machines without the ONNX models.
///
/// Reports a single centered face whose label is sticky: it changes only
/// occasionally, like a real person's expression would.
pub struct MockEmotionDetector {
    rng: StdRng,
    current: Option<&'static str>,
}

impl MockEmotionDetector {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence of labels and scores.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self { rng, current: None }
    }

    fn next_emotion(&mut self) -> &'static str {
        let switch = self.rng.gen_bool(SWITCH_PROBABILITY);
        match self.current {
            Some(label) if !switch => label,
            _ => {
                let label = MOCK_EMOTIONS.choose(&mut self.rng).copied().unwrap_or("Happy");
                self.current = Some(label);
                label
            }
        }
    }
}

impl Default for MockEmotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionDetector for MockEmotionDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let emotion = self.next_emotion();
        let score = BASE_SCORE + self.rng.gen::<f64>() * SCORE_JITTER;

        let mut emotions = BTreeMap::new();
        emotions.insert(emotion.to_string(), score);
        Ok(vec![Detection::new(centered_box(frame.width(), frame.height()), emotions)])
    }
}

/// Centered square sized relative to the frame, 200x200 at 640x480.
fn centered_box(width: u32, height: u32) -> BoundingBox {
    let factor = (width as f64 / DEFAULT_FRAME_WIDTH as f64)
        .min(height as f64 / DEFAULT_FRAME_HEIGHT as f64);
    let side = ((BOX_SIDE * factor).round() as i32).max(1);
    let x = width as i32 / 2 - side / 2;
    let y = height as i32 / 2 - side / 2;
    BoundingBox::new(x, y, side, side)
}
