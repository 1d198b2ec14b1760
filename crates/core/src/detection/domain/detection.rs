use std::collections::BTreeMap;

use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;

/// One face found in a frame, with a score per emotion label.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub emotions: BTreeMap<String, f64>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, emotions: BTreeMap<String, f64>) -> Self {
        Self { bbox, emotions }
    }

    /// Highest-scoring emotion. Ties keep the label that sorts first.
    pub fn dominant_emotion(&self) -> Option<(&str, f64)> {
        self.emotions
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (label, &score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((label.as_str(), score)),
            })
    }

    /// Copy with the box rescaled into another frame's coordinates.
    pub fn rescaled(&self, factor: f64) -> Self {
        Self {
            bbox: self.bbox.scaled(factor),
            emotions: self.emotions.clone(),
        }
    }

    /// Reduces to what the overlay and the stream consumers need.
    pub fn summarize(&self) -> Option<DetectionSummary> {
        let (emotion, score) = self.dominant_emotion()?;
        Some(DetectionSummary {
            emotion: emotion.to_string(),
            score,
            bbox: self.bbox,
        })
    }
}

/// The largest face in a frame. Equal areas resolve to the earliest one.
pub fn primary_face(detections: &[Detection]) -> Option<&Detection> {
    detections.iter().reduce(|best, candidate| {
        if candidate.bbox.area() > best.bbox.area() {
            candidate
        } else {
            best
        }
    })
}

/// Dominant emotion of the primary face, as reported to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub emotion: String,
    pub score: f64,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn detection(bbox: (i32, i32, i32, i32), scores: &[(&str, f64)]) -> Detection {
        Detection::new(
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
            scores.iter().map(|(l, s)| (l.to_string(), *s)).collect(),
        )
    }

    #[test]
    fn test_dominant_emotion_picks_highest_score() {
        let d = detection((0, 0, 1, 1), &[("Happy", 0.2), ("Sad", 0.7), ("Angry", 0.1)]);
        assert_eq!(d.dominant_emotion(), Some(("Sad", 0.7)));
    }

    #[test]
    fn test_dominant_emotion_tie_keeps_first_label() {
        let d = detection((0, 0, 1, 1), &[("Sad", 0.5), ("Happy", 0.5)]);
        assert_eq!(d.dominant_emotion().unwrap().0, "Happy");
    }

    #[test]
    fn test_dominant_emotion_empty_scores() {
        let d = detection((0, 0, 1, 1), &[]);
        assert!(d.dominant_emotion().is_none());
        assert!(d.summarize().is_none());
    }

    #[test]
    fn test_primary_face_is_largest_box() {
        let faces = vec![
            detection((0, 0, 10, 10), &[("Happy", 0.9)]),
            detection((0, 0, 20, 20), &[("Sad", 0.8)]),
        ];
        let summary = primary_face(&faces).unwrap().summarize().unwrap();
        assert_eq!(summary.emotion, "Sad");
        assert_relative_eq!(summary.score, 0.8);
        assert_eq!(summary.bbox, BoundingBox::new(0, 0, 20, 20));
    }

    #[test]
    fn test_primary_face_tie_keeps_first() {
        let faces = vec![
            detection((0, 0, 10, 10), &[("Happy", 0.9)]),
            detection((50, 50, 10, 10), &[("Sad", 0.8)]),
        ];
        assert_eq!(primary_face(&faces).unwrap().bbox.x, 0);
    }

    #[test]
    fn test_primary_face_none_for_empty() {
        assert!(primary_face(&[]).is_none());
    }

    #[test]
    fn test_rescaled_maps_box_back_to_full_frame() {
        let d = detection((40, 20, 80, 80), &[("Happy", 0.9)]);
        let full = d.rescaled(1.0 / 0.4);
        assert_eq!(full.bbox, BoundingBox::new(100, 50, 200, 200));
        assert_eq!(full.emotions, d.emotions);
    }

    #[test]
    fn test_summary_serializes_box_as_array() {
        let summary = detection((1, 2, 3, 4), &[("Happy", 0.5)]).summarize().unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["emotion"], "Happy");
        assert_eq!(json["box"], serde_json::json!([1, 2, 3, 4]));
    }
}
