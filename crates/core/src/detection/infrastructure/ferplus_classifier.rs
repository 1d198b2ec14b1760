use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array4;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::onnx_session::load_session;

/// FER+ input: one grayscale 64x64 face.
const INPUT_SIZE: usize = 64;

/// Output order of the FER+ model.
pub const FERPLUS_LABELS: [&str; 8] = [
    "Neutral", "Happy", "Surprise", "Sad", "Angry", "Disgust", "Fear", "Contempt",
];

/// Scores a face crop over the eight FER+ emotion classes.
pub struct FerPlusClassifier {
    session: ort::session::Session,
}

impl FerPlusClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
        })
    }

    /// Probability per label for the face inside `face` (frame coordinates).
    pub fn classify(
        &mut self,
        frame: &Frame,
        face: &BoundingBox,
    ) -> Result<BTreeMap<String, f64>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(face_tensor(frame, face))?;
        let outputs = self.session.run(ort::inputs![input])?;
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits = logits.as_slice().ok_or("emotion model output is not contiguous")?;
        if logits.len() != FERPLUS_LABELS.len() {
            return Err(format!(
                "expected {} emotion scores, got {}",
                FERPLUS_LABELS.len(),
                logits.len()
            )
            .into());
        }

        Ok(FERPLUS_LABELS
            .iter()
            .zip(softmax(logits))
            .map(|(label, p)| (label.to_string(), p))
            .collect())
    }
}

/// Samples the face box into a `[1, 1, 64, 64]` luminance tensor.
///
/// FER+ expects raw 0-255 intensities, not normalized values.
fn face_tensor(frame: &Frame, face: &BoundingBox) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 1, INPUT_SIZE, INPUT_SIZE));
    let src = frame.as_ndarray();
    let max_x = frame.width().saturating_sub(1) as i64;
    let max_y = frame.height().saturating_sub(1) as i64;

    for y in 0..INPUT_SIZE {
        let sy = face.y as i64 + (y as i64 * face.height as i64) / INPUT_SIZE as i64;
        let sy = sy.clamp(0, max_y) as usize;
        for x in 0..INPUT_SIZE {
            let sx = face.x as i64 + (x as i64 * face.width as i64) / INPUT_SIZE as i64;
            let sx = sx.clamp(0, max_x) as usize;
            let (r, g, b) = (
                src[[sy, sx, 0]] as f32,
                src[[sy, sx, 1]] as f32,
                src[[sy, sx, 2]] as f32,
            );
            tensor[[0, 0, y, x]] = 0.299 * r + 0.587 * g + 0.114 * b;
        }
    }
    tensor
}

fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
