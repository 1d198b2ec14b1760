use std::path::Path;

use ndarray::Array4;

use crate::shared::frame::Frame;

use super::onnx_session::{declared_input_size, load_session};

/// Input resolution used when the model declares a dynamic shape.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO letterbox padding value (114 gray).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A face box in frame pixel coordinates, as corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceCandidate {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

impl FaceCandidate {
    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Finds faces with a YOLO face model.
pub struct YoloFaceLocator {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl YoloFaceLocator {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        let input_size = declared_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    pub fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
        let (input, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("face model output is not contiguous")?;

        let mut candidates = parse_output(data, &shape, self.confidence, &letterbox)?;
        Ok(nms(&mut candidates, NMS_IOU_THRESH))
    }
}

/// Mapping between letterboxed model input and the original frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Fits the frame into a `size` x `size` NCHW tensor, keeping aspect ratio.
fn letterbox(frame: &Frame, size: u32) -> (Array4<f32>, Letterbox) {
    let (fw, fh) = (frame.width() as f64, frame.height() as f64);
    let scale = (size as f64 / fw).min(size as f64 / fh);
    let new_w = ((fw * scale).round() as u32).min(size);
    let new_h = ((fh * scale).round() as u32).min(size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let mut tensor = Array4::<f32>::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);
    let src = frame.as_ndarray();
    let (src_h, src_w) = (frame.height() as usize, frame.width() as usize);

    for y in 0..new_h as usize {
        let sy = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let sx = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Decodes `[1, features, boxes]` or `[1, boxes, features]` output rows of
/// `[cx, cy, w, h, conf, ...]` into frame-space candidates above `confidence`.
fn parse_output(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("unexpected face model output shape: {shape:?}").into());
    }
    // Ultralytics exports put features on axis 1; fewer features than boxes.
    let transposed = shape[1] < shape[2];
    let (num_boxes, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_boxes * num_feats {
        return Ok(Vec::new());
    }
    let at = |b: usize, f: usize| -> f64 {
        let i = if transposed {
            f * num_boxes + b
        } else {
            b * num_feats + f
        };
        data[i] as f64
    };

    let mut out = Vec::new();
    for b in 0..num_boxes {
        let conf = at(b, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (at(b, 0), at(b, 1), at(b, 2), at(b, 3));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        out.push(FaceCandidate {
            x1,
            y1,
            x2,
            y2,
            confidence: conf,
        });
    }
    Ok(out)
}

/// Greedy NMS over candidates sorted by confidence.
fn nms(candidates: &mut [FaceCandidate], iou_thresh: f64) -> Vec<FaceCandidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceCandidate> = Vec::new();
    for candidate in candidates.iter() {
        let overlaps = keep
            .iter()
            .any(|kept| iou(&kept.corners(), &candidate.corners()) > iou_thresh);
        if !overlaps {
            keep.push(*candidate);
        }
    }
    keep
}

fn iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
