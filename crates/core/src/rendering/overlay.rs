use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::detection::domain::detection::DetectionSummary;
use crate::shared::frame::Frame;

/// Cyan highlight for the face box and label.
pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 242, 254]);

const LINE_THICKNESS: i32 = 2;
const LABEL_OFFSET: i32 = 10;
const LABEL_SCALE: f32 = 24.0;

/// DejaVu Sans Mono Bold (Bitstream Vera license, see `assets/DejaVu-LICENSE.txt`).
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono-Bold.ttf");

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    InvalidFont(String),
}

/// Draws the primary face box and its `"{emotion}: {score}"` label.
///
/// Without a font only the box is drawn.
pub struct OverlayRenderer {
    font: Option<FontArc>,
}

impl OverlayRenderer {
    /// Renderer labelling with the bundled font.
    pub fn new() -> Self {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|e| log::warn!("Bundled label font unusable ({e}), drawing boxes only"))
            .ok();
        Self { font }
    }

    pub fn box_only() -> Self {
        Self { font: None }
    }

    pub fn from_font_file(path: &Path) -> Result<Self, OverlayError> {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| OverlayError::InvalidFont(path.display().to_string()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Burns the overlay into the frame. Non-RGB frames and boxes entirely
    /// outside the frame pass through unchanged.
    pub fn render(&self, mut frame: Frame, summary: &DetectionSummary) -> Frame {
        let (width, height) = (frame.width(), frame.height());
        let Some(bbox) = summary.bbox.clamped(width, height) else {
            return frame;
        };
        if frame.channels() != 3 {
            return frame;
        }

        let canvas = ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, frame.data_mut());
        if let Some(mut img) = canvas {
            for inset in 0..LINE_THICKNESS {
                let w = bbox.width - 2 * inset;
                let h = bbox.height - 2 * inset;
                if w <= 0 || h <= 0 {
                    break;
                }
                let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(&mut img, rect, OVERLAY_COLOR);
            }

            if let Some(font) = &self.font {
                let y = (summary.bbox.y - LABEL_OFFSET - LABEL_SCALE as i32).max(0);
                draw_text_mut(
                    &mut img,
                    OVERLAY_COLOR,
                    summary.bbox.x.max(0),
                    y,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &label_text(summary),
                );
            }
        }
        frame
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn label_text(summary: &DetectionSummary) -> String {
    format!("{}: {:.2}", summary.emotion, summary.score)
}
