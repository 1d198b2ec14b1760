use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageError};

use crate::shared::constants::JPEG_QUALITY;
use crate::shared::frame::Frame;

/// Compresses frames for the multipart stream.
#[derive(Clone, Copy, Debug)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ImageError> {
        let color = match frame.channels() {
            1 => ExtendedColorType::L8,
            _ => ExtendedColorType::Rgb8,
        };
        let mut jpeg = Vec::with_capacity(frame.data().len() / 8);
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            frame.data(),
            frame.width(),
            frame.height(),
            color,
        )?;
        Ok(jpeg)
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(JPEG_QUALITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_frame(width: u32, height: u32) -> Frame {
        let data = (0..width * height * 3).map(|i| (i * 37 % 251) as u8).collect();
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_output_is_a_jpeg() {
        let jpeg = JpegFrameEncoder::default().encode(&noisy_frame(32, 24)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_decodes_to_original_size() {
        let jpeg = JpegFrameEncoder::default().encode(&noisy_frame(40, 30)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let frame = noisy_frame(64, 64);
        let low = JpegFrameEncoder::new(10).encode(&frame).unwrap();
        let high = JpegFrameEncoder::new(95).encode(&frame).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegFrameEncoder::new(0).quality(), 1);
        assert_eq!(JpegFrameEncoder::new(200).quality(), 100);
    }
}
