use image::imageops::FilterType;
use image::RgbImage;
use ndarray::ArrayView3;

/// A single captured camera frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at the device and encoder boundaries only;
/// the session treats pixel data as opaque apart from mirroring and scaling.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps an RGB image, taking ownership of its buffer.
    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Capture sequence number assigned by the capture loop.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Re-stamps the frame with a new sequence number.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Converts into an `image` buffer. Returns `None` for non-RGB frames.
    pub fn into_rgb_image(self) -> Option<RgbImage> {
        if self.channels != 3 {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data)
    }

    /// Returns a horizontally mirrored copy (selfie view).
    pub fn mirrored(&self) -> Frame {
        let channels = self.channels as usize;
        let stride = self.width as usize * channels;
        let mut data = Vec::with_capacity(self.data.len());
        if stride > 0 {
            for row in self.data.chunks_exact(stride) {
                for pixel in row.chunks_exact(channels).rev() {
                    data.extend_from_slice(pixel);
                }
            }
        }
        Frame::new(data, self.width, self.height, self.channels, self.index)
    }

    /// Returns a copy resized by `factor` on both axes (at least 1x1).
    ///
    /// Only RGB frames can be resized; other layouts are returned as-is.
    pub fn scaled(&self, factor: f64) -> Frame {
        let new_w = ((self.width as f64 * factor).round() as u32).max(1);
        let new_h = ((self.height as f64 * factor).round() as u32).max(1);
        if (new_w, new_h) == (self.width, self.height) {
            return self.clone();
        }
        match self.clone().into_rgb_image() {
            Some(img) => {
                let resized = image::imageops::resize(&img, new_w, new_h, FilterType::Triangle);
                Frame::from_rgb_image(resized, self.index)
            }
            None => self.clone(),
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        let data = vec![0u8; 10]; // wrong size for 2x2x3
        Frame::new(data, 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 4, 3]); // (height, width, channels)
    }

    #[test]
    fn test_mirrored_reverses_each_row() {
        let frame = gradient_frame(3, 2);
        let mirrored = frame.mirrored();
        let arr = mirrored.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 2);
        assert_eq!(arr[[0, 2, 0]], 0);
        assert_eq!(arr[[1, 0, 1]], 1); // row identity preserved
    }

    #[test]
    fn test_mirrored_leaves_original_untouched() {
        let frame = gradient_frame(3, 1);
        let _ = frame.mirrored();
        assert_eq!(frame.as_ndarray()[[0, 0, 0]], 0);
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let frame = gradient_frame(5, 4);
        assert_eq!(frame.mirrored().mirrored().data(), frame.data());
    }

    #[test]
    fn test_scaled_dimensions() {
        let frame = gradient_frame(640, 480);
        let small = frame.scaled(0.4);
        assert_eq!(small.width(), 256);
        assert_eq!(small.height(), 192);
        assert_eq!(small.data().len(), 256 * 192 * 3);
    }

    #[test]
    fn test_scaled_never_collapses_to_zero() {
        let frame = gradient_frame(2, 2);
        let tiny = frame.scaled(0.01);
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
    }

    #[test]
    fn test_rgb_image_roundtrip_keeps_index() {
        let frame = Frame::new(vec![7u8; 12], 2, 2, 3, 9);
        let img = frame.into_rgb_image().unwrap();
        let back = Frame::from_rgb_image(img, 9);
        assert_eq!(back.index(), 9);
        assert_eq!(back.data(), &[7u8; 12]);
    }

    #[test]
    fn test_into_rgb_image_rejects_other_layouts() {
        let frame = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(frame.into_rgb_image().is_none());
    }
}
