use std::time::Duration;

use crate::capture::domain::frame_source::{CameraDevice, CaptureError, FrameSource};
use crate::shared::constants::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::shared::frame::Frame;

/// Side of the bright square that drifts across synthetic frames.
const MARKER_SIZE: u32 = 48;
/// Horizontal marker movement per frame, in pixels.
const MARKER_STEP: u32 = 6;

/// Camera-less frame source producing a moving test pattern.
///
/// Used for demos on machines without a webcam and for exercising the
/// session end to end in tests.
#[derive(Clone, Debug)]
pub struct SyntheticFrameSource {
    available: Vec<u32>,
    frame_delay: Duration,
}

impl SyntheticFrameSource {
    /// Source where only index 0 exists, producing frames as fast as asked.
    pub fn new() -> Self {
        Self {
            available: vec![0],
            frame_delay: Duration::ZERO,
        }
    }

    /// Restricts which indices open successfully.
    pub fn with_available(mut self, indices: &[u32]) -> Self {
        self.available = indices.to_vec();
        self
    }

    /// Simulates a device frame rate by sleeping in `read`.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }
}

impl Default for SyntheticFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticFrameSource {
    fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CaptureError> {
        if !self.available.contains(&index) {
            return Err(CaptureError::Open {
                index,
                reason: "no synthetic device at this index".into(),
            });
        }
        Ok(Box::new(SyntheticCameraDevice {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            tick: 0,
            open: true,
            frame_delay: self.frame_delay,
        }))
    }
}

struct SyntheticCameraDevice {
    width: u32,
    height: u32,
    tick: u32,
    open: bool,
    frame_delay: Duration,
}

impl CameraDevice for SyntheticCameraDevice {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::Configure {
                width,
                height,
                reason: "zero-sized frames are not supported".into(),
            });
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Disconnected("device released".into()));
        }
        if !self.frame_delay.is_zero() {
            std::thread::sleep(self.frame_delay);
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(Some(render_pattern(self.width, self.height, self.tick)))
    }

    fn release(&mut self) {
        self.open = false;
    }
}

/// Diagonal gradient with a white square moving left to right.
fn render_pattern(width: u32, height: u32, tick: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    let marker = MARKER_SIZE.min(width).min(height);
    let travel = (width - marker).max(1);
    let marker_x = (tick * MARKER_STEP) % travel;
    let marker_y = (height - marker) / 2;

    for y in 0..height {
        for x in 0..width {
            let in_marker = x >= marker_x
                && x < marker_x + marker
                && y >= marker_y
                && y < marker_y + marker;
            if in_marker {
                data.extend_from_slice(&[255, 255, 255]);
            } else {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                let b = (tick % 256) as u8;
                data.extend_from_slice(&[r, g, b]);
            }
        }
    }
    Frame::new(data, width, height, 3, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_index_fails_to_open() {
        let source = SyntheticFrameSource::new().with_available(&[1]);
        assert!(matches!(
            source.open(0),
            Err(CaptureError::Open { index: 0, .. })
        ));
        assert!(source.open(1).is_ok());
    }

    #[test]
    fn test_frames_follow_configured_size() {
        let source = SyntheticFrameSource::new();
        let mut device = source.open(0).unwrap();
        device.configure(64, 32).unwrap();

        let frame = device.read().unwrap().unwrap();

        assert_eq!((frame.width(), frame.height()), (64, 32));
        assert_eq!(frame.data().len(), 64 * 32 * 3);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let mut device = SyntheticFrameSource::new().open(0).unwrap();
        assert!(device.configure(0, 10).is_err());
    }

    #[test]
    fn test_consecutive_frames_differ() {
        let mut device = SyntheticFrameSource::new().open(0).unwrap();
        device.configure(80, 60).unwrap();
        let a = device.read().unwrap().unwrap();
        let b = device.read().unwrap().unwrap();
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn test_release_closes_device() {
        let mut device = SyntheticFrameSource::new().open(0).unwrap();
        device.release();
        assert!(!device.is_open());
        assert!(device.read().is_err());
    }

    #[test]
    fn test_tiny_frames_do_not_panic() {
        let frame = render_pattern(1, 1, 7);
        assert_eq!(frame.data().len(), 3);
    }
}
