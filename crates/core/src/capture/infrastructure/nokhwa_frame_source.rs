use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use crate::capture::domain::frame_source::{CameraDevice, CaptureError, FrameSource};
use crate::shared::frame::Frame;

/// Consecutive failed grabs after which the device is considered unplugged.
const MAX_CONSECUTIVE_GRAB_FAILURES: u32 = 30;

/// Opens local webcams through `nokhwa`'s native backend
/// (V4L2, AVFoundation or Media Foundation depending on the platform).
#[derive(Default)]
pub struct NokhwaFrameSource;

impl NokhwaFrameSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for NokhwaFrameSource {
    fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let open_err = |e: nokhwa::NokhwaError| CaptureError::Open {
            index,
            reason: e.to_string(),
        };

        let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(open_err)?;
        camera.open_stream().map_err(open_err)?;

        log::debug!("Opened {} at index {index}", camera.info().human_name());
        Ok(Box::new(NokhwaCameraDevice {
            camera,
            index,
            failed_grabs: 0,
            released: false,
        }))
    }
}

pub struct NokhwaCameraDevice {
    camera: Camera,
    index: u32,
    failed_grabs: u32,
    released: bool,
}

// Safety: the device is moved into the capture thread right after opening
// and is only touched by one thread at a time from then on.
unsafe impl Send for NokhwaCameraDevice {}

impl CameraDevice for NokhwaCameraDevice {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        self.camera
            .set_resolution(Resolution::new(width, height))
            .map_err(|e| CaptureError::Configure {
                width,
                height,
                reason: e.to_string(),
            })?;
        let actual = self.camera.resolution();
        log::info!(
            "Camera {} streaming at {}x{} @ {} fps",
            self.index,
            actual.width(),
            actual.height(),
            self.camera.frame_rate()
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.released && self.camera.is_stream_open()
    }

    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                self.failed_grabs += 1;
                if self.failed_grabs >= MAX_CONSECUTIVE_GRAB_FAILURES {
                    return Err(CaptureError::Disconnected(e.to_string()));
                }
                log::debug!("Frame grab failed on camera {}: {e}", self.index);
                return Ok(None);
            }
        };
        self.failed_grabs = 0;

        match buffer.decode_image::<RgbFormat>() {
            Ok(decoded) => {
                let (width, height) = (decoded.width(), decoded.height());
                Ok(Some(Frame::new(decoded.into_raw(), width, height, 3, 0)))
            }
            Err(e) => {
                log::debug!("Frame decode failed on camera {}: {e}", self.index);
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera {} stream: {e}", self.index);
        }
    }
}

impl Drop for NokhwaCameraDevice {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires actual webcam hardware
    fn test_open_and_read_frame() {
        let source = NokhwaFrameSource::new();
        let mut device = source.open(0).expect("failed to open webcam");
        device.configure(640, 480).expect("failed to configure");
        assert!(device.is_open());

        let frame = (0..10).find_map(|_| device.read().ok().flatten());
        let frame = frame.expect("no frame within 10 grabs");
        assert!(frame.width() > 0 && frame.height() > 0);

        device.release();
        assert!(!device.is_open());
    }

    #[test]
    #[ignore] // Requires no webcam at a high index
    fn test_open_missing_index_fails() {
        let source = NokhwaFrameSource::new();
        assert!(matches!(source.open(63), Err(CaptureError::Open { index: 63, .. })));
    }
}
