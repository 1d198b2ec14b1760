use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera {index} could not be opened: {reason}")]
    Open { index: u32, reason: String },
    #[error("camera rejected {width}x{height}: {reason}")]
    Configure {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("camera disconnected: {0}")]
    Disconnected(String),
}

/// Opens physical camera devices by index.
///
/// Shared between request threads, so implementations must be `Sync`; the
/// devices they hand out are owned by exactly one capture thread at a time.
pub trait FrameSource: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CaptureError>;
}

/// An opened camera device.
pub trait CameraDevice: Send {
    /// Requests a capture resolution. Drivers may pick the closest mode.
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CaptureError>;

    fn is_open(&self) -> bool;

    /// Blocks until the next frame is available.
    ///
    /// `Ok(None)` is a transient grab failure; `Err` means the device is gone.
    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Stops streaming and frees the hardware.
    ///
    /// Devices dropped without an explicit release must free the hardware
    /// as well.
    fn release(&mut self);
}
