use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera could be opened (tried indices {tried:?})")]
    DeviceUnavailable { tried: Vec<u32> },
    #[error("failed to start capture thread: {0}")]
    CaptureThread(#[source] std::io::Error),
}
