use std::sync::Arc;
use std::time::Duration;

use crate::session::camera_session::CameraSession;
use crate::session::error::CameraError;
use crate::session::lease::CameraLease;
use crate::shared::constants::STREAM_IDLE_WAIT;

pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wraps one JPEG as a part of the `boundary=frame` multipart stream.
pub fn multipart_chunk(jpeg: &[u8]) -> Vec<u8> {
    const HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    const TRAILER: &[u8] = b"\r\n\r\n";
    let mut chunk = Vec::with_capacity(HEADER.len() + jpeg.len() + TRAILER.len());
    chunk.extend_from_slice(HEADER);
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(TRAILER);
    chunk
}

/// Where a stream's multipart chunks go (usually an HTTP response body).
pub trait ChunkSink {
    /// Delivers a chunk, blocking for backpressure. False once the
    /// receiving side is gone.
    fn send(&mut self, chunk: Vec<u8>) -> bool;

    /// Lets the streamer notice a departed client while no frames flow.
    fn is_closed(&self) -> bool;
}

/// Pumps frames from the session to one client until capture stops or the
/// client leaves. Holds a lease for its whole lifetime.
pub struct MjpegStreamer {
    lease: CameraLease,
    idle_wait: Duration,
}

impl MjpegStreamer {
    /// Registers with the camera. Fails when no device can be opened.
    pub fn start(session: &Arc<CameraSession>) -> Result<Self, CameraError> {
        Ok(Self {
            lease: session.lease()?,
            idle_wait: STREAM_IDLE_WAIT,
        })
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Streams until the session stops capturing or the sink closes, then
    /// releases the camera. Returns the number of frames delivered.
    pub fn run(self, sink: &mut dyn ChunkSink) -> usize {
        log::info!("Stream started");
        let session = self.lease.session();
        let mut delivered = 0;

        while self.lease.is_streaming() && !sink.is_closed() {
            match session.read_frame() {
                Some(frame) => {
                    if !sink.send(multipart_chunk(&frame.jpeg)) {
                        break;
                    }
                    delivered += 1;
                }
                None => std::thread::sleep(self.idle_wait),
            }
        }

        log::info!("Stream stopped after {delivered} frames");
        delivered
    }
}
