use std::sync::Arc;

use super::camera_session::CameraSession;
use super::error::CameraError;

/// A consumer's registration with the camera, released on drop.
///
/// Whatever ends the consumer (client gone, explicit stop, panic while
/// streaming), the release runs exactly once.
pub struct CameraLease {
    session: Arc<CameraSession>,
    generation: u64,
}

impl CameraLease {
    pub fn session(&self) -> &CameraSession {
        &self.session
    }

    /// False once capture stops or `stop_streams` ran after this lease was
    /// taken, even if a newer consumer has switched capture back on.
    pub fn is_streaming(&self) -> bool {
        self.session.is_streaming(self.generation)
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.session.release();
    }
}

impl CameraSession {
    /// Acquires the camera and ties the registration to the returned guard.
    pub fn lease(self: &Arc<Self>) -> Result<CameraLease, CameraError> {
        let generation = self.register()?;
        Ok(CameraLease {
            session: Arc::clone(self),
            generation,
        })
    }
}
