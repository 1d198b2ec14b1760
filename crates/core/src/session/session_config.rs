use std::time::Duration;

use crate::capture::capture_loop::CaptureTiming;
use crate::shared::constants::{
    CAPTURE_IDLE_RETRY, CAPTURE_INTERVAL, DEFAULT_DEVICE_INDICES, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_WIDTH, DETECTION_INTERVAL, DETECTION_SCALE, JPEG_QUALITY, RECENT_HISTORY_LEN,
    RELEASE_COOLDOWN, RELEASE_GRACE, STABILIZATION_DELAY,
};

/// Tunables for a [`CameraSession`](super::camera_session::CameraSession).
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Indices tried in order; the first that opens wins.
    pub device_indices: Vec<u32>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub release_cooldown: Duration,
    pub stabilization_delay: Duration,
    pub release_grace: Duration,
    pub capture_interval: Duration,
    pub capture_idle_retry: Duration,
    /// Detection runs on every Nth served frame.
    pub detection_interval: u64,
    pub detection_scale: f64,
    pub jpeg_quality: u8,
    pub recent_history_len: usize,
}

impl SessionConfig {
    pub fn capture_timing(&self) -> CaptureTiming {
        CaptureTiming {
            interval: self.capture_interval,
            idle_retry: self.capture_idle_retry,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_indices: DEFAULT_DEVICE_INDICES.to_vec(),
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            release_cooldown: RELEASE_COOLDOWN,
            stabilization_delay: STABILIZATION_DELAY,
            release_grace: RELEASE_GRACE,
            capture_interval: CAPTURE_INTERVAL,
            capture_idle_retry: CAPTURE_IDLE_RETRY,
            detection_interval: DETECTION_INTERVAL,
            detection_scale: DETECTION_SCALE,
            jpeg_quality: JPEG_QUALITY,
            recent_history_len: RECENT_HISTORY_LEN,
        }
    }
}
