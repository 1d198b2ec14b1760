//! Reference-counted access to the single physical camera.
//!
//! Every streaming client calls [`CameraSession::acquire`] before reading
//! and [`CameraSession::release`] when it stops. The first consumer opens
//! the device and starts the capture loop, later ones attach to it, and the
//! last one out stops the loop and frees the hardware.
//!
//! Two locks are involved, always taken in this order:
//! - `lifecycle` serializes acquire/release transitions and owns the capture
//!   loop (and through it the device). It is held across blocking device
//!   work, so only transitions wait on it.
//! - `state` is the short-lived lock shared with the capture loop and every
//!   frame reader. It is never held across device I/O, inference or encoding.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::analytics::emotion_history::{EmotionAnalytics, HistoryEntry};
use crate::capture::capture_loop::{CaptureLoop, FrameSlot};
use crate::capture::domain::frame_source::{CameraDevice, FrameSource};
use crate::detection::domain::detection::{primary_face, Detection, DetectionSummary};
use crate::detection::domain::emotion_detector::EmotionDetector;
use crate::rendering::jpeg_encoder::JpegFrameEncoder;
use crate::rendering::overlay::OverlayRenderer;
use crate::shared::constants::NEUTRAL_EMOTION;
use crate::shared::frame::Frame;

use super::error::CameraError;
use super::session_config::SessionConfig;

/// One encoded frame ready to stream, plus what was detected on it.
#[derive(Clone, Debug)]
pub struct StreamFrame {
    pub jpeg: Vec<u8>,
    pub summary: Option<DetectionSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CurrentEmotion {
    pub emotion: String,
    pub score: f64,
}

pub struct CameraSession {
    config: SessionConfig,
    source: Box<dyn FrameSource>,
    detector: Mutex<Box<dyn EmotionDetector>>,
    renderer: OverlayRenderer,
    encoder: JpegFrameEncoder,
    lifecycle: Mutex<DeviceLifecycle>,
    state: Arc<Mutex<SessionState>>,
}

#[derive(Default)]
struct DeviceLifecycle {
    capture: Option<CaptureLoop>,
    last_release: Option<Instant>,
}

impl DeviceLifecycle {
    fn cooldown_remaining(&self, cooldown: Duration) -> Duration {
        self.last_release
            .map(|at| cooldown.saturating_sub(at.elapsed()))
            .unwrap_or(Duration::ZERO)
    }
}

struct SessionState {
    active_users: usize,
    capture_enabled: bool,
    device_attached: bool,
    /// Set by the capture loop when the device failed mid-session.
    disconnected: bool,
    /// Bumped by every `stop_streams`; streams from older generations end.
    stop_generation: u64,
    latest_frame: Option<Arc<Frame>>,
    frame_valid: bool,
    frame_counter: u64,
    last_detections: Vec<Detection>,
    last_emotion: String,
    last_score: f64,
    history: Vec<HistoryEntry>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            active_users: 0,
            capture_enabled: false,
            device_attached: false,
            disconnected: false,
            stop_generation: 0,
            latest_frame: None,
            frame_valid: false,
            frame_counter: 0,
            last_detections: Vec::new(),
            last_emotion: NEUTRAL_EMOTION.to_string(),
            last_score: 0.0,
            history: Vec::new(),
        }
    }
}

impl FrameSlot for SessionState {
    fn store_frame(&mut self, frame: Option<Frame>) {
        match frame {
            Some(frame) => {
                self.latest_frame = Some(Arc::new(frame));
                self.frame_valid = true;
            }
            None => self.frame_valid = false,
        }
    }

    fn mark_disconnected(&mut self) {
        self.disconnected = true;
        self.capture_enabled = false;
        self.frame_valid = false;
    }
}

impl CameraSession {
    pub fn new(
        config: SessionConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn EmotionDetector>,
    ) -> Self {
        let encoder = JpegFrameEncoder::new(config.jpeg_quality);
        Self {
            config,
            source,
            detector: Mutex::new(detector),
            renderer: OverlayRenderer::new(),
            encoder,
            lifecycle: Mutex::new(DeviceLifecycle::default()),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Replaces the default box-only overlay (e.g. one with a label font).
    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registers a consumer, opening the camera if nobody else holds it.
    ///
    /// Blocks for the rest of the cooldown window when called shortly after
    /// the camera was released. On error the consumer is not counted.
    pub fn acquire(&self) -> Result<(), CameraError> {
        self.register().map(|_| ())
    }

    /// [`acquire`](Self::acquire), returning the stop generation the new
    /// consumer belongs to.
    pub(super) fn register(&self) -> Result<u64, CameraError> {
        let mut lifecycle = self.lifecycle_after_reaping();

        let (users, generation, was_enabled) = {
            let mut state = self.lock_state();
            let was_enabled = state.capture_enabled;
            state.active_users += 1;
            state.capture_enabled = true;
            (state.active_users, state.stop_generation, was_enabled)
        };

        if lifecycle.capture.is_some() {
            log::info!("Attaching to existing stream (users: {users})");
            return Ok(generation);
        }

        log::info!("Initializing camera hardware (users: {users})");
        match self.start_capture() {
            Ok(capture) => {
                lifecycle.capture = Some(capture);
                // Consumers that raced this one wait on the lifecycle lock,
                // so they attach only after the driver has settled.
                std::thread::sleep(self.config.stabilization_delay);
                Ok(generation)
            }
            Err(e) => {
                let mut state = self.lock_state();
                state.active_users = state.active_users.saturating_sub(1);
                // Consumers left over from a disconnected device must still
                // see capture disabled so their streams end.
                state.capture_enabled = was_enabled && state.active_users > 0;
                Err(e)
            }
        }
    }

    /// Unregisters a consumer; the last one out stops capture and frees the
    /// camera. Returns only after the hardware is released.
    ///
    /// Extra calls with no consumers registered are ignored.
    pub fn release(&self) {
        std::thread::sleep(self.config.release_grace);

        let mut lifecycle = lock(&self.lifecycle);
        {
            let mut state = self.lock_state();
            if state.active_users == 0 {
                log::debug!("Release with no active consumers ignored");
                return;
            }
            state.active_users -= 1;
            log::info!("Consumer disconnected (remaining: {})", state.active_users);
            if state.active_users > 0 {
                return;
            }
            state.capture_enabled = false;
        }

        let Some(capture) = lifecycle.capture.take() else {
            return;
        };
        log::info!("Releasing camera hardware");
        self.shut_down(capture);
        lifecycle.last_release = Some(Instant::now());
        log::info!("Camera hardware released");
    }

    /// Ends every active stream. Each streaming consumer notices on its next
    /// read and releases its own registration.
    pub fn stop_streams(&self) {
        let mut state = self.lock_state();
        if state.capture_enabled {
            log::info!("Stopping {} active stream(s)", state.active_users);
        }
        state.capture_enabled = false;
        state.stop_generation += 1;
    }

    /// True while consumers registered in `generation` should keep
    /// streaming: capture is on and no stop was issued since they joined.
    pub fn is_streaming(&self, generation: u64) -> bool {
        let state = self.lock_state();
        state.capture_enabled && state.stop_generation == generation
    }

    /// Produces the next mirrored, annotated and encoded frame.
    ///
    /// Returns `None` while capture is disabled or before the first good
    /// frame arrives; those calls have no side effects.
    pub fn read_frame(&self) -> Option<StreamFrame> {
        let (snapshot, run_detection) = {
            let mut state = self.lock_state();
            if !state.capture_enabled || !state.device_attached || !state.frame_valid {
                return None;
            }
            let snapshot = state.latest_frame.clone()?;
            state.frame_counter += 1;
            let interval = self.config.detection_interval.max(1);
            (snapshot, state.frame_counter % interval == 0)
        };

        let frame = snapshot.mirrored();

        let fresh_detections = run_detection.then(|| match self.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("Emotion detection failed: {e}");
                Vec::new()
            }
        });

        let summary = {
            let mut state = self.lock_state();
            if let Some(detections) = fresh_detections {
                state.last_detections = detections;
            }
            let summary = primary_face(&state.last_detections).and_then(Detection::summarize);
            if let Some(s) = &summary {
                state.last_emotion = s.emotion.clone();
                state.last_score = s.score;
                state.history.push(HistoryEntry::now(s.emotion.clone(), s.score));
            }
            summary
        };

        let frame = match &summary {
            Some(s) => self.renderer.render(frame, s),
            None => frame,
        };

        match self.encoder.encode(&frame) {
            Ok(jpeg) => Some(StreamFrame { jpeg, summary }),
            Err(e) => {
                log::warn!("Failed to encode frame {}: {e}", frame.index());
                None
            }
        }
    }

    pub fn current_emotion(&self) -> CurrentEmotion {
        let state = self.lock_state();
        CurrentEmotion {
            emotion: state.last_emotion.clone(),
            score: state.last_score,
        }
    }

    pub fn analytics(&self) -> EmotionAnalytics {
        let state = self.lock_state();
        EmotionAnalytics::from_entries(&state.history, self.config.recent_history_len)
    }

    pub fn active_users(&self) -> usize {
        self.lock_state().active_users
    }

    pub fn is_capture_enabled(&self) -> bool {
        self.lock_state().capture_enabled
    }

    pub fn is_device_attached(&self) -> bool {
        self.lock_state().device_attached
    }

    /// Takes the lifecycle lock with no dead capture loop attached.
    ///
    /// A loop whose device failed is torn down like a full release, so the
    /// reopen that follows honours the cooldown too.
    fn lifecycle_after_reaping(&self) -> MutexGuard<'_, DeviceLifecycle> {
        loop {
            let mut lifecycle = self.lifecycle_after_cooldown();
            if lifecycle.capture.is_none() || !self.lock_state().disconnected {
                return lifecycle;
            }
            log::warn!("Camera was disconnected, reopening after cooldown");
            if let Some(capture) = lifecycle.capture.take() {
                self.shut_down(capture);
                lifecycle.last_release = Some(Instant::now());
            }
        }
    }

    /// Takes the lifecycle lock once the post-release cooldown has passed.
    ///
    /// The wait happens without any lock held, so a concurrent release or
    /// frame read is never blocked by a throttled acquire.
    fn lifecycle_after_cooldown(&self) -> MutexGuard<'_, DeviceLifecycle> {
        loop {
            let lifecycle = lock(&self.lifecycle);
            let remaining = lifecycle.cooldown_remaining(self.config.release_cooldown);
            if remaining.is_zero() {
                return lifecycle;
            }
            drop(lifecycle);
            log::info!(
                "Throttling camera reopen (cooldown: {:.1}s)",
                remaining.as_secs_f64()
            );
            std::thread::sleep(remaining);
        }
    }

    fn start_capture(&self) -> Result<CaptureLoop, CameraError> {
        let (device, index) = self.open_device()?;

        {
            let mut state = self.lock_state();
            state.latest_frame = None;
            state.frame_valid = false;
            state.disconnected = false;
            state.device_attached = true;
        }

        let timing = self.config.capture_timing();
        CaptureLoop::spawn(device, index, self.state.clone(), timing).map_err(|e| {
            self.lock_state().device_attached = false;
            CameraError::CaptureThread(e)
        })
    }

    fn open_device(&self) -> Result<(Box<dyn CameraDevice>, u32), CameraError> {
        for &index in &self.config.device_indices {
            match self.source.open(index) {
                Ok(mut device) => {
                    if let Err(e) =
                        device.configure(self.config.frame_width, self.config.frame_height)
                    {
                        log::warn!("{e}; keeping the driver's default resolution");
                    }
                    log::info!("Camera active on index {index}");
                    return Ok((device, index));
                }
                Err(e) => log::debug!("{e}"),
            }
        }
        log::error!("No camera available (tried {:?})", self.config.device_indices);
        Err(CameraError::DeviceUnavailable {
            tried: self.config.device_indices.clone(),
        })
    }

    /// Stops the loop, then frees the device it hands back.
    fn shut_down(&self, capture: CaptureLoop) {
        let index = capture.device_index();
        match capture.stop() {
            Some(mut device) => device.release(),
            None => log::error!("Capture thread for camera {index} panicked"),
        }
        let mut state = self.lock_state();
        state.device_attached = false;
        state.disconnected = false;
        state.latest_frame = None;
        state.frame_valid = false;
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let scale = self.config.detection_scale;
        let small = frame.scaled(scale);
        let detections = lock(&self.detector).detect(&small)?;
        Ok(detections.iter().map(|d| d.rescaled(1.0 / scale)).collect())
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
