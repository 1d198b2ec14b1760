use std::time::Duration;

pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMOTION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const EMOTION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// Label reported when nothing has been detected yet.
pub const NEUTRAL_EMOTION: &str = "Neutral";

/// Camera indices tried in order when opening the device.
pub const DEFAULT_DEVICE_INDICES: &[u32] = &[0, 1];
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Minimum gap between a full release and the next open (driver stabilization).
pub const RELEASE_COOLDOWN: Duration = Duration::from_millis(1000);
/// Pause after opening the device before the first consumer reads.
pub const STABILIZATION_DELAY: Duration = Duration::from_millis(300);
/// Lets an in-flight `read_frame` finish before a consumer detaches.
pub const RELEASE_GRACE: Duration = Duration::from_millis(50);
/// Capture loop pacing between device reads.
pub const CAPTURE_INTERVAL: Duration = Duration::from_millis(5);
/// Capture loop back-off while the device reports not open.
pub const CAPTURE_IDLE_RETRY: Duration = Duration::from_millis(100);
/// Streaming consumers back off this long when no frame is ready.
pub const STREAM_IDLE_WAIT: Duration = Duration::from_millis(100);

/// Run detection on one of every N frames served.
pub const DETECTION_INTERVAL: u64 = 7;
/// Frames are downsampled by this factor before detection.
pub const DETECTION_SCALE: f64 = 0.4;
pub const JPEG_QUALITY: u8 = 70;
/// Number of labels returned as `recent` by the analytics endpoint.
pub const RECENT_HISTORY_LEN: usize = 20;
