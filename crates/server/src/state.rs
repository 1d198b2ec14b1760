use std::sync::Arc;

use emotion_cam_core::session::camera_session::CameraSession;
use emotion_cam_core::text::analyze_text_use_case::AnalyzeTextUseCase;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<CameraSession>,
    pub text: Arc<AnalyzeTextUseCase>,
}

impl AppState {
    pub fn new(session: CameraSession, text: AnalyzeTextUseCase) -> Self {
        Self {
            session: Arc::new(session),
            text: Arc::new(text),
        }
    }
}
