//! HTTP endpoints: the MJPEG feed, camera control and emotion queries.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;

use emotion_cam_core::streaming::mjpeg_stream::{ChunkSink, MjpegStreamer, MJPEG_CONTENT_TYPE};

use crate::state::AppState;

/// Encoded frames buffered per client before the streamer blocks.
const STREAM_BUFFER: usize = 4;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/video_feed", get(video_feed))
        .route("/stop_camera", post(stop_camera))
        .route("/analytics", get(analytics))
        .route("/current_emotion", get(current_emotion))
        .route("/analyze_text", post(analyze_text))
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{method} {path} -> {} ({:?})",
        response.status(),
        started.elapsed()
    );
    response
}

async fn serve_root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Emotion AI Backend Running" }))
}

/// Streams the annotated feed as `multipart/x-mixed-replace`.
///
/// Registration and streaming both block on the camera, so they run off the
/// async workers; the stream thread owns the lease and releases it when the
/// client disconnects or the camera is stopped.
async fn video_feed(State(state): State<AppState>) -> Response {
    let session = Arc::clone(&state.session);
    let started = tokio::task::spawn_blocking(move || MjpegStreamer::start(&session)).await;
    let streamer = match started {
        Ok(Ok(streamer)) => streamer,
        Ok(Err(e)) => {
            log::error!("Could not start camera: {e}");
            return camera_unavailable();
        }
        Err(e) => {
            log::error!("Camera start task failed: {e}");
            return camera_unavailable();
        }
    };

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let spawned = std::thread::Builder::new()
        .name("mjpeg-stream".into())
        .spawn(move || {
            let mut sink = ChannelSink { tx };
            streamer.run(&mut sink);
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn stream thread: {e}");
        return camera_unavailable();
    }

    (
        [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

fn camera_unavailable() -> Response {
    Json(serde_json::json!({ "error": "Could not start camera" })).into_response()
}

/// Forwards multipart chunks to the response body.
struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
}

impl ChunkSink for ChannelSink {
    fn send(&mut self, chunk: Vec<u8>) -> bool {
        self.tx.blocking_send(Ok(Bytes::from(chunk))).is_ok()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn stop_camera(State(state): State<AppState>) -> impl IntoResponse {
    state.session.stop_streams();
    Json(serde_json::json!({ "message": "Camera session ended" }))
}

async fn analytics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.analytics())
}

async fn current_emotion(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.current_emotion())
}

#[derive(Deserialize)]
struct AnalyzeTextRequest {
    text: String,
}

async fn analyze_text(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeTextRequest>,
) -> Response {
    let text = Arc::clone(&state.text);
    match tokio::task::spawn_blocking(move || text.execute(&request.text)).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            log::error!("Text analysis task failed: {e}");
            Json(serde_json::json!({
                "emotion": "Neutral",
                "score": 0.0,
                "breakdown": {},
                "error": e.to_string(),
            }))
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::to_bytes;
    use axum::http::{Method, Request, StatusCode};
    use tokio_stream::StreamExt;
    use tower::ServiceExt;

    use emotion_cam_core::capture::infrastructure::synthetic_frame_source::SyntheticFrameSource;
    use emotion_cam_core::detection::infrastructure::mock_emotion_detector::MockEmotionDetector;
    use emotion_cam_core::session::camera_session::CameraSession;
    use emotion_cam_core::session::session_config::SessionConfig;
    use emotion_cam_core::text::analyze_text_use_case::AnalyzeTextUseCase;

    fn test_state(available: &[u32]) -> AppState {
        let config = SessionConfig {
            frame_width: 64,
            frame_height: 48,
            stabilization_delay: Duration::ZERO,
            release_grace: Duration::ZERO,
            release_cooldown: Duration::ZERO,
            capture_interval: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let session = CameraSession::new(
            config,
            Box::new(SyntheticFrameSource::new().with_available(available)),
            Box::new(MockEmotionDetector::seeded(7)),
        );
        AppState::new(session, AnalyzeTextUseCase::new(None))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let response = router(test_state(&[0]))
            .oneshot(get_request("/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["message"],
            "Emotion AI Backend Running"
        );
    }

    #[tokio::test]
    async fn test_current_emotion_defaults_to_neutral() {
        let response = router(test_state(&[0]))
            .oneshot(get_request("/current_emotion"))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["emotion"], "Neutral");
        assert_eq!(json["score"], 0.0);
    }

    #[tokio::test]
    async fn test_analytics_empty_before_streaming() {
        let response = router(test_state(&[0]))
            .oneshot(get_request("/analytics"))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["total_frames"], 0);
        assert_eq!(json["recent"], serde_json::json!([]));
        assert_eq!(json["distribution"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_stop_camera_acknowledges() {
        let state = test_state(&[0]);
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/stop_camera")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(json_body(response).await["message"], "Camera session ended");
        assert!(!state.session.is_capture_enabled());
    }

    #[tokio::test]
    async fn test_analyze_text_without_key_is_neutral() {
        let response = router(test_state(&[0]))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/analyze_text")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"text": "I love this"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["emotion"], "Neutral");
        assert_eq!(json["score"], 0.5);
        assert_eq!(json["breakdown"], serde_json::json!({}));
        assert_eq!(json["error"], "Gemini API Key Not Configured");
    }

    #[tokio::test]
    async fn test_video_feed_without_camera_reports_error() {
        let state = test_state(&[]);
        let response = router(state.clone())
            .oneshot(get_request("/video_feed"))
            .await
            .unwrap();

        assert_eq!(
            json_body(response).await["error"],
            "Could not start camera"
        );
        assert_eq!(state.session.active_users(), 0);
    }

    #[tokio::test]
    async fn test_video_feed_streams_then_releases_on_disconnect() {
        let state = test_state(&[0]);
        let response = router(state.clone())
            .oneshot(get_request("/video_feed"))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            MJPEG_CONTENT_TYPE
        );
        assert_eq!(state.session.active_users(), 1);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));

        drop(body);
        for _ in 0..200 {
            if state.session.active_users() == 0 && !state.session.is_device_attached() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.session.active_users(), 0);
        assert!(!state.session.is_device_attached());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let response = router(test_state(&[0]))
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
