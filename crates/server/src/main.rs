mod config;
mod routes;
mod state;

use std::process;
use std::time::Duration;

use clap::Parser;

use emotion_cam_core::capture::domain::frame_source::FrameSource;
use emotion_cam_core::capture::infrastructure::nokhwa_frame_source::NokhwaFrameSource;
use emotion_cam_core::capture::infrastructure::synthetic_frame_source::SyntheticFrameSource;
use emotion_cam_core::detection::infrastructure::detector_factory::create_detector;
use emotion_cam_core::rendering::overlay::OverlayRenderer;
use emotion_cam_core::session::camera_session::CameraSession;
use emotion_cam_core::text::analyze_text_use_case::AnalyzeTextUseCase;
use emotion_cam_core::text::domain::text_analyzer::TextEmotionAnalyzer;
use emotion_cam_core::text::infrastructure::gemini_text_analyzer::GeminiTextAnalyzer;

use crate::config::{validate, Cli};
use crate::state::AppState;

/// Synthetic frames are paced like a 30 fps webcam.
const SYNTHETIC_FRAME_DELAY: Duration = Duration::from_millis(33);

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let session = build_session(&cli)?;
    let text = build_text_analysis(&cli);
    let app = routes::router(AppState::new(session, text));
    let address = cli.bind_address();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&address).await?;
        log::info!("Listening on http://{address}");
        axum::serve(listener, app).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn build_session(cli: &Cli) -> Result<CameraSession, Box<dyn std::error::Error>> {
    let source: Box<dyn FrameSource> = if cli.uses_synthetic_source() {
        log::info!("Using synthetic frame source");
        Box::new(
            SyntheticFrameSource::new()
                .with_available(&cli.devices)
                .with_frame_delay(SYNTHETIC_FRAME_DELAY),
        )
    } else {
        Box::new(NokhwaFrameSource::new())
    };

    let detector = create_detector(cli.detector_kind(), cli.confidence, cli.models_dir.clone());
    let session = CameraSession::new(cli.session_config(), source, detector);

    match &cli.overlay_font {
        Some(path) => {
            log::info!("Labelling faces with {}", path.display());
            Ok(session.with_renderer(OverlayRenderer::from_font_file(path)?))
        }
        None => Ok(session),
    }
}

fn build_text_analysis(cli: &Cli) -> AnalyzeTextUseCase {
    let analyzer = cli
        .gemini_api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .map(|key| {
            Box::new(GeminiTextAnalyzer::new(key, cli.gemini_model.as_str()))
                as Box<dyn TextEmotionAnalyzer>
        });
    AnalyzeTextUseCase::new(analyzer)
}
