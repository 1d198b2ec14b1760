use std::path::PathBuf;

use clap::Parser;

use emotion_cam_core::detection::infrastructure::detector_factory::DetectorKind;
use emotion_cam_core::session::session_config::SessionConfig;
use emotion_cam_core::shared::constants::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use emotion_cam_core::text::infrastructure::gemini_text_analyzer::DEFAULT_GEMINI_MODEL;

/// Streams the annotated camera feed and serves emotion analytics over HTTP.
#[derive(Parser, Debug)]
#[command(name = "emotion-cam")]
pub struct Cli {
    /// Address to bind.
    #[arg(long, env = "EMOTION_CAM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "EMOTION_CAM_PORT", default_value = "8000")]
    pub port: u16,

    /// Camera indices to try, in order (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "0,1")]
    pub devices: Vec<u32>,

    /// Requested capture width.
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    pub width: u32,

    /// Requested capture height.
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    pub height: u32,

    /// Emotion detector: mock or onnx.
    #[arg(long, default_value = "mock")]
    pub detector: String,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.25")]
    pub confidence: f64,

    /// Directory searched for bundled ONNX models before downloading.
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Frame source: camera or synthetic.
    #[arg(long, default_value = "camera")]
    pub source: String,

    /// TTF font used for the emotion label instead of the bundled one.
    #[arg(long)]
    pub overlay_font: Option<PathBuf>,

    /// API key for text emotion analysis.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Model used for text emotion analysis.
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,
}

impl Cli {
    pub fn detector_kind(&self) -> DetectorKind {
        if self.detector == "onnx" {
            DetectorKind::Onnx
        } else {
            DetectorKind::Mock
        }
    }

    pub fn uses_synthetic_source(&self) -> bool {
        self.source == "synthetic"
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            device_indices: self.devices.clone(),
            frame_width: self.width,
            frame_height: self.height,
            ..SessionConfig::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.devices.is_empty() {
        return Err("At least one camera index is required".into());
    }
    if cli.width == 0 || cli.height == 0 {
        return Err(format!(
            "Resolution must be positive, got {}x{}",
            cli.width, cli.height
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.detector != "mock" && cli.detector != "onnx" {
        return Err(format!(
            "Detector must be 'mock' or 'onnx', got '{}'",
            cli.detector
        )
        .into());
    }
    if cli.source != "camera" && cli.source != "synthetic" {
        return Err(format!(
            "Source must be 'camera' or 'synthetic', got '{}'",
            cli.source
        )
        .into());
    }
    if let Some(font) = &cli.overlay_font {
        if !font.exists() {
            return Err(format!("Overlay font not found: {}", font.display()).into());
        }
    }
    Ok(())
}
