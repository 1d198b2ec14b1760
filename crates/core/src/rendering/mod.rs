pub mod jpeg_encoder;
pub mod overlay;
