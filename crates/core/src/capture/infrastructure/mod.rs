pub mod nokhwa_frame_source;
pub mod synthetic_frame_source;
