pub mod camera_session;
pub mod error;
pub mod lease;
pub mod session_config;
