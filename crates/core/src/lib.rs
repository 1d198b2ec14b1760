pub mod analytics;
pub mod capture;
pub mod detection;
pub mod rendering;
pub mod session;
pub mod shared;
pub mod streaming;
pub mod text;
