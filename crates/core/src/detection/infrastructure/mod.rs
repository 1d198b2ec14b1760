pub mod detector_factory;
pub mod ferplus_classifier;
pub mod mock_emotion_detector;
pub mod onnx_emotion_detector;
pub mod onnx_session;
pub mod yolo_face_locator;
