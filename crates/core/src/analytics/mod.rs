pub mod emotion_history;
