pub mod text_analyzer;
