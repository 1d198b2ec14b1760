pub mod gemini_text_analyzer;
