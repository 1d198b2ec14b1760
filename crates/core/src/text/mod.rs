pub mod analyze_text_use_case;
pub mod domain;
pub mod infrastructure;
