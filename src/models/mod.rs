pub mod classify_types;
pub mod progress_types;
pub mod quiz_types;
