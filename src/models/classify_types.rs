use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub loading: bool,
    pub ready: bool,
    /// Number of classes the loaded model scores
    pub output_width: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
    /// Position in the classifier output
    pub index: usize,
}

/// Outcome of one interactive recognition.
#[derive(Debug, Serialize, Clone)]
pub struct RecognitionOutcome {
    pub file_path: PathBuf,
    pub predictions: Vec<Prediction>,
    /// Set when this recognition added its top-1 label to the unlocked set
    pub newly_unlocked: Option<String>,
    /// Progress could not be written; the in-memory state still holds it
    pub persist_error: Option<String>,
}

/// One line of the batch report. `error` is set when the image could not be classified.
#[derive(Debug, Serialize, Clone)]
pub struct BatchRow {
    pub file_path: PathBuf,
    pub predictions: Vec<Prediction>,
    pub error: Option<String>,
}

impl BatchRow {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct BatchSummary {
    pub total: usize,
    pub failed: usize,
    pub rows: Vec<BatchRow>,
}
