use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn animal_count(&self) -> usize {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 20,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct QuizQuestion {
    /// 1-based position in the game
    pub number: usize,
    pub total: usize,
    pub animal: String,
    /// Example photo of `animal`, when one exists
    pub image: Option<PathBuf>,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
    pub score: usize,
    pub finished: bool,
    pub persist_error: Option<String>,
}
