use crate::error::AppError;
use crate::models::quiz_types::{AnswerOutcome, Difficulty, QuizQuestion};
use crate::services::labels::LabelSet;
use crate::services::quiz;
use crate::state::AppState;
use rand::Rng;
use std::path::Path;

/// One round of "guess the animal".
#[derive(Debug, Clone)]
pub struct QuizGame {
    animals: Vec<String>,
    index: usize,
    score: usize,
    current: Option<QuizQuestion>,
}

impl QuizGame {
    pub fn new<R: Rng + ?Sized>(labels: &LabelSet, count: usize, rng: &mut R) -> Result<Self, AppError> {
        Ok(Self {
            animals: quiz::pick_animals(labels, count, rng)?,
            index: 0,
            score: 0,
            current: None,
        })
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.animals.len()
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        self.current.as_ref()
    }

    /// Pose the question for the current animal.
    pub fn next_question<R: Rng + ?Sized>(
        &mut self,
        labels: &LabelSet,
        images_dir: &Path,
        rng: &mut R,
    ) -> Result<QuizQuestion, AppError> {
        let animal = self
            .animals
            .get(self.index)
            .cloned()
            .ok_or_else(|| AppError::Game("The game is already over".to_string()))?;

        let question = QuizQuestion {
            number: self.index + 1,
            total: self.animals.len(),
            image: quiz::pick_example_image(images_dir, &animal, rng),
            options: quiz::build_options(labels, &animal, rng)?,
            animal,
        };
        self.current = Some(question.clone());
        Ok(question)
    }

    /// Grade `selected` against the posed animal and move on. Returns whether it was right.
    fn grade(&mut self, selected: &str) -> Result<(bool, String), AppError> {
        let question = self
            .current
            .take()
            .ok_or_else(|| AppError::Game("No question has been asked".to_string()))?;
        let correct = selected == question.animal;
        if correct {
            self.score += 1;
        }
        self.index += 1;
        Ok((correct, question.animal))
    }
}

pub fn start_game(state: &AppState, difficulty: Difficulty) -> Result<QuizQuestion, AppError> {
    start_game_with_rng(state, difficulty.animal_count(), &mut rand::thread_rng())
}

pub fn start_game_with_rng<R: Rng + ?Sized>(
    state: &AppState,
    count: usize,
    rng: &mut R,
) -> Result<QuizQuestion, AppError> {
    let labels = state.require_labels()?;
    let mut game = QuizGame::new(labels, count, rng)?;
    let question = game.next_question(labels, &state.config.assets.animal_images_dir, rng)?;
    *lock_quiz(state) = Some(game);
    tracing::info!("Quiz started with {} animals", count);
    Ok(question)
}

pub fn current_question(state: &AppState) -> Option<QuizQuestion> {
    lock_quiz(state).as_ref().and_then(|g| g.current().cloned())
}

pub fn check_answer(state: &AppState, selected: &str) -> Result<AnswerOutcome, AppError> {
    check_answer_with_rng(state, selected, &mut rand::thread_rng())
}

/// A right answer unlocks the posed animal regardless of what the classifier thinks of it.
pub fn check_answer_with_rng<R: Rng + ?Sized>(
    state: &AppState,
    selected: &str,
    rng: &mut R,
) -> Result<AnswerOutcome, AppError> {
    let labels = state.require_labels()?;
    let mut quiz_guard = lock_quiz(state);
    let game = quiz_guard
        .as_mut()
        .ok_or_else(|| AppError::Game("No quiz in progress".to_string()))?;

    let (correct, correct_answer) = game.grade(selected)?;

    let mut persist_error = None;
    if correct {
        {
            let mut progress = state.progress();
            progress.stats.correct_guesses += 1;
            progress.unlock(&correct_answer);
        }
        persist_error = state.commit_progress(true).err().map(|e| e.to_string());
    }

    let finished = game.is_finished();
    let score = game.score();
    if finished {
        tracing::info!("Quiz finished with score {}", score);
    } else {
        game.next_question(labels, &state.config.assets.animal_images_dir, rng)?;
    }

    Ok(AnswerOutcome {
        correct,
        correct_answer,
        score,
        finished,
        persist_error,
    })
}

fn lock_quiz(state: &AppState) -> std::sync::MutexGuard<'_, Option<QuizGame>> {
    state.quiz.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
