use crate::error::AppError;
use crate::services::fs_service;
use crate::services::labels::LabelSet;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

pub const OPTION_COUNT: usize = 4;

/// `count` distinct animals in random order.
pub fn pick_animals<R: Rng + ?Sized>(
    labels: &LabelSet,
    count: usize,
    rng: &mut R,
) -> Result<Vec<String>, AppError> {
    if labels.len() < count {
        return Err(AppError::Game(format!(
            "Not enough animal classes: need {}, have {}",
            count,
            labels.len()
        )));
    }
    Ok(labels
        .as_slice()
        .choose_multiple(rng, count)
        .cloned()
        .collect())
}

/// The correct answer plus three distinct wrong ones, shuffled.
pub fn build_options<R: Rng + ?Sized>(
    labels: &LabelSet,
    answer: &str,
    rng: &mut R,
) -> Result<Vec<String>, AppError> {
    if labels.len() < OPTION_COUNT {
        return Err(AppError::Game(format!(
            "Not enough animal classes to build {} options",
            OPTION_COUNT
        )));
    }

    let wrong: Vec<&String> = labels.as_slice().iter().filter(|l| *l != answer).collect();
    let mut options: Vec<String> = wrong
        .choose_multiple(rng, OPTION_COUNT - 1)
        .map(|l| l.to_string())
        .collect();
    options.push(answer.to_string());
    options.shuffle(rng);
    Ok(options)
}

/// A random example photo from `<images_dir>/<animal>/`, if any.
pub fn pick_example_image<R: Rng + ?Sized>(
    images_dir: &Path,
    animal: &str,
    rng: &mut R,
) -> Option<PathBuf> {
    let candidates = fs_service::list_image_files(&images_dir.join(animal));
    if candidates.is_empty() {
        tracing::warn!("No example images for {} under {}", animal, images_dir.display());
    }
    candidates.choose(rng).cloned()
}
