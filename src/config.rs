//! Application settings.
//!
//! Defaults reproduce the file layout the recognizer has always used relative
//! to the working directory. A TOML file can override any subset of fields.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model and preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Serialized network (ONNX)
    pub model_path: PathBuf,
    /// Label file, one class per line
    pub class_names_path: PathBuf,
    /// Input height in pixels
    pub image_height: u32,
    /// Input width in pixels
    pub image_width: u32,
    /// Number of ranked predictions reported per image
    pub top_k: usize,
    /// Try GPU execution providers before falling back to CPU
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("output/model/best_model.onnx"),
            class_names_path: PathBuf::from("class.txt"),
            image_height: 456,
            image_width: 456,
            top_k: 3,
            use_gpu: false,
            intra_threads: 4,
        }
    }
}

impl ModelSettings {
    /// Shape the classifier expects: `[batch, height, width, channels]`.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.image_height as usize, self.image_width as usize, 3]
    }
}

/// Where user progress is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    pub unlocked_path: PathBuf,
    pub stats_path: PathBuf,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            unlocked_path: PathBuf::from("unlocked_animals.json"),
            stats_path: PathBuf::from("user_stats.json"),
        }
    }
}

/// Read-only asset directories used by the quiz and the zoo view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// `<dir>/<label>/*.jpg` example photos for quiz questions
    pub animal_images_dir: PathBuf,
    /// `<dir>/<label>_zoo.png` icons
    pub zoo_icons_dir: PathBuf,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            animal_images_dir: PathBuf::from("Animal"),
            zoo_icons_dir: PathBuf::from("zoo_icons"),
        }
    }
}

/// Batch prediction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub image_dir: PathBuf,
    pub output_csv: PathBuf,
    /// Preprocess images on the rayon pool
    pub parallel: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("test"),
            output_csv: PathBuf::from("predictions.csv"),
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelSettings,
    pub progress: ProgressSettings,
    pub assets: AssetSettings,
    pub batch: BatchSettings,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            AppError::Configuration(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Load `path` when given, otherwise fall back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.input_shape(), [1, 456, 456, 3]);
        assert_eq!(config.model.top_k, 3);
        assert_eq!(config.progress.unlocked_path, PathBuf::from("unlocked_animals.json"));
        assert_eq!(config.batch.output_csv, PathBuf::from("predictions.csv"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animal-lens.toml");
        std::fs::write(
            &path,
            "[model]\nimage_height = 224\nimage_width = 224\n\n[batch]\nparallel = true\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.model.input_shape(), [1, 224, 224, 3]);
        assert_eq!(config.model.class_names_path, PathBuf::from("class.txt"));
        assert!(config.batch.parallel);
        assert_eq!(config.assets.zoo_icons_dir, PathBuf::from("zoo_icons"));
    }

    #[test]
    fn test_missing_config_file_is_configuration_error() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
