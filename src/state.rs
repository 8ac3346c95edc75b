use crate::commands::quiz::QuizGame;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::progress_types::ProgressState;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::labels::LabelSet;
use crate::services::progress_store::ProgressStore;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything the front end drives: labels, classifier, progress and the running quiz.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub labels: Arc<LabelSet>,
    pub model_manager: ModelManager,
    pub store: ProgressStore,
    /// Why the label file could not be used, if it could not
    pub labels_error: Option<String>,
    progress: Arc<Mutex<ProgressState>>,
    pub(crate) recognition_in_flight: Arc<AtomicBool>,
    pub(crate) quiz: Arc<Mutex<Option<QuizGame>>>,
}

impl AppState {
    /// Build the session from `config`. Missing labels degrade to an empty set with an error noted.
    pub fn initialize(config: AppConfig) -> Self {
        let (labels, labels_error) = match LabelSet::load(&config.model.class_names_path) {
            Ok(labels) => (labels, None),
            Err(e) => {
                tracing::error!("{}", e);
                (LabelSet::default(), Some(e.to_string()))
            }
        };
        let expected = (!labels.is_empty()).then_some(labels.len());
        let model_manager = ModelManager::onnx(&config.model, expected);
        let store = ProgressStore::from_settings(&config.progress);
        Self::with_parts(config, labels, model_manager, store, labels_error)
    }

    pub fn with_parts(
        config: AppConfig,
        labels: LabelSet,
        model_manager: ModelManager,
        store: ProgressStore,
        labels_error: Option<String>,
    ) -> Self {
        let mut progress = ProgressState {
            unlocked: store.load_unlocked(&labels),
            stats: store.load_stats(),
        };
        progress.stats.animals_unlocked = progress.unlocked.len() as u64;

        Self {
            config: Arc::new(config),
            labels: Arc::new(labels),
            model_manager,
            store,
            labels_error,
            progress: Arc::new(Mutex::new(progress)),
            recognition_in_flight: Arc::new(AtomicBool::new(false)),
            quiz: Arc::new(Mutex::new(None)),
        }
    }

    pub fn require_labels(&self) -> Result<&LabelSet, AppError> {
        if self.labels.is_empty() {
            return Err(AppError::Configuration(
                self.labels_error
                    .clone()
                    .unwrap_or_else(|| "No class names loaded".to_string()),
            ));
        }
        Ok(&self.labels)
    }

    pub(crate) fn progress(&self) -> MutexGuard<'_, ProgressState> {
        // Progress stays usable even if a worker panicked mid-update.
        self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn progress_snapshot(&self) -> ProgressState {
        self.progress().clone()
    }

    /// Stamp and write the current progress. Memory stays authoritative when a write fails.
    pub fn commit_progress(&self, save_unlocked: bool) -> Result<(), AppError> {
        let snapshot = {
            let mut progress = self.progress();
            progress.touch(chrono::Local::now().naive_local());
            progress.clone()
        };

        let mut result = Ok(());
        if save_unlocked {
            if let Err(e) = self.store.save_unlocked(&snapshot.unlocked) {
                tracing::error!("{}", e);
                result = Err(e);
            }
        }
        if let Err(e) = self.store.save_stats(&snapshot.stats) {
            tracing::error!("{}", e);
            result = result.and(Err(e));
        }
        result
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::state_in;
    use super::*;
    use crate::services::classifier::testing::FakeLoader;

    #[test]
    fn startup_drops_unknown_unlocked_labels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unlocked_animals.json"), r#"["fox", "dragon"]"#).unwrap();
        std::fs::write(dir.path().join("user_stats.json"), r#"{"animals_unlocked": 9}"#).unwrap();

        let state = state_in(dir.path(), FakeLoader::returning(vec![0.0; 6]));
        let progress = state.progress_snapshot();
        assert_eq!(progress.unlocked.len(), 1);
        assert_eq!(progress.stats.animals_unlocked, 1);
    }

    #[test]
    fn commit_stamps_last_played() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path(), FakeLoader::returning(vec![0.0; 6]));
        state.progress().unlock("owl");

        state.commit_progress(true).unwrap();
        let stats = state.store.load_stats();
        assert_eq!(stats.animals_unlocked, 1);
        assert!(stats.last_played.is_some());
        assert!(state.store.load_unlocked(&state.labels).contains("owl"));
    }

    #[test]
    fn failed_commit_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        let state = super::test_support::unsavable_state_in(dir.path(), FakeLoader::returning(vec![0.0; 6]));
        state.progress().unlock("owl");

        assert!(matches!(
            state.commit_progress(true),
            Err(AppError::Persistence { .. })
        ));
        let progress = state.progress_snapshot();
        assert!(progress.is_unlocked("owl"));
        assert!(progress.stats.last_played.is_some());
    }

    #[test]
    fn missing_label_file_degrades_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.model.class_names_path = dir.path().join("class.txt");
        config.progress.unlocked_path = dir.path().join("unlocked_animals.json");
        config.progress.stats_path = dir.path().join("user_stats.json");

        let state = AppState::initialize(config);
        assert!(state.labels.is_empty());
        assert!(state.labels_error.is_some());
        assert!(matches!(state.require_labels(), Err(AppError::Configuration(_))));
    }
}
