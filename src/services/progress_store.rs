use crate::config::ProgressSettings;
use crate::error::AppError;
use crate::models::progress_types::UserStats;
use crate::services::labels::LabelSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Flat JSON files holding the unlocked animals and the user statistics.
///
/// Single process, single user: no locking, the last write wins.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    unlocked_path: PathBuf,
    stats_path: PathBuf,
}

impl ProgressStore {
    pub fn new(unlocked_path: impl Into<PathBuf>, stats_path: impl Into<PathBuf>) -> Self {
        Self {
            unlocked_path: unlocked_path.into(),
            stats_path: stats_path.into(),
        }
    }

    pub fn from_settings(settings: &ProgressSettings) -> Self {
        Self::new(&settings.unlocked_path, &settings.stats_path)
    }

    /// Unlocked animals that still exist in `labels`. Missing or unreadable files give an empty set.
    pub fn load_unlocked(&self, labels: &LabelSet) -> BTreeSet<String> {
        let stored: Vec<String> = match read_json(&self.unlocked_path) {
            Ok(Some(list)) => list,
            Ok(None) => return BTreeSet::new(),
            Err(e) => {
                tracing::warn!("Failed to load unlocked animals: {}", e);
                return BTreeSet::new();
            }
        };

        let total = stored.len();
        let unlocked: BTreeSet<String> = stored
            .into_iter()
            .filter(|label| labels.contains(label))
            .collect();
        if unlocked.len() < total {
            tracing::warn!(
                "Dropped {} unknown or duplicate entries from {}",
                total - unlocked.len(),
                self.unlocked_path.display()
            );
        }
        tracing::info!("Loaded {} unlocked animals", unlocked.len());
        unlocked
    }

    pub fn save_unlocked(&self, unlocked: &BTreeSet<String>) -> Result<(), AppError> {
        let list: Vec<&String> = unlocked.iter().collect();
        write_json(&self.unlocked_path, &list)?;
        tracing::debug!("Saved {} unlocked animals", unlocked.len());
        Ok(())
    }

    /// Stored statistics, or a zero record when the file is missing or corrupt.
    pub fn load_stats(&self) -> UserStats {
        match read_json(&self.stats_path) {
            Ok(Some(stats)) => stats,
            Ok(None) => UserStats::default(),
            Err(e) => {
                tracing::warn!("Failed to load user stats: {}", e);
                UserStats::default()
            }
        }
    }

    pub fn save_stats(&self, stats: &UserStats) -> Result<(), AppError> {
        write_json(&self.stats_path, stats)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::Persistence {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| AppError::Persistence {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Write to a sibling temp file, then rename it over `path`.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let persist_err = |e: &dyn std::fmt::Display| AppError::Persistence {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let json = serde_json::to_string(value).map_err(|e| persist_err(&e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| persist_err(&e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, json).map_err(|e| persist_err(&e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        persist_err(&e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn labels() -> LabelSet {
        LabelSet::parse("cat\ndog\nfox\ntiger").unwrap()
    }

    fn store_in(dir: &Path) -> ProgressStore {
        ProgressStore::new(dir.join("unlocked_animals.json"), dir.join("user_stats.json"))
    }

    #[test]
    fn missing_files_give_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load_unlocked(&labels()).is_empty());
        assert_eq!(store.load_stats(), UserStats::default());
    }

    #[test]
    fn unlocked_set_survives_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let set: BTreeSet<String> = ["tiger", "cat"].iter().map(|s| s.to_string()).collect();
        store_in(dir.path()).save_unlocked(&set).unwrap();

        let reloaded = store_in(dir.path()).load_unlocked(&labels());
        assert_eq!(reloaded, set);
        assert!(!dir.path().join("unlocked_animals.json.tmp").exists());
    }

    #[test]
    fn unknown_labels_are_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("unlocked_animals.json"),
            r#"["dog", "unicorn", "dog", "fox"]"#,
        )
        .unwrap();

        let unlocked = store_in(dir.path()).load_unlocked(&labels());
        let names: Vec<&str> = unlocked.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["dog", "fox"]);
    }

    #[test]
    fn corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unlocked_animals.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("user_stats.json"), "[1, 2").unwrap();

        let store = store_in(dir.path());
        assert!(store.load_unlocked(&labels()).is_empty());
        assert_eq!(store.load_stats(), UserStats::default());
    }

    #[test]
    fn stats_round_trip_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let stats = UserStats {
            total_recognitions: 7,
            correct_guesses: 3,
            animals_unlocked: 2,
            last_played: NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|d| d.and_hms_opt(12, 30, 0)),
        };
        store.save_stats(&stats).unwrap();
        assert_eq!(store.load_stats(), stats);

        let raw = std::fs::read_to_string(dir.path().join("user_stats.json")).unwrap();
        assert!(raw.contains("\"last_played\":\"2024-05-01T12:30:00\""));
    }

    #[test]
    fn stats_written_by_older_versions_still_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("user_stats.json"),
            r#"{"total_recognitions": 4, "correct_guesses": 1, "animals_unlocked": 1, "last_played": "2024-03-09T08:15:42.123456"}"#,
        )
        .unwrap();
        let stats = store_in(dir.path()).load_stats();
        assert_eq!(stats.total_recognitions, 4);
        assert!(stats.last_played.is_some());

        std::fs::write(dir.path().join("user_stats.json"), r#"{"correct_guesses": 2}"#).unwrap();
        let stats = store_in(dir.path()).load_stats();
        assert_eq!(stats.correct_guesses, 2);
        assert_eq!(stats.last_played, None);
    }

    #[test]
    fn save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let store = ProgressStore::new(blocker.join("unlocked.json"), blocker.join("stats.json"));

        let err = store.save_stats(&UserStats::default()).unwrap_err();
        assert!(matches!(err, AppError::Persistence { .. }));
    }
}
