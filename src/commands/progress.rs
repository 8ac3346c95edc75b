use crate::error::AppError;
use crate::models::progress_types::{UserStats, ZooEntry, ZooSummary};
use crate::state::AppState;

pub fn get_user_stats(state: &AppState) -> UserStats {
    state.progress().stats.clone()
}

/// Every known animal with its unlock state and zoo icon, in label order.
pub fn get_zoo_summary(state: &AppState) -> ZooSummary {
    let progress = state.progress_snapshot();
    let icons_dir = &state.config.assets.zoo_icons_dir;

    let entries: Vec<ZooEntry> = state
        .labels
        .iter()
        .map(|name| {
            let icon = icons_dir.join(format!("{}_zoo.png", name));
            ZooEntry {
                name: name.to_string(),
                unlocked: progress.is_unlocked(name),
                icon: icon.is_file().then_some(icon),
            }
        })
        .collect();

    let total = entries.len();
    let unlocked = entries.iter().filter(|e| e.unlocked).count();
    let percent = if total == 0 {
        0.0
    } else {
        unlocked as f32 / total as f32 * 100.0
    };

    ZooSummary {
        unlocked,
        total,
        percent,
        entries,
    }
}

/// Forget every unlocked animal and zero the counters, on disk as well.
pub fn reset_progress(state: &AppState) -> Result<(), AppError> {
    {
        let mut progress = state.progress();
        progress.unlocked.clear();
        progress.stats = UserStats::default();
    }
    tracing::info!("Progress reset");
    state.commit_progress(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::testing::FakeLoader;
    use crate::state::test_support::state_in;

    #[test]
    fn zoo_summary_reports_unlocks_and_icons() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("zoo_icons")).unwrap();
        std::fs::write(dir.path().join("zoo_icons/fox_zoo.png"), b"x").unwrap();
        std::fs::write(dir.path().join("unlocked_animals.json"), r#"["fox", "owl"]"#).unwrap();

        let state = state_in(dir.path(), FakeLoader::returning(vec![0.0; 6]));
        let zoo = get_zoo_summary(&state);

        assert_eq!(zoo.total, 6);
        assert_eq!(zoo.unlocked, 2);
        assert!((zoo.percent - 33.333).abs() < 0.01);
        let fox = zoo.entries.iter().find(|e| e.name == "fox").unwrap();
        assert!(fox.unlocked);
        assert_eq!(fox.icon, Some(dir.path().join("zoo_icons/fox_zoo.png")));
        let cat = zoo.entries.iter().find(|e| e.name == "cat").unwrap();
        assert!(!cat.unlocked);
        assert_eq!(cat.icon, None);
    }

    #[test]
    fn reset_clears_memory_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unlocked_animals.json"), r#"["fox"]"#).unwrap();
        std::fs::write(
            dir.path().join("user_stats.json"),
            r#"{"total_recognitions": 12, "correct_guesses": 4}"#,
        )
        .unwrap();
        let state = state_in(dir.path(), FakeLoader::returning(vec![0.0; 6]));
        assert_eq!(get_user_stats(&state).total_recognitions, 12);

        reset_progress(&state).unwrap();

        assert_eq!(get_user_stats(&state).total_recognitions, 0);
        assert!(state.store.load_unlocked(&state.labels).is_empty());
        assert_eq!(state.store.load_stats().correct_guesses, 0);
    }
}
