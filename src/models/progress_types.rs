use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Persisted counters. Every field defaults so older or partial files still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub total_recognitions: u64,
    pub correct_guesses: u64,
    pub animals_unlocked: u64,
    pub last_played: Option<NaiveDateTime>,
}

/// Session-wide progress: the unlocked animals and the counters derived from play.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub unlocked: BTreeSet<String>,
    pub stats: UserStats,
}

impl ProgressState {
    /// Returns `true` when `label` was not unlocked before.
    pub fn unlock(&mut self, label: &str) -> bool {
        if self.unlocked.contains(label) {
            return false;
        }
        self.unlocked.insert(label.to_string());
        self.stats.animals_unlocked = self.unlocked.len() as u64;
        true
    }

    pub fn is_unlocked(&self, label: &str) -> bool {
        self.unlocked.contains(label)
    }

    /// Stamp the stats the way every save does.
    pub fn touch(&mut self, now: NaiveDateTime) {
        self.stats.animals_unlocked = self.unlocked.len() as u64;
        self.stats.last_played = Some(now);
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ZooEntry {
    pub name: String,
    pub unlocked: bool,
    pub icon: Option<PathBuf>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ZooSummary {
    pub unlocked: usize,
    pub total: usize,
    pub percent: f32,
    pub entries: Vec<ZooEntry>,
}
