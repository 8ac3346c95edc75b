use crate::error::AppError;
use std::collections::HashSet;
use std::path::Path;

/// Ordered class names. Position `i` names output `i` of the classifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, AppError> {
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(AppError::Configuration(format!(
                    "Duplicate class name in label set: {}",
                    label
                )));
            }
        }
        Ok(Self { labels })
    }

    /// One label per line; surrounding whitespace is trimmed and blank lines skipped.
    pub fn parse(content: &str) -> Result<Self, AppError> {
        let labels = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(labels)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!(
                "Failed to read class names file {}: {}",
                path.display(),
                e
            ))
        })?;
        let labels = Self::parse(&content)?;
        tracing::info!("Loaded {} class names from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Name for classifier output `index`, or the index itself when the set is too short.
    pub fn name_or_index(&self, index: usize) -> String {
        self.get(index)
            .map(str::to_string)
            .unwrap_or_else(|| index.to_string())
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
