//! In-process stand-ins for the network, shared by unit tests.

use crate::error::AppError;
use crate::services::classifier::extensions::ExtensionRegistry;
use crate::services::classifier::model_manager::{Classifier, ModelLoader, ModelManager};
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Loader whose classifier returns canned scores.
pub struct FakeLoader {
    scores: Vec<f32>,
    failures_left: AtomicUsize,
    load_calls: Arc<AtomicUsize>,
    predict_calls: Arc<AtomicUsize>,
}

impl FakeLoader {
    pub fn returning(scores: Vec<f32>) -> Self {
        Self {
            scores,
            failures_left: AtomicUsize::new(0),
            load_calls: Arc::new(AtomicUsize::new(0)),
            predict_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The first `n` loads fail.
    pub fn failing_loads(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn load_calls(&self) -> Arc<AtomicUsize> {
        self.load_calls.clone()
    }

    pub fn predict_calls(&self) -> Arc<AtomicUsize> {
        self.predict_calls.clone()
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, _extensions: &ExtensionRegistry) -> Result<Box<dyn Classifier>, AppError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(AppError::ModelLoad("fake artifact is corrupt".to_string()));
        }
        Ok(Box::new(FakeClassifier {
            scores: self.scores.clone(),
            predict_calls: self.predict_calls.clone(),
        }))
    }

    fn artifact_exists(&self) -> bool {
        true
    }
}

struct FakeClassifier {
    scores: Vec<f32>,
    predict_calls: Arc<AtomicUsize>,
}

impl Classifier for FakeClassifier {
    fn predict(&mut self, _input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }
}

pub fn fixed_manager(loader: FakeLoader, input_shape: [usize; 4], classes: usize) -> ModelManager {
    ModelManager::new(
        Arc::new(loader),
        ExtensionRegistry::with_builtins(),
        input_shape,
        Some(classes),
    )
}
