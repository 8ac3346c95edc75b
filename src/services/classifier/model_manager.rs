use crate::config::ModelSettings;
use crate::error::AppError;
use crate::models::classify_types::ModelStatus;
use crate::services::classifier::extensions::{apply_layers, ExtensionRegistry, LayerExtension};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A loaded network: one input tensor in, one score per class out.
pub trait Classifier: Send {
    fn predict(&mut self, input: Array4<f32>) -> Result<Vec<f32>, AppError>;
}

/// Builds a [`Classifier`] from an artifact, resolving custom layers against `extensions`.
pub trait ModelLoader: Send + Sync {
    fn load(&self, extensions: &ExtensionRegistry) -> Result<Box<dyn Classifier>, AppError>;

    /// Whether the artifact is present at all.
    fn artifact_exists(&self) -> bool;
}

/// Sidecar manifest stored next to the ONNX file (`best_model.onnx` -> `best_model.json`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModelManifest {
    /// Custom layer names the graph was exported with
    pub custom_objects: Vec<String>,
    /// Apply softmax to the raw output (for graphs exported without their final activation)
    pub apply_softmax: bool,
}

impl ModelManifest {
    pub fn sidecar_path(model_path: &Path) -> PathBuf {
        model_path.with_extension("json")
    }

    /// A missing sidecar means the artifact needs no custom layers.
    pub fn load_for(model_path: &Path) -> Result<Self, AppError> {
        let path = Self::sidecar_path(model_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AppError::ModelLoad(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::ModelLoad(format!("Failed to parse manifest {}: {}", path.display(), e))
        })
    }
}

pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    layers: Vec<Arc<dyn LayerExtension>>,
    apply_softmax: bool,
}

impl Classifier for OnnxClassifier {
    fn predict(&mut self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let input = apply_layers(&self.layers, input)?;

        let input_tensor = Value::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| AppError::Inference(format!("Inference failed: {}", e)))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        let scores: Vec<f32> = data.iter().copied().collect();
        Ok(if self.apply_softmax { softmax(&scores) } else { scores })
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits.iter().map(|&x| (x - max_logit).exp() / exp_sum).collect()
}

/// Loads ONNX artifacts through ONNX Runtime.
pub struct OnnxLoader {
    pub model_path: PathBuf,
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl OnnxLoader {
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            model_path: settings.model_path.clone(),
            use_gpu: settings.use_gpu,
            intra_threads: settings.intra_threads,
        }
    }

    fn build_session(&self) -> Result<Session, AppError> {
        let _ = ort::init().with_name("animal-lens").commit();

        let mut builder = Session::builder()
            .map_err(|e| AppError::ModelLoad(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| AppError::ModelLoad(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(self.intra_threads)
            .map_err(|e| AppError::ModelLoad(format!("Failed to set intra threads: {}", e)))?;

        if self.use_gpu {
            builder = builder
                .with_execution_providers([
                    ort::ep::DirectML::default().build(),
                    ort::ep::CoreML::default().build(),
                    ort::ep::CUDA::default().build(),
                    ort::ep::CPU::default().build(),
                ])
                .map_err(|e| {
                    AppError::ModelLoad(format!("Failed to register GPU execution providers: {}", e))
                })?;
        } else {
            builder = builder
                .with_execution_providers([
                    ort::ep::CPU::default().build(),
                ])
                .map_err(|e| {
                    AppError::ModelLoad(format!("Failed to register CPU execution provider: {}", e))
                })?;
        }

        builder.commit_from_file(&self.model_path).map_err(|e| {
            AppError::ModelLoad(format!(
                "Failed to load ONNX model {}: {}",
                self.model_path.display(),
                e
            ))
        })
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, extensions: &ExtensionRegistry) -> Result<Box<dyn Classifier>, AppError> {
        if !self.model_path.exists() {
            return Err(AppError::ModelLoad(format!(
                "Model file not found: {}",
                self.model_path.display()
            )));
        }

        let manifest = ModelManifest::load_for(&self.model_path)?;
        // Resolve before touching the runtime so an unknown layer fails fast.
        let layers = extensions.resolve(&manifest.custom_objects)?;

        let session = self.build_session()?;
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| AppError::ModelLoad("Model declares no inputs".to_string()))?;

        Ok(Box::new(OnnxClassifier {
            session,
            input_name,
            layers,
            apply_softmax: manifest.apply_softmax,
        }))
    }

    fn artifact_exists(&self) -> bool {
        self.model_path.exists()
    }
}

struct LoadedModel {
    classifier: Box<dyn Classifier>,
    output_width: usize,
}

/// Owns the classifier: one-time load, finalize, status and lazy reload.
#[derive(Clone)]
pub struct ModelManager {
    loader: Arc<dyn ModelLoader>,
    extensions: Arc<ExtensionRegistry>,
    input_shape: [usize; 4],
    /// Label count the output width must match, when known
    expected_classes: Option<usize>,
    model: Arc<Mutex<Option<LoadedModel>>>,
    loading: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

impl ModelManager {
    pub fn new(
        loader: Arc<dyn ModelLoader>,
        extensions: ExtensionRegistry,
        input_shape: [usize; 4],
        expected_classes: Option<usize>,
    ) -> Self {
        Self {
            loader,
            extensions: Arc::new(extensions),
            input_shape,
            expected_classes,
            model: Arc::new(Mutex::new(None)),
            loading: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn onnx(settings: &ModelSettings, expected_classes: Option<usize>) -> Self {
        Self::new(
            Arc::new(OnnxLoader::from_settings(settings)),
            ExtensionRegistry::with_builtins(),
            settings.input_shape(),
            expected_classes,
        )
    }

    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    pub fn is_ready(&self) -> bool {
        self.model.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    pub fn get_error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    pub fn output_width(&self) -> Option<usize> {
        self.model
            .lock()
            .ok()
            .and_then(|m| m.as_ref().map(|loaded| loaded.output_width))
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            downloaded: self.loader.artifact_exists(),
            loading: self.is_loading(),
            ready: self.is_ready(),
            output_width: self.output_width(),
            error: self.get_error(),
        }
    }

    /// Load and finalize the classifier. A failure is logged, kept as the status error and returned.
    pub fn load_model(&self) -> Result<(), AppError> {
        if self.is_ready() {
            return Ok(());
        }
        if self.loading.swap(true, Ordering::AcqRel) {
            return Err(AppError::ModelLoad("Model is already loading".to_string()));
        }

        self.set_error(None);
        let start = Instant::now();
        let result = self.do_load_model();
        self.loading.store(false, Ordering::Release);

        match result {
            Ok(loaded) => {
                tracing::info!(
                    "Model loaded in {:?} ({} output classes)",
                    start.elapsed(),
                    loaded.output_width
                );
                let mut guard = self.lock_model()?;
                *guard = Some(loaded);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Model load failed: {}", e);
                self.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    fn do_load_model(&self) -> Result<LoadedModel, AppError> {
        let mut classifier = self.loader.load(&self.extensions)?;

        // Finalize: one warm-up pass fixes the output width before real input arrives.
        let [n, h, w, c] = self.input_shape;
        let probe = classifier
            .predict(Array4::zeros((n, h, w, c)))
            .map_err(|e| AppError::ModelLoad(format!("Warm-up inference failed: {}", e)))?;
        let output_width = probe.len();

        if let Some(expected) = self.expected_classes {
            if expected != output_width {
                return Err(AppError::ModelLoad(format!(
                    "Label set has {} classes but the model outputs {}",
                    expected, output_width
                )));
            }
        }

        Ok(LoadedModel {
            classifier,
            output_width,
        })
    }

    /// Run the classifier. An unloaded model gets exactly one reload attempt.
    pub fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        if input.shape() != &self.input_shape[..] {
            return Err(AppError::shape_mismatch(input.shape(), &self.input_shape));
        }

        if !self.is_ready() {
            tracing::warn!("Model not loaded, attempting reload");
            self.load_model()
                .map_err(|e| AppError::ModelUnavailable(e.to_string()))?;
        }

        let mut guard = self.lock_model()?;
        let loaded = guard
            .as_mut()
            .ok_or_else(|| AppError::ModelUnavailable("Model unloaded during inference".to_string()))?;

        let start = Instant::now();
        let scores = loaded.classifier.predict(input)?;
        tracing::debug!("forward costs: {:?}", start.elapsed());
        Ok(scores)
    }

    fn lock_model(&self) -> Result<std::sync::MutexGuard<'_, Option<LoadedModel>>, AppError> {
        self.model
            .lock()
            .map_err(|_| AppError::ModelUnavailable("Model lock poisoned".to_string()))
    }

    fn set_error(&self, message: Option<String>) {
        if let Ok(mut error) = self.error.lock() {
            *error = message;
        }
    }
}
