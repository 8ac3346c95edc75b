//! Custom layers a serialized model may refer to by name.
//!
//! The training graph wraps its input in a cast-to-float32 layer. Artifacts
//! exported from it list that layer in their manifest, and loading fails
//! unless a behaviour is registered under the same name.

use crate::error::AppError;
use ndarray::Array4;
use std::collections::HashMap;
use std::sync::Arc;

pub const CAST_TO_FLOAT32: &str = "cast_to_float32";

/// Behaviour applied to the input tensor before it reaches the network.
pub trait LayerExtension: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, input: Array4<f32>) -> Result<Array4<f32>, AppError>;
}

/// Element-wise cast to `f32`.
///
/// Tensors built by the normalizer are already `f32`, so values pass through
/// unchanged; non-finite values are rejected since no cast yields them.
pub struct CastToFloat32;

impl LayerExtension for CastToFloat32 {
    fn name(&self) -> &str {
        CAST_TO_FLOAT32
    }

    fn apply(&self, input: Array4<f32>) -> Result<Array4<f32>, AppError> {
        if input.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Inference(format!(
                "{}: input contains non-finite values",
                CAST_TO_FLOAT32
            )));
        }
        Ok(input)
    }
}

#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    entries: HashMap<String, Arc<dyn LayerExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the layers every exported artifact may use.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CastToFloat32));
        registry
    }

    pub fn register(&mut self, extension: Arc<dyn LayerExtension>) {
        self.entries.insert(extension.name().to_string(), extension);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up every name, in order. The first unknown name fails the whole resolution.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn LayerExtension>>, AppError> {
        names
            .iter()
            .map(|name| {
                self.entries.get(name).cloned().ok_or_else(|| {
                    AppError::ModelLoad(format!(
                        "Unknown custom layer '{}' (registered: {})",
                        name,
                        self.names().join(", ")
                    ))
                })
            })
            .collect()
    }
}

/// Run `input` through `layers` in declaration order.
pub fn apply_layers(
    layers: &[Arc<dyn LayerExtension>],
    input: Array4<f32>,
) -> Result<Array4<f32>, AppError> {
    layers.iter().try_fold(input, |tensor, layer| layer.apply(tensor))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invert;

    impl LayerExtension for Invert {
        fn name(&self) -> &str {
            "invert"
        }

        fn apply(&self, input: Array4<f32>) -> Result<Array4<f32>, AppError> {
            Ok(input.mapv(|v| 1.0 - v))
        }
    }

    #[test]
    fn builtins_contain_cast() {
        let registry = ExtensionRegistry::with_builtins();
        assert!(registry.contains(CAST_TO_FLOAT32));
        assert_eq!(registry.names(), vec![CAST_TO_FLOAT32]);
    }

    #[test]
    fn unknown_name_fails_resolution() {
        let registry = ExtensionRegistry::with_builtins();
        let err = registry
            .resolve(&[CAST_TO_FLOAT32.to_string(), "swish".to_string()])
            .err()
            .unwrap();
        match err {
            AppError::ModelLoad(msg) => assert!(msg.contains("swish")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn layers_apply_in_order() {
        let mut registry = ExtensionRegistry::with_builtins();
        registry.register(Arc::new(Invert));
        let layers = registry
            .resolve(&[CAST_TO_FLOAT32.to_string(), "invert".to_string()])
            .unwrap();

        let input = Array4::from_elem((1, 2, 2, 3), 0.25f32);
        let output = apply_layers(&layers, input).unwrap();
        assert!(output.iter().all(|&v| (v - 0.75).abs() < 1e-6));
    }

    #[test]
    fn cast_rejects_non_finite_values() {
        let mut input = Array4::zeros((1, 1, 1, 3));
        input[[0, 0, 0, 1]] = f32::NAN;
        assert!(CastToFloat32.apply(input).is_err());
    }
}
