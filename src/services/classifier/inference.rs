use crate::error::AppError;
use crate::models::classify_types::Prediction;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::labels::LabelSet;
use image::{DynamicImage, ImageReader};
use ndarray::Array4;
use std::path::Path;

pub fn decode_image(path: &Path) -> Result<DynamicImage, AppError> {
    let decode_err = |message: String| AppError::ImageDecode {
        path: path.to_path_buf(),
        message,
    };

    ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))
}

/// Convert to RGB, stretch to `width x height` and scale into `[1, H, W, 3]` floats in [0, 1].
pub fn image_to_tensor(img: &DynamicImage, height: u32, width: u32) -> Result<Array4<f32>, AppError> {
    // Channel conversion happens before resizing: alpha is dropped, grey is replicated.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let resized = rgb.resize_exact(width, height, image::imageops::FilterType::CatmullRom);
    let rgb = resized.to_rgb8();
    let (w, h) = rgb.dimensions();

    let data: Vec<f32> = rgb.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();

    Array4::from_shape_vec((1, h as usize, w as usize, 3), data)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}

pub fn preprocess_image(path: &Path, height: u32, width: u32) -> Result<Array4<f32>, AppError> {
    let img = decode_image(path)?;
    image_to_tensor(&img, height, width)
}

/// Refuse any tensor that is not exactly `expected`.
pub fn validate_shape(tensor: &Array4<f32>, expected: [usize; 4]) -> Result<(), AppError> {
    if tensor.shape() != &expected[..] {
        return Err(AppError::shape_mismatch(tensor.shape(), &expected));
    }
    Ok(())
}

/// Top `k` predictions, highest confidence first. Equal confidences keep output order.
pub fn rank(probabilities: &[f32], labels: &LabelSet, k: usize) -> Vec<Prediction> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    // NaN ranks below every real score; sort_by is stable, so ties stay in ascending index order
    let key = |v: f32| if v.is_nan() { f32::NEG_INFINITY } else { v };
    indexed.sort_by(|a, b| key(b.1).total_cmp(&key(a.1)));

    let top_k = k.min(labels.len()).min(indexed.len());
    indexed[..top_k]
        .iter()
        .map(|&(idx, conf)| Prediction {
            class_name: labels.name_or_index(idx),
            confidence: conf,
            index: idx,
        })
        .collect()
}

/// The label a recognition may unlock: the top prediction, when it names a real class.
pub fn top1_unlock_candidate<'a>(predictions: &[Prediction], labels: &'a LabelSet) -> Option<&'a str> {
    predictions.first().and_then(|p| labels.get(p.index))
}

/// Normalize, validate, predict and rank one image.
pub fn classify_image(
    manager: &ModelManager,
    path: &Path,
    labels: &LabelSet,
    top_k: usize,
) -> Result<Vec<Prediction>, AppError> {
    let [_, height, width, _] = manager.input_shape();
    let tensor = preprocess_image(path, height as u32, width as u32)?;
    classify_tensor(manager, tensor, labels, top_k)
}

pub fn classify_tensor(
    manager: &ModelManager,
    tensor: Array4<f32>,
    labels: &LabelSet,
    top_k: usize,
) -> Result<Vec<Prediction>, AppError> {
    validate_shape(&tensor, manager.input_shape())?;
    let probabilities = manager.predict(tensor)?;
    Ok(rank(&probabilities, labels, top_k))
}
