use crate::error::AppError;
use crate::models::classify_types::{BatchRow, BatchSummary};
use crate::services::classifier::inference;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::labels::LabelSet;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const REPORT_TOP_K: usize = 3;
const PROGRESS_EVERY: usize = 10;
const ERROR_MARKER: &str = "ERROR";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Classify every file in `image_paths`. A file that fails becomes an error row; the batch goes on.
pub fn classify_files(
    manager: &ModelManager,
    labels: &LabelSet,
    image_paths: &[PathBuf],
    parallel: bool,
) -> BatchSummary {
    let total = image_paths.len();
    let done = AtomicUsize::new(0);
    let start_time = Instant::now();

    let classify_one = |img_path: &PathBuf| -> BatchRow {
        let row = match inference::classify_image(manager, img_path, labels, REPORT_TOP_K) {
            Ok(predictions) => BatchRow {
                file_path: img_path.clone(),
                predictions,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Failed to classify {}: {}", img_path.display(), e);
                BatchRow {
                    file_path: img_path.clone(),
                    predictions: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        let count = done.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_EVERY == 0 || count == total {
            tracing::info!(
                "Processed {}/{} images ({:.1}s)",
                count,
                total,
                start_time.elapsed().as_secs_f64()
            );
        }
        row
    };

    // collect() keeps discovery order in both modes
    let rows: Vec<BatchRow> = if parallel {
        image_paths.par_iter().map(classify_one).collect()
    } else {
        image_paths.iter().map(classify_one).collect()
    };

    let failed = rows.iter().filter(|r| r.is_error()).count();
    BatchSummary { total, failed, rows }
}

const HEADER: [&str; 10] = [
    "file_path",
    "predicted_class",
    "confidence",
    "top1_class",
    "top1_confidence",
    "top2_class",
    "top2_confidence",
    "top3_class",
    "top3_confidence",
    "error",
];

fn record(row: &BatchRow) -> Vec<String> {
    let mut fields = Vec::with_capacity(HEADER.len());
    fields.push(row.file_path.to_string_lossy().to_string());

    match (&row.error, row.predictions.first()) {
        (Some(_), _) => {
            fields.push(ERROR_MARKER.to_string());
            fields.push(String::new());
        }
        (None, Some(top)) => {
            fields.push(top.class_name.clone());
            fields.push(top.confidence.to_string());
        }
        (None, None) => {
            fields.push(String::new());
            fields.push(String::new());
        }
    }

    for i in 0..REPORT_TOP_K {
        match row.predictions.get(i) {
            Some(p) => {
                fields.push(p.class_name.clone());
                fields.push(p.confidence.to_string());
            }
            None => {
                fields.push(String::new());
                fields.push(String::new());
            }
        }
    }

    fields.push(row.error.clone().unwrap_or_default());
    fields
}

/// Write rows as CSV, UTF-8 with a BOM so spreadsheet tools pick the right encoding.
pub fn write_report<W: Write>(mut out: W, rows: &[BatchRow]) -> Result<(), AppError> {
    out.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(record(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report_file(path: &Path, rows: &[BatchRow]) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path).map_err(|e| AppError::Persistence {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_report(std::io::BufWriter::new(file), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::testing::{fixed_manager, FakeLoader};
    use crate::services::fs_service;
    use image::{Rgb, RgbImage};

    fn labels() -> LabelSet {
        LabelSet::parse("cat\ndog\nfox").unwrap()
    }

    fn write_images(dir: &Path, corrupt_index: usize) -> Vec<PathBuf> {
        (1..=5)
            .map(|i| {
                let path = dir.join(format!("{}.png", i));
                if i == corrupt_index {
                    std::fs::write(&path, b"this is not a png").unwrap();
                } else {
                    RgbImage::from_pixel(6, 6, Rgb([i as u8 * 10, 0, 0])).save(&path).unwrap();
                }
                path
            })
            .collect()
    }

    #[test]
    fn corrupt_file_becomes_error_row() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), 3);
        let files = fs_service::list_image_files_recursive(dir.path()).unwrap();
        let manager = fixed_manager(FakeLoader::returning(vec![0.1, 0.7, 0.2]), [1, 8, 8, 3], 3);

        let summary = classify_files(&manager, &labels(), &files, false);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rows.len(), 5);
        for (i, row) in summary.rows.iter().enumerate() {
            if i == 2 {
                assert!(row.is_error());
                assert!(row.predictions.is_empty());
            } else {
                assert!(!row.is_error());
                assert_eq!(row.predictions[0].class_name, "dog");
                assert_eq!(row.predictions.len(), 3);
            }
        }
    }

    #[test]
    fn parallel_mode_keeps_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 0);
        let manager = fixed_manager(FakeLoader::returning(vec![0.5, 0.2, 0.3]), [1, 8, 8, 3], 3);

        let summary = classify_files(&manager, &labels(), &files, true);
        let paths: Vec<&PathBuf> = summary.rows.iter().map(|r| &r.file_path).collect();
        assert_eq!(paths, files.iter().collect::<Vec<_>>());
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn unavailable_model_marks_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 0);
        let loader = FakeLoader::returning(vec![1.0, 0.0, 0.0]).failing_loads(usize::MAX);
        let manager = fixed_manager(loader, [1, 8, 8, 3], 3);

        let summary = classify_files(&manager, &labels(), &files, false);
        assert_eq!(summary.failed, 5);
    }

    #[test]
    fn report_has_bom_header_and_error_marker() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), 2);
        let files = fs_service::list_image_files_recursive(dir.path()).unwrap();
        let manager = fixed_manager(FakeLoader::returning(vec![0.25, 0.25, 0.5]), [1, 8, 8, 3], 3);
        let summary = classify_files(&manager, &labels(), &files, false);

        let out = dir.path().join("reports/predictions.csv");
        write_report_file(&out, &summary.rows).unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[0],
            "file_path,predicted_class,confidence,top1_class,top1_confidence,top2_class,top2_confidence,top3_class,top3_confidence,error"
        );
        assert!(lines[1].contains(",fox,0.5,fox,0.5,cat,0.25,dog,0.25,"));
        assert!(lines[2].contains(",ERROR,,,,,,,,"));
    }
}
