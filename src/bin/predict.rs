use animal_lens_lib::services::batch;
use animal_lens_lib::services::classifier::model_manager::ModelManager;
use animal_lens_lib::services::fs_service;
use animal_lens_lib::services::labels::LabelSet;
use animal_lens_lib::AppConfig;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Classify every image under a directory and write a CSV report.
#[derive(Parser)]
struct Args {
    /// Directory searched recursively for images
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Report path
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long)]
    classes: Option<PathBuf>,

    /// Preprocess images in parallel
    #[arg(long)]
    parallel: bool,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    animal_lens_lib::init_tracing();

    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.dir {
        config.batch.image_dir = dir;
    }
    if let Some(output) = args.output {
        config.batch.output_csv = output;
    }
    if let Some(model) = args.model {
        config.model.model_path = model;
    }
    if let Some(classes) = args.classes {
        config.model.class_names_path = classes;
    }
    config.batch.parallel |= args.parallel;

    // Labels and model are required up front; without them there is nothing to report.
    let labels = LabelSet::load(&config.model.class_names_path)?;
    let manager = ModelManager::onnx(&config.model, Some(labels.len()));
    manager.load_model()?;

    let image_files = fs_service::list_image_files_recursive(&config.batch.image_dir)?;
    if image_files.is_empty() {
        anyhow::bail!("No images found in {}", config.batch.image_dir.display());
    }
    info!("Found {} images to classify", image_files.len());

    let summary = batch::classify_files(&manager, &labels, &image_files, config.batch.parallel);
    batch::write_report_file(&config.batch.output_csv, &summary.rows)?;

    info!(
        "Done: {} images, {} failed. Report saved to {}",
        summary.total,
        summary.failed,
        config.batch.output_csv.display()
    );
    for row in summary.rows.iter().take(5) {
        match (&row.error, row.predictions.first()) {
            (None, Some(top)) => println!(
                "{}  {}  {:.4}",
                row.file_path.display(),
                top.class_name,
                top.confidence
            ),
            (Some(e), _) => println!("{}  ERROR  {}", row.file_path.display(), e),
            (None, None) => println!("{}", row.file_path.display()),
        }
    }
    Ok(())
}
