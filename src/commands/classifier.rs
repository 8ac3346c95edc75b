use crate::error::AppError;
use crate::models::classify_types::{ModelStatus, RecognitionOutcome};
use crate::services::classifier::inference;
use crate::state::AppState;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

pub fn get_model_status(state: &AppState) -> ModelStatus {
    state.model_manager.status()
}

pub fn load_model(state: &AppState) -> Result<(), AppError> {
    state.model_manager.load_model()
}

/// Whether a recognition is running. The trigger stays disabled while this is `true`.
pub fn is_recognizing(state: &AppState) -> bool {
    state.recognition_in_flight.load(Ordering::Acquire)
}

/// Result of a recognition started with [`start_recognition`].
pub struct RecognitionHandle {
    rx: oneshot::Receiver<Result<RecognitionOutcome, AppError>>,
}

impl RecognitionHandle {
    pub async fn wait(self) -> Result<RecognitionOutcome, AppError> {
        self.rx.await.unwrap_or_else(|_| Err(worker_gone()))
    }

    /// Block the calling thread until the worker reports. Not for use inside an async runtime.
    pub fn wait_blocking(self) -> Result<RecognitionOutcome, AppError> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(worker_gone()))
    }
}

fn worker_gone() -> AppError {
    AppError::Inference("Recognition worker stopped without a result".to_string())
}

/// Releases the in-flight slot when dropped, including on worker panic.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Recognize `image_path` on a background thread.
///
/// At most one recognition runs at a time: a second call while one is in
/// flight returns [`AppError::Busy`] instead of queuing. The worker always runs
/// to completion and hands its outcome back through the returned handle.
pub fn start_recognition(state: &AppState, image_path: PathBuf) -> Result<RecognitionHandle, AppError> {
    state.require_labels()?;
    let slot = InFlight::claim(&state.recognition_in_flight).ok_or(AppError::Busy)?;

    state.progress().stats.total_recognitions += 1;
    if let Err(e) = state.commit_progress(false) {
        tracing::warn!("Recognition counter not saved: {}", e);
    }

    let (tx, rx) = oneshot::channel();
    let worker_state = state.clone();
    std::thread::Builder::new()
        .name("recognition".to_string())
        .spawn(move || {
            let outcome = recognize(&worker_state, image_path);
            drop(slot);
            // The receiver may be gone if the caller stopped waiting; nothing to do then.
            let _ = tx.send(outcome);
        })?;

    Ok(RecognitionHandle { rx })
}

fn recognize(state: &AppState, image_path: PathBuf) -> Result<RecognitionOutcome, AppError> {
    tracing::info!("Recognizing {}", image_path.display());
    let labels = state.require_labels()?;
    let predictions =
        inference::classify_image(&state.model_manager, &image_path, labels, state.config.model.top_k)
            .inspect_err(|e| tracing::error!("Recognition failed: {}", e))?;

    let mut newly_unlocked = None;
    if let Some(top_class) = inference::top1_unlock_candidate(&predictions, labels) {
        if state.progress().unlock(top_class) {
            tracing::info!("Unlocked new animal: {}", top_class);
            newly_unlocked = Some(top_class.to_string());
        }
    }

    let persist_error = if newly_unlocked.is_some() {
        state.commit_progress(true).err().map(|e| e.to_string())
    } else {
        None
    };

    Ok(RecognitionOutcome {
        file_path: image_path,
        predictions,
        newly_unlocked,
        persist_error,
    })
}
