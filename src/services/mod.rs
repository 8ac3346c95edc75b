pub mod batch;
pub mod classifier;
pub mod fs_service;
pub mod labels;
pub mod progress_store;
pub mod quiz;
