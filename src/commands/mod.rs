pub mod classifier;
pub mod progress;
pub mod quiz;
