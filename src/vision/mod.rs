//! Visual novelty detection over stored screenshots.
//!
//! A small convolutional autoencoder is trained on the user's ordinary
//! screen content; frames it reconstructs poorly are visually novel.
//! Reconstruction error (pixel MSE) is the whole signal, there is no
//! labeled training.

pub mod autoencoder;
pub mod preprocess;
pub mod ranker;
pub mod trainer;

pub use autoencoder::Autoencoder;
pub use ranker::{rank_visual_anomalies, VisualAnomaly};
pub use trainer::train_autoencoder;

use serde::{Deserialize, Serialize};

/// Tunables for autoencoder training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Square input resolution; screenshots are resized to side x side.
    /// Must be a multiple of 4 to survive the two pooling stages.
    pub side: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    /// Seed for weight init and epoch shuffling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            side: 128,
            epochs: 20,
            learning_rate: 1e-3,
            seed: 42,
        }
    }
}
