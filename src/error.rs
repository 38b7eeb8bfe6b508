use thiserror::Error;

/// Errors produced by the analysis core (scoring, anomaly models, ranking).
///
/// Edge code (CLI, recorder wiring) wraps these in `anyhow` like everything
/// else; the typed variants exist so callers can tell apart conditions that
/// need different handling, e.g. "model file missing" vs "model file corrupt".
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("embedding dimensions differ: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("not enough records to fit the model: need {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("not enough training images: need {needed}, got {got}")]
    InsufficientTrainingData { needed: usize, got: usize },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("no trained model found at {path}")]
    ModelNotTrained { path: String },

    #[error("failed to load model from {path}: {reason}")]
    ModelLoadFailure { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
