//! Autoencoder training over collected screenshots.

use std::path::Path;

use log::{debug, info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{AnalysisError, AnalysisResult};
use crate::vision::autoencoder::{Autoencoder, Gradients};
use crate::vision::preprocess::load_screenshot;
use crate::vision::TrainingConfig;

/// Below this many screenshots a fit is all noise; refuse to train.
pub const MIN_TRAINING_IMAGES: usize = 10;

/// Adam optimizer state, one moment pair per parameter tensor.
struct Adam {
    learning_rate: f32,
    step: i32,
    moments: Vec<LayerMoments>,
}

struct LayerMoments {
    weight_m: Vec<f32>,
    weight_v: Vec<f32>,
    bias_m: Vec<f32>,
    bias_v: Vec<f32>,
}

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

impl Adam {
    fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            step: 0,
            moments: Vec::new(),
        }
    }

    fn apply(&mut self, model: &mut Autoencoder, gradients: &Gradients) {
        if self.moments.is_empty() {
            self.moments = gradients
                .layers
                .iter()
                .map(|(weight_grad, bias_grad)| LayerMoments {
                    weight_m: vec![0.0; weight_grad.len()],
                    weight_v: vec![0.0; weight_grad.len()],
                    bias_m: vec![0.0; bias_grad.len()],
                    bias_v: vec![0.0; bias_grad.len()],
                })
                .collect();
        }

        self.step += 1;
        let bias_correction1 = 1.0 - BETA1.powi(self.step);
        let bias_correction2 = 1.0 - BETA2.powi(self.step);

        for ((layer, (weight_grad, bias_grad)), moments) in model
            .layers_mut()
            .into_iter()
            .zip(gradients.layers.iter())
            .zip(self.moments.iter_mut())
        {
            let (weights, bias) = layer.parameters_mut();
            update(
                weights,
                weight_grad,
                &mut moments.weight_m,
                &mut moments.weight_v,
                self.learning_rate,
                bias_correction1,
                bias_correction2,
            );
            update(
                bias,
                bias_grad,
                &mut moments.bias_m,
                &mut moments.bias_v,
                self.learning_rate,
                bias_correction1,
                bias_correction2,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update(
    params: &mut [f32],
    grads: &[f32],
    m: &mut [f32],
    v: &mut [f32],
    learning_rate: f32,
    bias_correction1: f32,
    bias_correction2: f32,
) {
    for i in 0..params.len() {
        m[i] = BETA1 * m[i] + (1.0 - BETA1) * grads[i];
        v[i] = BETA2 * v[i] + (1.0 - BETA2) * grads[i] * grads[i];
        let m_hat = m[i] / bias_correction1;
        let v_hat = v[i] / bias_correction2;
        params[i] -= learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
    }
}

/// Train an autoencoder on preprocessed frames.
///
/// Frames must all be `config.side` squared, as produced by
/// [`load_screenshot`](crate::vision::preprocess::load_screenshot).
/// Training shuffles the frame order each epoch with the configured seed,
/// so two runs over the same frames produce the same weights.
pub fn train_autoencoder(
    frames: &[Vec<f32>],
    config: &TrainingConfig,
) -> AnalysisResult<Autoencoder> {
    if frames.len() < MIN_TRAINING_IMAGES {
        return Err(AnalysisError::InsufficientTrainingData {
            needed: MIN_TRAINING_IMAGES,
            got: frames.len(),
        });
    }

    let expected = config.side * config.side;
    for frame in frames {
        if frame.len() != expected {
            return Err(AnalysisError::ShapeMismatch {
                left: frame.len(),
                right: expected,
            });
        }
    }

    let mut model = Autoencoder::new(config.side, config.seed)?;
    let mut optimizer = Adam::new(config.learning_rate);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order: Vec<usize> = (0..frames.len()).collect();

    info!(
        "Training autoencoder on {} frames at {}x{} for {} epochs",
        frames.len(),
        config.side,
        config.side,
        config.epochs
    );

    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0f64;
        for &index in &order {
            let trace = model.forward_trace(&frames[index]);
            let (loss, gradients) = model.backward(&trace);
            optimizer.apply(&mut model, &gradients);
            epoch_loss += f64::from(loss);
        }
        debug!(
            "Epoch {}/{}: mean loss {:.6}",
            epoch + 1,
            config.epochs,
            epoch_loss / frames.len() as f64
        );
    }

    Ok(model)
}

/// Collect and preprocess every PNG under a screenshots directory.
///
/// The capture layer lays screenshots out as one subdirectory per day;
/// this walks one level of subdirectories plus the root itself. Unreadable
/// files are skipped with a warning so one corrupt frame cannot sink a
/// training run. Paths are sorted first, keeping the frame order (and
/// therefore training) reproducible.
pub fn load_training_frames(dir: &Path, side: usize) -> AnalysisResult<Vec<Vec<f32>>> {
    let mut paths = Vec::new();
    collect_pngs(dir, &mut paths, true)?;
    paths.sort();

    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        match load_screenshot(&path, side) {
            Ok(frame) => frames.push(frame),
            Err(err) => warn!("Skipping unreadable screenshot {}: {err}", path.display()),
        }
    }
    Ok(frames)
}

fn collect_pngs(
    dir: &Path,
    paths: &mut Vec<std::path::PathBuf>,
    recurse: bool,
) -> AnalysisResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if recurse {
                collect_pngs(&path, paths, false)?;
            }
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            paths.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    fn flat_frames(count: usize, side: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; side * side]; count]
    }

    fn quick_config(side: usize, epochs: usize) -> TrainingConfig {
        TrainingConfig {
            side,
            epochs,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_training_reduces_reconstruction_error() {
        let frames = flat_frames(12, 16, 0.2);
        let config = quick_config(16, 30);

        let untrained = Autoencoder::new(config.side, config.seed).unwrap();
        let before = untrained.reconstruction_error(&frames[0]).unwrap();

        let trained = train_autoencoder(&frames, &config).unwrap();
        let after = trained.reconstruction_error(&frames[0]).unwrap();

        assert!(
            after < before,
            "training did not help: before {before}, after {after}"
        );
    }

    #[test]
    fn test_too_few_images_is_refused() {
        let frames = flat_frames(9, 16, 0.5);
        let err = train_autoencoder(&frames, &quick_config(16, 1)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientTrainingData { needed: 10, got: 9 }
        ));
    }

    #[test]
    fn test_misshapen_frame_is_rejected() {
        let mut frames = flat_frames(10, 16, 0.5);
        frames[3] = vec![0.5; 64];
        let err = train_autoencoder(&frames, &quick_config(16, 1)).unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_training_is_deterministic() {
        let frames = flat_frames(10, 16, 0.3);
        let config = quick_config(16, 3);

        let first = train_autoencoder(&frames, &config).unwrap();
        let second = train_autoencoder(&frames, &config).unwrap();
        assert_eq!(
            first.reconstruction_error(&frames[0]).unwrap(),
            second.reconstruction_error(&frames[0]).unwrap()
        );
    }

    #[test]
    fn test_load_training_frames_walks_dated_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let day = dir.path().join("2026-03-02");
        std::fs::create_dir(&day).unwrap();
        for name in ["10-00-00.png", "10-00-10.png"] {
            GrayImage::from_fn(8, 8, |_, _| Luma([128u8]))
                .save(day.join(name))
                .unwrap();
        }
        std::fs::write(day.join("notes.txt"), "not an image").unwrap();

        let frames = load_training_frames(dir.path(), 16).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == 256));
    }

    #[test]
    fn test_load_training_frames_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_fn(8, 8, |_, _| Luma([10u8]))
            .save(dir.path().join("good.png"))
            .unwrap();
        std::fs::write(dir.path().join("bad.png"), "definitely not a png").unwrap();

        let frames = load_training_frames(dir.path(), 16).unwrap();
        assert_eq!(frames.len(), 1);
    }
}
