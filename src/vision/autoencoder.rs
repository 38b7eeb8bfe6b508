//! Convolutional autoencoder with hand-rolled forward and backward passes.
//!
//! The network is deliberately tiny (under a thousand parameters): one
//! grayscale input plane, an 8-then-4 channel encoder with two 2x2
//! average-pool stages, a mirrored decoder with nearest-neighbor
//! upsampling, and a sigmoid output. The 4x spatial bottleneck forces a
//! lossy encoding, which is what makes reconstruction error a novelty
//! signal.

use std::{fs, path::Path};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// 3x3 same-padding convolution, stride 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ConvLayer {
    in_channels: usize,
    out_channels: usize,
    /// Row-major [out_channel][in_channel][ky][kx]
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl ConvLayer {
    fn new(in_channels: usize, out_channels: usize, rng: &mut StdRng) -> Self {
        // Glorot-uniform init, fan counted over the 3x3 receptive field.
        let fan_in = in_channels * 9;
        let fan_out = out_channels * 9;
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();

        let weights = (0..out_channels * in_channels * 9)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        let bias = vec![0.0; out_channels];

        Self {
            in_channels,
            out_channels,
            weights,
            bias,
        }
    }

    fn forward(&self, input: &[f32], height: usize, width: usize) -> Vec<f32> {
        let mut output = vec![0.0f32; self.out_channels * height * width];
        for oc in 0..self.out_channels {
            for y in 0..height {
                for x in 0..width {
                    let mut acc = self.bias[oc];
                    for ic in 0..self.in_channels {
                        for ky in 0..3 {
                            for kx in 0..3 {
                                let iy = y + ky;
                                let ix = x + kx;
                                if iy >= 1 && ix >= 1 && iy <= height && ix <= width {
                                    let weight = self.weights
                                        [((oc * self.in_channels + ic) * 3 + ky) * 3 + kx];
                                    let pixel =
                                        input[(ic * height + (iy - 1)) * width + (ix - 1)];
                                    acc += weight * pixel;
                                }
                            }
                        }
                    }
                    output[(oc * height + y) * width + x] = acc;
                }
            }
        }
        output
    }

    /// Gradients of the loss w.r.t. weights, bias and input, given the
    /// gradient w.r.t. this layer's pre-activation output.
    fn backward(
        &self,
        input: &[f32],
        grad_output: &[f32],
        height: usize,
        width: usize,
    ) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let mut grad_weights = vec![0.0f32; self.weights.len()];
        let mut grad_bias = vec![0.0f32; self.out_channels];
        let mut grad_input = vec![0.0f32; self.in_channels * height * width];

        for oc in 0..self.out_channels {
            for y in 0..height {
                for x in 0..width {
                    let upstream = grad_output[(oc * height + y) * width + x];
                    if upstream == 0.0 {
                        continue;
                    }
                    grad_bias[oc] += upstream;
                    for ic in 0..self.in_channels {
                        for ky in 0..3 {
                            for kx in 0..3 {
                                let iy = y + ky;
                                let ix = x + kx;
                                if iy >= 1 && ix >= 1 && iy <= height && ix <= width {
                                    let weight_index =
                                        ((oc * self.in_channels + ic) * 3 + ky) * 3 + kx;
                                    let input_index =
                                        (ic * height + (iy - 1)) * width + (ix - 1);
                                    grad_weights[weight_index] +=
                                        upstream * input[input_index];
                                    grad_input[input_index] +=
                                        upstream * self.weights[weight_index];
                                }
                            }
                        }
                    }
                }
            }
        }

        (grad_weights, grad_bias, grad_input)
    }

    pub(crate) fn parameters_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.weights, &mut self.bias)
    }
}

fn relu_in_place(values: &mut [f32]) {
    for value in values.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

fn sigmoid_in_place(values: &mut [f32]) {
    for value in values.iter_mut() {
        *value = 1.0 / (1.0 + (-*value).exp());
    }
}

/// 2x2 average pooling; height and width are input dimensions, both even.
fn avg_pool2(input: &[f32], channels: usize, height: usize, width: usize) -> Vec<f32> {
    let out_height = height / 2;
    let out_width = width / 2;
    let mut output = vec![0.0f32; channels * out_height * out_width];
    for c in 0..channels {
        for y in 0..out_height {
            for x in 0..out_width {
                let mut sum = 0.0;
                for dy in 0..2 {
                    for dx in 0..2 {
                        sum += input[(c * height + 2 * y + dy) * width + 2 * x + dx];
                    }
                }
                output[(c * out_height + y) * out_width + x] = sum / 4.0;
            }
        }
    }
    output
}

fn avg_pool2_backward(
    grad_output: &[f32],
    channels: usize,
    height: usize,
    width: usize,
) -> Vec<f32> {
    let out_height = height / 2;
    let out_width = width / 2;
    let mut grad_input = vec![0.0f32; channels * height * width];
    for c in 0..channels {
        for y in 0..out_height {
            for x in 0..out_width {
                let shared = grad_output[(c * out_height + y) * out_width + x] / 4.0;
                for dy in 0..2 {
                    for dx in 0..2 {
                        grad_input[(c * height + 2 * y + dy) * width + 2 * x + dx] = shared;
                    }
                }
            }
        }
    }
    grad_input
}

/// Nearest-neighbor 2x upsampling; height and width are input dimensions.
fn upsample2(input: &[f32], channels: usize, height: usize, width: usize) -> Vec<f32> {
    let out_height = height * 2;
    let out_width = width * 2;
    let mut output = vec![0.0f32; channels * out_height * out_width];
    for c in 0..channels {
        for y in 0..out_height {
            for x in 0..out_width {
                output[(c * out_height + y) * out_width + x] =
                    input[(c * height + y / 2) * width + x / 2];
            }
        }
    }
    output
}

fn upsample2_backward(
    grad_output: &[f32],
    channels: usize,
    height: usize,
    width: usize,
) -> Vec<f32> {
    let out_height = height * 2;
    let out_width = width * 2;
    let mut grad_input = vec![0.0f32; channels * height * width];
    for c in 0..channels {
        for y in 0..out_height {
            for x in 0..out_width {
                grad_input[(c * height + y / 2) * width + x / 2] +=
                    grad_output[(c * out_height + y) * out_width + x];
            }
        }
    }
    grad_input
}

/// All intermediate activations of one forward pass, kept for backprop.
pub(crate) struct ForwardTrace {
    input: Vec<f32>,
    a1: Vec<f32>,
    p1: Vec<f32>,
    a2: Vec<f32>,
    p2: Vec<f32>,
    a3: Vec<f32>,
    u1: Vec<f32>,
    a4: Vec<f32>,
    u2: Vec<f32>,
    pub(crate) output: Vec<f32>,
}

/// Per-layer weight and bias gradients in layer order.
pub(crate) struct Gradients {
    pub(crate) layers: Vec<(Vec<f32>, Vec<f32>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoencoder {
    side: usize,
    conv1: ConvLayer,
    conv2: ConvLayer,
    conv3: ConvLayer,
    conv4: ConvLayer,
    conv5: ConvLayer,
}

impl Autoencoder {
    pub fn new(side: usize, seed: u64) -> AnalysisResult<Self> {
        if side < 4 || side % 4 != 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "autoencoder input side must be a positive multiple of 4, got {side}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        Ok(Self {
            side,
            conv1: ConvLayer::new(1, 8, &mut rng),
            conv2: ConvLayer::new(8, 4, &mut rng),
            conv3: ConvLayer::new(4, 4, &mut rng),
            conv4: ConvLayer::new(4, 8, &mut rng),
            conv5: ConvLayer::new(8, 1, &mut rng),
        })
    }

    /// Input resolution (square side length) this model expects.
    pub fn side(&self) -> usize {
        self.side
    }

    pub(crate) fn forward_trace(&self, input: &[f32]) -> ForwardTrace {
        let s = self.side;
        let half = s / 2;
        let quarter = s / 4;

        let mut a1 = self.conv1.forward(input, s, s);
        relu_in_place(&mut a1);
        let p1 = avg_pool2(&a1, 8, s, s);

        let mut a2 = self.conv2.forward(&p1, half, half);
        relu_in_place(&mut a2);
        let p2 = avg_pool2(&a2, 4, half, half);

        let mut a3 = self.conv3.forward(&p2, quarter, quarter);
        relu_in_place(&mut a3);
        let u1 = upsample2(&a3, 4, quarter, quarter);

        let mut a4 = self.conv4.forward(&u1, half, half);
        relu_in_place(&mut a4);
        let u2 = upsample2(&a4, 8, half, half);

        let mut output = self.conv5.forward(&u2, s, s);
        sigmoid_in_place(&mut output);

        ForwardTrace {
            input: input.to_vec(),
            a1,
            p1,
            a2,
            p2,
            a3,
            u1,
            a4,
            u2,
            output,
        }
    }

    /// Reconstruct a normalized grayscale frame.
    pub fn reconstruct(&self, input: &[f32]) -> AnalysisResult<Vec<f32>> {
        self.check_input(input)?;
        Ok(self.forward_trace(input).output)
    }

    /// Mean squared reconstruction error over all pixels.
    pub fn reconstruction_error(&self, input: &[f32]) -> AnalysisResult<f32> {
        self.check_input(input)?;
        let output = self.forward_trace(input).output;
        let total: f64 = input
            .iter()
            .zip(output.iter())
            .map(|(pixel, rebuilt)| {
                let diff = f64::from(pixel - rebuilt);
                diff * diff
            })
            .sum();
        Ok((total / input.len() as f64) as f32)
    }

    fn check_input(&self, input: &[f32]) -> AnalysisResult<()> {
        let expected = self.side * self.side;
        if input.len() != expected {
            return Err(AnalysisError::ShapeMismatch {
                left: input.len(),
                right: expected,
            });
        }
        Ok(())
    }

    /// MSE loss and parameter gradients for one traced forward pass.
    pub(crate) fn backward(&self, trace: &ForwardTrace) -> (f32, Gradients) {
        let s = self.side;
        let half = s / 2;
        let quarter = s / 4;
        let pixels = (s * s) as f32;

        let mut loss = 0.0f64;
        // d(MSE)/d(output), folded with the sigmoid derivative.
        let mut grad = vec![0.0f32; s * s];
        for i in 0..grad.len() {
            let diff = trace.output[i] - trace.input[i];
            loss += f64::from(diff) * f64::from(diff);
            let d_output = 2.0 * diff / pixels;
            grad[i] = d_output * trace.output[i] * (1.0 - trace.output[i]);
        }
        let loss = (loss / f64::from(pixels)) as f32;

        let (gw5, gb5, grad) = self.conv5.backward(&trace.u2, &grad, s, s);
        let mut grad = upsample2_backward(&grad, 8, half, half);
        mask_relu(&mut grad, &trace.a4);

        let (gw4, gb4, grad) = self.conv4.backward(&trace.u1, &grad, half, half);
        let mut grad = upsample2_backward(&grad, 4, quarter, quarter);
        mask_relu(&mut grad, &trace.a3);

        let (gw3, gb3, grad) = self.conv3.backward(&trace.p2, &grad, quarter, quarter);
        let mut grad = avg_pool2_backward(&grad, 4, half, half);
        mask_relu(&mut grad, &trace.a2);

        let (gw2, gb2, grad) = self.conv2.backward(&trace.p1, &grad, half, half);
        let mut grad = avg_pool2_backward(&grad, 8, s, s);
        mask_relu(&mut grad, &trace.a1);

        let (gw1, gb1, _) = self.conv1.backward(&trace.input, &grad, s, s);

        let gradients = Gradients {
            layers: vec![
                (gw1, gb1),
                (gw2, gb2),
                (gw3, gb3),
                (gw4, gb4),
                (gw5, gb5),
            ],
        };
        (loss, gradients)
    }

    pub(crate) fn layers_mut(&mut self) -> [&mut ConvLayer; 5] {
        [
            &mut self.conv1,
            &mut self.conv2,
            &mut self.conv3,
            &mut self.conv4,
            &mut self.conv5,
        ]
    }

    pub fn save(&self, path: &Path) -> AnalysisResult<()> {
        let serialized = serde_json::to_string(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Load a trained model. Missing file means training never ran.
    pub fn load(path: &Path) -> AnalysisResult<Self> {
        if !path.exists() {
            return Err(AnalysisError::ModelNotTrained {
                path: path.display().to_string(),
            });
        }

        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|err| AnalysisError::ModelLoadFailure {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }
}

/// Zero the gradient wherever the forward activation was clamped by ReLU.
fn mask_relu(grad: &mut [f32], activation: &[f32]) {
    for (g, a) in grad.iter_mut().zip(activation.iter()) {
        if *a <= 0.0 {
            *g = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(side: usize, value: f32) -> Vec<f32> {
        vec![value; side * side]
    }

    #[test]
    fn test_reconstruction_matches_input_dimensions() {
        let model = Autoencoder::new(16, 7).unwrap();
        let output = model.reconstruct(&flat_frame(16, 0.3)).unwrap();
        assert_eq!(output.len(), 16 * 16);
        assert!(output.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_error_is_finite_and_nonnegative() {
        let model = Autoencoder::new(16, 7).unwrap();
        let error = model.reconstruction_error(&flat_frame(16, 0.9)).unwrap();
        assert!(error.is_finite());
        assert!(error >= 0.0);
    }

    #[test]
    fn test_wrong_input_size_is_shape_mismatch() {
        let model = Autoencoder::new(16, 7).unwrap();
        let err = model.reconstruction_error(&flat_frame(8, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ShapeMismatch { left: 64, right: 256 }
        ));
    }

    #[test]
    fn test_side_must_be_multiple_of_four() {
        assert!(Autoencoder::new(18, 7).is_err());
        assert!(Autoencoder::new(0, 7).is_err());
        assert!(Autoencoder::new(32, 7).is_ok());
    }

    #[test]
    fn test_same_seed_builds_identical_models() {
        let first = Autoencoder::new(16, 99).unwrap();
        let second = Autoencoder::new(16, 99).unwrap();
        let frame = flat_frame(16, 0.4);
        assert_eq!(
            first.reconstruct(&frame).unwrap(),
            second.reconstruct(&frame).unwrap()
        );
    }

    #[test]
    fn test_save_load_reproduces_reconstruction() {
        let model = Autoencoder::new(16, 3).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoencoder.json");
        model.save(&path).unwrap();

        let reloaded = Autoencoder::load(&path).unwrap();
        assert_eq!(reloaded.side(), 16);
        let frame = flat_frame(16, 0.6);
        assert_eq!(
            model.reconstruct(&frame).unwrap(),
            reloaded.reconstruct(&frame).unwrap()
        );
    }

    #[test]
    fn test_load_missing_file_reports_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let err = Autoencoder::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, AnalysisError::ModelNotTrained { .. }));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        // Spot-check backprop on a handful of parameters against a
        // central finite difference.
        let mut model = Autoencoder::new(8, 11).unwrap();
        let frame: Vec<f32> = (0..64).map(|i| (i as f32) / 64.0).collect();

        let trace = model.forward_trace(&frame);
        let (_, gradients) = model.backward(&trace);

        let epsilon = 1e-3f32;
        for (layer_index, param_index) in [(0usize, 0usize), (2, 5), (4, 3)] {
            let analytic = gradients.layers[layer_index].0[param_index];

            let original = nudge_weight(&mut model, layer_index, param_index, epsilon);
            let loss_plus = model.reconstruction_error(&frame).unwrap();
            set_weight(&mut model, layer_index, param_index, original - epsilon);
            let loss_minus = model.reconstruction_error(&frame).unwrap();
            set_weight(&mut model, layer_index, param_index, original);

            let numeric = (loss_plus - loss_minus) / (2.0 * epsilon);
            assert!(
                (analytic - numeric).abs() < 1e-3,
                "layer {layer_index} param {param_index}: analytic {analytic} vs numeric {numeric}"
            );
        }
    }

    /// Add `delta` to one weight and return its original value.
    fn nudge_weight(model: &mut Autoencoder, layer: usize, param: usize, delta: f32) -> f32 {
        let conv = model
            .layers_mut()
            .into_iter()
            .nth(layer)
            .unwrap();
        let (weights, _) = conv.parameters_mut();
        let original = weights[param];
        weights[param] = original + delta;
        original
    }

    fn set_weight(model: &mut Autoencoder, layer: usize, param: usize, value: f32) {
        let conv = model
            .layers_mut()
            .into_iter()
            .nth(layer)
            .unwrap();
        let (weights, _) = conv.parameters_mut();
        weights[param] = value;
    }
}
