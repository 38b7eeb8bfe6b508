//! Isolation forest over numeric feature rows.
//!
//! Anomalies are isolated by fewer random splits than dense regions, so
//! short average path lengths mean unusual points. Scores follow the
//! standard normalization 2^(-E[h(x)] / c(psi)): above 0.5 is more
//! isolated than a random point of the subsample, at most 1.0.

use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyConfig;
use crate::error::{AnalysisError, AnalysisResult};

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful BST search over n points.
/// Standard in the isolation forest literature; used both for leaf
/// adjustments and for score normalization.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + EULER_MASCHERONI;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn build(data: &[Vec<f64>], sample: Vec<usize>, depth_limit: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        grow(&mut nodes, data, sample, 0, depth_limit, rng);
        Tree { nodes }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut depth = 0usize;
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1;
                }
            }
        }
    }
}

/// Recursively partition `sample` (indices into `data`) and append nodes,
/// returning the index of the node created for this call.
fn grow(
    nodes: &mut Vec<Node>,
    data: &[Vec<f64>],
    sample: Vec<usize>,
    depth: usize,
    depth_limit: usize,
    rng: &mut StdRng,
) -> usize {
    if depth >= depth_limit || sample.len() <= 1 {
        nodes.push(Node::Leaf { size: sample.len() });
        return nodes.len() - 1;
    }

    // Only features that actually vary within this partition can split it.
    let width = data[sample[0]].len();
    let mut candidates = Vec::new();
    for feature in 0..width {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &row in &sample {
            let value = data[row][feature];
            min = min.min(value);
            max = max.max(value);
        }
        if min < max {
            candidates.push((feature, min, max));
        }
    }

    if candidates.is_empty() {
        nodes.push(Node::Leaf { size: sample.len() });
        return nodes.len() - 1;
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(min..max);

    let (left_sample, right_sample): (Vec<usize>, Vec<usize>) = sample
        .into_iter()
        .partition(|&row| data[row][feature] < threshold);

    // Reserve this node's slot before recursing so child indices are known.
    let node_index = nodes.len();
    nodes.push(Node::Leaf { size: 0 });
    let left = grow(nodes, data, left_sample, depth + 1, depth_limit, rng);
    let right = grow(nodes, data, right_sample, depth + 1, depth_limit, rng);
    nodes[node_index] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    node_index
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Tree>,
    subsample_size: usize,
}

impl IsolationForest {
    /// Fit an ensemble on feature rows. Every row must have the same width.
    pub fn fit(data: &[Vec<f64>], config: &AnomalyConfig) -> AnalysisResult<Self> {
        if data.is_empty() {
            return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
        }

        let subsample_size = config.sample_size.min(data.len());
        let depth_limit = (subsample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.num_trees)
            .map(|_| {
                let sample = index::sample(&mut rng, data.len(), subsample_size).into_vec();
                Tree::build(data, sample, depth_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            subsample_size,
        })
    }

    /// Anomaly score in (0, 1]; higher is more isolated.
    pub fn score(&self, row: &[f64]) -> f64 {
        let normalization = average_path_length(self.subsample_size);
        if self.trees.is_empty() || normalization == 0.0 {
            // Degenerate fit (single record or no trees): nothing is anomalous.
            return 0.5;
        }

        let total: f64 = self.trees.iter().map(|tree| tree.path_length(row)).sum();
        let mean_path = total / self.trees.len() as f64;
        2.0_f64.powf(-mean_path / normalization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..64)
            .map(|i| vec![(i % 8) as f64 * 0.1, (i / 8) as f64 * 0.1])
            .collect();
        data.push(vec![10.0, 10.0]);
        data
    }

    #[test]
    fn test_outlier_scores_higher_than_cluster() {
        let data = cluster_with_outlier();
        let forest = IsolationForest::fit(&data, &AnomalyConfig::default()).unwrap();

        let outlier_score = forest.score(&data[64]);
        let max_cluster_score = data[..64]
            .iter()
            .map(|row| forest.score(row))
            .fold(f64::NEG_INFINITY, f64::max);

        assert!(outlier_score > max_cluster_score);
        assert!(outlier_score > 0.5);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let data = cluster_with_outlier();
        let forest = IsolationForest::fit(&data, &AnomalyConfig::default()).unwrap();
        for row in &data {
            let score = forest.score(row);
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn test_same_seed_reproduces_scores() {
        let data = cluster_with_outlier();
        let config = AnomalyConfig::default();
        let first = IsolationForest::fit(&data, &config).unwrap();
        let second = IsolationForest::fit(&data, &config).unwrap();

        for row in &data {
            assert_eq!(first.score(row), second.score(row));
        }
    }

    #[test]
    fn test_empty_input_is_insufficient_data() {
        let err = IsolationForest::fit(&[], &AnomalyConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { needed: 1, got: 0 }
        ));
    }

    #[test]
    fn test_identical_points_are_not_anomalous() {
        // Every tree collapses to a single leaf, so the mean path equals
        // the normalization constant and the score sits exactly at 0.5.
        let data = vec![vec![5.0, 1.0]; 32];
        let forest = IsolationForest::fit(&data, &AnomalyConfig::default()).unwrap();
        assert!(forest.score(&data[0]) <= 0.5);
    }
}
