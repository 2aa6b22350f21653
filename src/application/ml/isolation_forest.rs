//! Isolation Forest outlier scorer.
//!
//! Points that are easy to isolate with random axis-aligned splits sit on
//! short paths and receive low scores. Scores follow the usual convention
//! `score = -2^(-E[h(x)] / c(psi))`, so they lie in [-1, 0] and anomalies are
//! the most negative values.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::scorer::OutlierScorer;
use crate::domain::errors::DetectionError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParameters {
    pub n_estimators: usize,
    /// Sub-sample size per tree, capped at the number of training rows.
    pub max_samples: usize,
    /// Fraction of features each tree may split on.
    pub max_features: f64,
    /// Draw each tree's sub-sample with replacement.
    pub bootstrap: bool,
    /// Expected outlier fraction of the training set, in (0, 0.5].
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParameters {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            max_features: 0.8,
            bootstrap: true,
            contamination: 0.02,
            seed: 42,
        }
    }
}

impl IsolationForestParameters {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n.max(1);
        self
    }

    pub fn with_max_features(mut self, fraction: f64) -> Self {
        self.max_features = fraction.clamp(f64::MIN_POSITIVE, 1.0);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationNode {
    fn build(
        x: &Array2<f64>,
        indices: &[usize],
        features: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        if depth >= max_depth || indices.len() <= 1 {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        }

        // Try features in random order, skipping ones that are constant in this node
        let mut candidates = features.to_vec();
        candidates.shuffle(rng);

        for feature in candidates {
            let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = x[[i, feature]];
                (lo.min(v), hi.max(v))
            });
            if max - min <= 1e-12 {
                continue;
            }

            let threshold = rng.random_range(min..max);
            let (left, right): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] < threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }

            return IsolationNode::Split {
                feature,
                threshold,
                left: Box::new(Self::build(x, &left, features, depth + 1, max_depth, rng)),
                right: Box::new(Self::build(x, &right, features, depth + 1, max_depth, rng)),
            };
        }

        IsolationNode::Leaf {
            size: indices.len(),
        }
    }

    fn path_length(&self, sample: &ArrayView1<f64>, depth: usize) -> f64 {
        match self {
            IsolationNode::Leaf { size } => depth as f64 + average_path_length(*size),
            IsolationNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, depth + 1)
                } else {
                    right.path_length(sample, depth + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` items:
/// `c(n) = 2 (ln(n - 1) + gamma) - 2 (n - 1) / n`.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Fitted Isolation Forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    parameters: IsolationForestParameters,
    trees: Vec<IsolationNode>,
    sample_size: usize,
    n_features: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fits on an already-scaled matrix.
    pub fn fit(x: &Array2<f64>, parameters: IsolationForestParameters) -> Result<Self, DetectionError> {
        let n_rows = x.nrows();
        let n_features = x.ncols();
        if n_rows < 2 || n_features == 0 {
            return Err(DetectionError::InsufficientData {
                context: "isolation forest fit".to_string(),
                available: n_rows,
                required: 2,
            });
        }
        if !(parameters.contamination > 0.0 && parameters.contamination <= 0.5) {
            return Err(DetectionError::InvalidConfig {
                key: "contamination".to_string(),
                reason: format!("{} is outside (0, 0.5]", parameters.contamination),
            });
        }

        let sample_size = parameters.max_samples.min(n_rows).max(2);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let features_per_tree =
            ((parameters.max_features * n_features as f64).floor() as usize).clamp(1, n_features);

        let mut master = StdRng::seed_from_u64(parameters.seed);
        let tree_seeds: Vec<u64> = (0..parameters.n_estimators.max(1))
            .map(|_| master.random())
            .collect();

        let trees: Vec<IsolationNode> = tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let features = index::sample(&mut rng, n_features, features_per_tree).into_vec();
                let indices: Vec<usize> = if parameters.bootstrap {
                    (0..sample_size).map(|_| rng.random_range(0..n_rows)).collect()
                } else {
                    index::sample(&mut rng, n_rows, sample_size).into_vec()
                };
                IsolationNode::build(x, &indices, &features, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            parameters,
            trees,
            sample_size,
            n_features,
            offset: 0.0,
        };

        let scores = forest.score_samples(x);
        forest.offset = percentile(&scores, forest.parameters.contamination * 100.0);
        Ok(forest)
    }

    pub fn parameters(&self) -> &IsolationForestParameters {
        &self.parameters
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn score_row(&self, row: ArrayView1<f64>) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(&row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normaliser = average_path_length(self.sample_size).max(f64::MIN_POSITIVE);
        -(2.0_f64.powf(-mean_path / normaliser))
    }
}

impl OutlierScorer for IsolationForest {
    fn score_samples(&self, x: &Array2<f64>) -> Vec<f64> {
        (0..x.nrows())
            .into_par_iter()
            .map(|r| self.score_row(x.row(r)))
            .collect()
    }

    fn offset(&self) -> f64 {
        self.offset
    }

    fn name(&self) -> &str {
        "Isolation Forest"
    }
}

/// Percentile with linear interpolation between closest ranks (`q` in 0..=100).
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outliers() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = Vec::new();
        for _ in 0..300 {
            data.push(rng.random_range(-1.0..1.0));
            data.push(rng.random_range(-1.0..1.0));
        }
        data.extend_from_slice(&[8.0, 8.0]);
        data.extend_from_slice(&[-9.0, 7.5]);
        Array2::from_shape_vec((302, 2), data).unwrap()
    }

    #[test]
    fn test_outliers_score_lower() {
        let x = cluster_with_outliers();
        let params = IsolationForestParameters::default()
            .with_n_estimators(100)
            .with_max_features(1.0)
            .with_contamination(0.02);
        let forest = IsolationForest::fit(&x, params).unwrap();

        let scores = forest.score_samples(&x);
        assert!(scores.iter().all(|s| (-1.0..=0.0).contains(s)));
        assert!(scores[300] < scores[0]);
        assert!(scores[301] < scores[0]);

        let labels = forest.predict(&x);
        assert!(labels[300]);
        assert!(labels[301]);
    }

    #[test]
    fn test_training_outlier_rate_tracks_contamination() {
        let x = cluster_with_outliers();
        for contamination in [0.02, 0.05, 0.2] {
            let params = IsolationForestParameters::default().with_contamination(contamination);
            let forest = IsolationForest::fit(&x, params).unwrap();
            let flagged = forest.predict(&x).iter().filter(|&&l| l).count();
            let rate = flagged as f64 / x.nrows() as f64;
            assert!(rate <= contamination + 0.01, "rate {} for {}", rate, contamination);
            assert!(rate >= contamination - 0.01, "rate {} for {}", rate, contamination);
        }
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let x = cluster_with_outliers();
        let a = IsolationForest::fit(&x, IsolationForestParameters::default()).unwrap();
        let b = IsolationForest::fit(&x, IsolationForestParameters::default()).unwrap();
        assert_eq!(a.score_samples(&x), b.score_samples(&x));
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn test_constant_features_are_skipped() {
        let mut data = Vec::new();
        for i in 0..200 {
            data.push(5.0);
            data.push((i % 20) as f64);
        }
        data.push(5.0);
        data.push(400.0);
        let x = Array2::from_shape_vec((201, 2), data).unwrap();
        let forest = IsolationForest::fit(&x, IsolationForestParameters::default()).unwrap();
        let scores = forest.score_samples(&x);
        assert!(scores[200] < scores[10]);
    }

    #[test]
    fn test_rejects_invalid_contamination() {
        let x = cluster_with_outliers();
        let err = IsolationForest::fit(&x, IsolationForestParameters::default().with_contamination(0.0))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ~ 10.24
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        assert_eq!(percentile(&v, 50.0), 2.5);
    }

    #[test]
    fn test_serde_roundtrip_scores_identically() {
        let x = cluster_with_outliers();
        let forest = IsolationForest::fit(&x, IsolationForestParameters::default()).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();
        let a = forest.score_samples(&x);
        let b = restored.score_samples(&x);
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert!((sa - sb).abs() < 1e-9);
        }
    }
}
