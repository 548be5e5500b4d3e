//! Regression trees and the random forest stage of the price estimator.
//!
//! Trees are built with the CART algorithm: MSE splitting criterion,
//! midpoint thresholds between consecutive unique feature values, and
//! leaves predicting the mean of their training targets. The forest
//! trains each tree on a bootstrap sample and averages predictions
//! uniformly.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};
use crate::traits::Estimator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Leaf node in a regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionLeaf {
    /// Predicted value for this leaf (mean of y values)
    pub value: f32,
    /// Number of training samples in this leaf
    pub n_samples: usize,
}

/// Internal node in a regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionNode {
    /// Index of the feature to split on
    pub feature_idx: usize,
    /// Threshold value for the split
    pub threshold: f32,
    /// Left subtree (samples where feature <= threshold)
    pub left: Box<RegressionTreeNode>,
    /// Right subtree (samples where feature > threshold)
    pub right: Box<RegressionTreeNode>,
}

/// A node in a regression tree (either internal node or leaf).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressionTreeNode {
    /// Internal decision node with split condition
    Node(RegressionNode),
    /// Leaf node with value prediction
    Leaf(RegressionLeaf),
}

impl RegressionTreeNode {
    /// Depth of the tree rooted at this node (leaves are depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            RegressionTreeNode::Leaf(_) => 0,
            RegressionTreeNode::Node(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }
}

/// Decision tree regressor using the CART algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    tree: Option<RegressionTreeNode>,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Candidate features considered per split; None = all features.
    max_features: Option<usize>,
    random_state: Option<u64>,
}

impl DecisionTreeRegressor {
    /// Creates a new decision tree regressor with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
        }
    }

    /// Sets the maximum depth of the tree.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the minimum number of samples required to split a node.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Sets the minimum number of samples required at a leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Considers a random subset of this many features at every split.
    ///
    /// When unset, every feature is a candidate at every split (the
    /// standard default for regression forests).
    #[must_use]
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Seeds the per-split feature subsetting for reproducibility.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Predicts the value for a single sample.
    fn predict_one(&self, x: &[f32]) -> f32 {
        let tree = self.tree.as_ref().expect("Model not fitted");

        let mut node = tree;
        loop {
            match node {
                RegressionTreeNode::Leaf(leaf) => return leaf.value,
                RegressionTreeNode::Node(internal) => {
                    if x[internal.feature_idx] <= internal.threshold {
                        node = &internal.left;
                    } else {
                        node = &internal.right;
                    }
                }
            }
        }
    }
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for DecisionTreeRegressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let (n_rows, _n_cols) = x.shape();
        if n_rows != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_rows == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        let mut rng = self
            .random_state
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        self.tree = Some(build_regression_tree(
            x,
            y,
            0,
            &TreeParams {
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                max_features: self.max_features,
            },
            &mut rng,
        ));
        Ok(())
    }

    /// Predicts target values for samples.
    ///
    /// # Panics
    ///
    /// Panics if called before `fit`.
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        let (n_samples, n_features) = x.shape();
        let mut predictions = Vec::with_capacity(n_samples);

        for row in 0..n_samples {
            let mut sample = Vec::with_capacity(n_features);
            for col in 0..n_features {
                sample.push(x.get(row, col));
            }
            predictions.push(self.predict_one(&sample));
        }

        Vector::from_vec(predictions)
    }

    fn score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> f32 {
        let predictions = self.predict(x);
        crate::metrics::r_squared(y, &predictions)
    }
}

/// Random forest regressor: the first stage of the pricing ensemble.
///
/// Ensemble of CART regressors trained on bootstrap samples; predictions
/// are averaged uniformly across all trees.
///
/// # Examples
///
/// ```
/// use tarifa::prelude::*;
/// use tarifa::tree::RandomForestRegressor;
///
/// let x = Matrix::from_vec(5, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
/// let y = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
///
/// let mut rf = RandomForestRegressor::new(10).with_random_state(42);
/// rf.fit(&x, &y).expect("fit should succeed");
/// let predictions = rf.predict(&x);
/// assert_eq!(predictions.len(), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    n_estimators: usize,
    max_depth: Option<usize>,
    max_features: Option<usize>,
    random_state: Option<u64>,
}

impl RandomForestRegressor {
    /// Creates a new random forest regressor with `n_estimators` trees.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            max_features: None,
            random_state: None,
        }
    }

    /// Sets the maximum depth for each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Considers a random subset of this many features per split.
    #[must_use]
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Sets the random state for reproducible bootstrap sampling.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Number of trees requested.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Returns true once the forest has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Estimator for RandomForestRegressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let n_samples = x.shape().0;

        if n_samples != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        self.trees = Vec::with_capacity(self.n_estimators);

        for i in 0..self.n_estimators {
            // Derive a distinct seed per tree so training is reproducible
            // but trees decorrelate.
            let seed = self.random_state.map(|s| s.wrapping_add(i as u64));
            let bootstrap_indices = bootstrap_sample(n_samples, seed);

            let bootstrap_x = x.select_rows(&bootstrap_indices);
            let bootstrap_y = Vector::from_vec(
                bootstrap_indices
                    .iter()
                    .map(|&idx| y.get(idx))
                    .collect::<Vec<f32>>(),
            );

            let mut tree = DecisionTreeRegressor::new();
            if let Some(max_depth) = self.max_depth {
                tree = tree.with_max_depth(max_depth);
            }
            if let Some(max_features) = self.max_features {
                tree = tree.with_max_features(max_features);
            }
            if let Some(seed) = seed {
                tree = tree.with_random_state(seed);
            }

            tree.fit(&bootstrap_x, &bootstrap_y)?;
            self.trees.push(tree);
        }

        Ok(())
    }

    /// Averages predictions from all trees.
    ///
    /// # Panics
    ///
    /// Panics if the forest hasn't been fitted yet.
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        assert!(
            !self.trees.is_empty(),
            "Cannot predict with an unfitted random forest. Call fit() first."
        );

        let n_samples = x.shape().0;
        let mut predictions = vec![0.0; n_samples];

        for tree in &self.trees {
            let tree_preds = tree.predict(x);
            for (pred, &tree_pred) in predictions.iter_mut().zip(tree_preds.as_slice().iter()) {
                *pred += tree_pred;
            }
        }

        let n_trees = self.trees.len() as f32;
        for pred in &mut predictions {
            *pred /= n_trees;
        }

        Vector::from_vec(predictions)
    }

    fn score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> f32 {
        let predictions = self.predict(x);
        crate::metrics::r_squared(y, &predictions)
    }
}

// ========================================================================
// Tree building
// ========================================================================

struct TreeParams {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: Option<usize>,
}

fn mean_f32(y: &[f32]) -> f32 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().sum::<f32>() / y.len() as f32
}

fn variance_f32(y: &[f32]) -> f32 {
    if y.len() <= 1 {
        return 0.0;
    }
    let mean = mean_f32(y);
    let sum_squared_diff: f32 = y.iter().map(|&val| (val - mean).powi(2)).sum();
    sum_squared_diff / y.len() as f32
}

/// Weighted MSE of a candidate split.
fn compute_mse(y_left: &[f32], y_right: &[f32]) -> f32 {
    let n_left = y_left.len() as f32;
    let n_right = y_right.len() as f32;
    let n_total = n_left + n_right;

    if n_total == 0.0 {
        return 0.0;
    }

    (n_left / n_total) * variance_f32(y_left) + (n_right / n_total) * variance_f32(y_right)
}

/// Unique sorted values of one feature column.
fn unique_feature_values(x: &Matrix<f32>, feature_idx: usize, n_samples: usize) -> Vec<f32> {
    let mut values: Vec<f32> = (0..n_samples).map(|i| x.get(i, feature_idx)).collect();
    values.sort_by(|a, b| a.partial_cmp(b).expect("f32 values should be comparable"));
    values.dedup();
    values
}

/// Split target values by a threshold on a feature.
fn split_by_threshold(
    x: &Matrix<f32>,
    y: &[f32],
    feature_idx: usize,
    threshold: f32,
) -> (Vec<f32>, Vec<f32>) {
    let mut y_left = Vec::new();
    let mut y_right = Vec::new();

    for (row, &y_val) in y.iter().enumerate() {
        if x.get(row, feature_idx) <= threshold {
            y_left.push(y_val);
        } else {
            y_right.push(y_val);
        }
    }
    (y_left, y_right)
}

/// Best (threshold, variance gain) for a single feature, if any split helps.
fn best_split_for_feature(
    x: &Matrix<f32>,
    y: &[f32],
    feature_idx: usize,
    n_samples: usize,
    current_variance: f32,
) -> Option<(f32, f32)> {
    let feature_values = unique_feature_values(x, feature_idx, n_samples);
    let mut best_threshold = 0.0;
    let mut best_gain = 0.0;

    for i in 0..feature_values.len().saturating_sub(1) {
        let threshold = (feature_values[i] + feature_values[i + 1]) / 2.0;
        let (y_left, y_right) = split_by_threshold(x, y, feature_idx, threshold);
        if y_left.is_empty() || y_right.is_empty() {
            continue;
        }
        let gain = current_variance - compute_mse(&y_left, &y_right);
        if gain > best_gain {
            best_gain = gain;
            best_threshold = threshold;
        }
    }

    (best_gain > 0.0).then_some((best_threshold, best_gain))
}

/// Candidate feature indices for one split.
fn candidate_features(n_features: usize, max_features: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match max_features {
        Some(m) if m < n_features => {
            rand::seq::index::sample(rng, n_features, m).into_vec()
        }
        _ => (0..n_features).collect(),
    }
}

/// Best split across candidate features using the MSE criterion.
fn find_best_regression_split(
    x: &Matrix<f32>,
    y: &[f32],
    max_features: Option<usize>,
    rng: &mut StdRng,
) -> Option<(usize, f32, f32)> {
    let (n_samples, n_features) = x.shape();

    if n_samples < 2 {
        return None;
    }

    let current_variance = variance_f32(y);
    let mut best_gain = 0.0;
    let mut best_feature = 0;
    let mut best_threshold = 0.0;

    for feature_idx in candidate_features(n_features, max_features, rng) {
        if let Some((threshold, gain)) =
            best_split_for_feature(x, y, feature_idx, n_samples, current_variance)
        {
            if gain > best_gain {
                best_gain = gain;
                best_feature = feature_idx;
                best_threshold = threshold;
            }
        }
    }

    (best_gain > 0.0).then_some((best_feature, best_threshold, best_gain))
}

fn make_regression_leaf(y_slice: &[f32], n_samples: usize) -> RegressionTreeNode {
    RegressionTreeNode::Leaf(RegressionLeaf {
        value: mean_f32(y_slice),
        n_samples,
    })
}

fn at_max_depth(depth: usize, max_depth: Option<usize>) -> bool {
    max_depth.is_some_and(|max_d| depth >= max_d)
}

/// Partition sample indices based on feature threshold.
fn partition_by_threshold(
    x: &Matrix<f32>,
    n_samples: usize,
    feature_idx: usize,
    threshold: f32,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for row in 0..n_samples {
        if x.get(row, feature_idx) <= threshold {
            left.push(row);
        } else {
            right.push(row);
        }
    }
    (left, right)
}

/// Build a regression decision tree recursively.
fn build_regression_tree(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    depth: usize,
    params: &TreeParams,
    rng: &mut StdRng,
) -> RegressionTreeNode {
    let n_samples = y.len();
    let y_slice: Vec<f32> = y.as_slice().to_vec();

    // Early stopping checks
    if n_samples < params.min_samples_split
        || at_max_depth(depth, params.max_depth)
        || variance_f32(&y_slice) < 1e-10
    {
        return make_regression_leaf(&y_slice, n_samples);
    }

    let Some((feature_idx, threshold, _gain)) =
        find_best_regression_split(x, &y_slice, params.max_features, rng)
    else {
        return make_regression_leaf(&y_slice, n_samples);
    };

    let (left_indices, right_indices) =
        partition_by_threshold(x, n_samples, feature_idx, threshold);

    if left_indices.len() < params.min_samples_leaf
        || right_indices.len() < params.min_samples_leaf
    {
        return make_regression_leaf(&y_slice, n_samples);
    }

    let left_matrix = x.select_rows(&left_indices);
    let left_labels: Vec<f32> = left_indices.iter().map(|&i| y_slice[i]).collect();
    let right_matrix = x.select_rows(&right_indices);
    let right_labels: Vec<f32> = right_indices.iter().map(|&i| y_slice[i]).collect();

    let left_child =
        build_regression_tree(&left_matrix, &Vector::from_vec(left_labels), depth + 1, params, rng);
    let right_child = build_regression_tree(
        &right_matrix,
        &Vector::from_vec(right_labels),
        depth + 1,
        params,
        rng,
    );

    RegressionTreeNode::Node(RegressionNode {
        feature_idx,
        threshold,
        left: Box::new(left_child),
        right: Box::new(right_child),
    })
}

/// Bootstrap sample of `n_samples` indices (with replacement).
fn bootstrap_sample(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    use rand::distributions::{Distribution, Uniform};

    let dist = Uniform::from(0..n_samples);
    let mut indices = Vec::with_capacity(n_samples);

    if let Some(seed) = random_state {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    } else {
        let mut rng = rand::thread_rng();
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    }

    indices
}
