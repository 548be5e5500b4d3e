//! Feed-forward residual network: the second stage of the price estimator.
//!
//! A small fully-connected ReLU network trained with Adam on full-batch
//! gradients. The default shape (two hidden layers of 24 units, scalar
//! output) matches the reward-residual regressor in the pricing ensemble.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};
use crate::traits::Estimator;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Fully-connected layer: `weight` is (out_features x in_features),
/// row-major, so forward is `z = x * weight^T + bias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dense {
    weight: Matrix<f32>,
    bias: Vec<f32>,
}

impl Dense {
    /// Kaiming uniform initialization: U(-b, b) with b = sqrt(6 / fan_in),
    /// the standard choice for ReLU activations. Biases start at zero.
    fn kaiming_uniform(in_features: usize, out_features: usize, seed: u64) -> Self {
        let bound = (6.0 / in_features as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let mut rng = StdRng::seed_from_u64(seed);

        let data: Vec<f32> = (0..out_features * in_features)
            .map(|_| dist.sample(&mut rng))
            .collect();
        let weight = Matrix::from_vec(out_features, in_features, data)
            .expect("weight dimensions are consistent by construction");

        Self {
            weight,
            bias: vec![0.0; out_features],
        }
    }

    fn in_features(&self) -> usize {
        self.weight.n_cols()
    }

    fn out_features(&self) -> usize {
        self.weight.n_rows()
    }

    /// Pre-activation output: `x * weight^T + bias`, shape (n x out).
    fn forward(&self, x: &Matrix<f32>) -> Matrix<f32> {
        let n = x.n_rows();
        let out = self.out_features();
        let fan_in = self.in_features();
        debug_assert_eq!(x.n_cols(), fan_in);

        let mut z = Matrix::zeros(n, out);
        for row in 0..n {
            for j in 0..out {
                let mut acc = self.bias[j];
                for k in 0..fan_in {
                    acc += x.get(row, k) * self.weight.get(j, k);
                }
                z.set(row, j, acc);
            }
        }
        z
    }
}

fn relu(z: &Matrix<f32>) -> Matrix<f32> {
    let mut a = z.clone();
    for row in 0..a.n_rows() {
        for col in 0..a.n_cols() {
            if a.get(row, col) < 0.0 {
                a.set(row, col, 0.0);
            }
        }
    }
    a
}

/// Gradient w.r.t. weights: `delta^T * activations`, shape (out x in).
fn weight_gradient(delta: &Matrix<f32>, activations: &Matrix<f32>) -> Matrix<f32> {
    let n = delta.n_rows();
    let out = delta.n_cols();
    let fan_in = activations.n_cols();

    let mut grad = Matrix::zeros(out, fan_in);
    for j in 0..out {
        for k in 0..fan_in {
            let mut acc = 0.0;
            for row in 0..n {
                acc += delta.get(row, j) * activations.get(row, k);
            }
            grad.set(j, k, acc);
        }
    }
    grad
}

/// Gradient w.r.t. biases: column sums of `delta`.
fn bias_gradient(delta: &Matrix<f32>) -> Vec<f32> {
    let mut grad = vec![0.0; delta.n_cols()];
    for row in 0..delta.n_rows() {
        for (j, g) in grad.iter_mut().enumerate() {
            *g += delta.get(row, j);
        }
    }
    grad
}

/// Backpropagated delta: `(delta * weight) ⊙ relu'(z_prev)`.
fn backprop_delta(delta: &Matrix<f32>, layer: &Dense, z_prev: &Matrix<f32>) -> Matrix<f32> {
    let n = delta.n_rows();
    let out = layer.out_features();
    let fan_in = layer.in_features();

    let mut prev = Matrix::zeros(n, fan_in);
    for row in 0..n {
        for k in 0..fan_in {
            if z_prev.get(row, k) <= 0.0 {
                continue;
            }
            let mut acc = 0.0;
            for j in 0..out {
                acc += delta.get(row, j) * layer.weight.get(j, k);
            }
            prev.set(row, k, acc);
        }
    }
    prev
}

/// Adam optimizer state for one parameter tensor (flattened).
struct AdamState {
    m: Vec<f32>,
    v: Vec<f32>,
}

impl AdamState {
    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    /// One Adam step with bias correction at timestep `t` (1-based).
    fn update(&mut self, params: &mut [f32], grads: &[f32], lr: f32, t: u32) {
        const BETA1: f32 = 0.9;
        const BETA2: f32 = 0.999;
        const EPSILON: f32 = 1e-8;

        let bias1 = 1.0 - BETA1.powi(t as i32);
        let bias2 = 1.0 - BETA2.powi(t as i32);

        for ((p, &g), (m, v)) in params
            .iter_mut()
            .zip(grads.iter())
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
        }
    }
}

/// Feed-forward regressor with ReLU hidden layers and a linear output.
///
/// Trained full-batch with Adam. Layer initialization and therefore
/// training is deterministic given `with_random_state`.
///
/// # Examples
///
/// ```
/// use tarifa::prelude::*;
/// use tarifa::nn::FeedForwardRegressor;
///
/// let x = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
/// let y = Vector::from_slice(&[0.0, 2.0, 4.0, 6.0]);
///
/// let mut net = FeedForwardRegressor::new()
///     .with_hidden_layers(&[8])
///     .with_epochs(200)
///     .with_random_state(42);
/// net.fit(&x, &y).expect("fit should succeed");
/// assert_eq!(net.predict(&x).len(), 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedForwardRegressor {
    layers: Vec<Dense>,
    hidden_layers: Vec<usize>,
    learning_rate: f32,
    epochs: usize,
    random_state: Option<u64>,
}

impl FeedForwardRegressor {
    /// Creates a regressor with two hidden layers of 24 units,
    /// learning rate 1e-3, and 50 epochs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            hidden_layers: vec![24, 24],
            learning_rate: 1e-3,
            epochs: 50,
            random_state: None,
        }
    }

    /// Sets the hidden layer widths.
    #[must_use]
    pub fn with_hidden_layers(mut self, sizes: &[usize]) -> Self {
        self.hidden_layers = sizes.to_vec();
        self
    }

    /// Sets the Adam learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the number of full-batch training epochs.
    #[must_use]
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets the random state for reproducible weight initialization.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Returns true once the network has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.layers.is_empty()
    }

    fn init_layers(&mut self, n_features: usize) {
        let base_seed = self.random_state.unwrap_or_else(rand::random);

        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(n_features);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(1);

        self.layers = sizes
            .windows(2)
            .enumerate()
            .map(|(idx, pair)| {
                Dense::kaiming_uniform(pair[0], pair[1], base_seed.wrapping_add(idx as u64))
            })
            .collect();
    }

    /// Forward pass caching pre-activations and activations per layer.
    /// `activations[0]` is the input; `pre_activations[i]` is layer i's z.
    fn forward_cached(&self, x: &Matrix<f32>) -> (Vec<Matrix<f32>>, Vec<Matrix<f32>>) {
        let n_layers = self.layers.len();
        let mut pre_activations = Vec::with_capacity(n_layers);
        let mut activations = Vec::with_capacity(n_layers + 1);
        activations.push(x.clone());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&activations[i]);
            // Hidden layers use ReLU; the output layer is linear.
            let a = if i + 1 < n_layers { relu(&z) } else { z.clone() };
            pre_activations.push(z);
            activations.push(a);
        }

        (pre_activations, activations)
    }
}

impl Default for FeedForwardRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for FeedForwardRegressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        self.init_layers(n_features);
        let n_layers = self.layers.len();

        // Optimizer state is training-only; it never persists with the model.
        let mut weight_states: Vec<AdamState> = self
            .layers
            .iter()
            .map(|l| AdamState::new(l.weight.as_slice().len()))
            .collect();
        let mut bias_states: Vec<AdamState> = self
            .layers
            .iter()
            .map(|l| AdamState::new(l.bias.len()))
            .collect();

        let scale = 2.0 / n_samples as f32;

        for epoch in 0..self.epochs {
            let (pre_activations, activations) = self.forward_cached(x);

            // MSE gradient at the linear output.
            let output = &pre_activations[n_layers - 1];
            let mut delta = Matrix::zeros(n_samples, 1);
            for row in 0..n_samples {
                delta.set(row, 0, scale * (output.get(row, 0) - y.get(row)));
            }

            let t = (epoch + 1) as u32;
            for i in (0..n_layers).rev() {
                let w_grad = weight_gradient(&delta, &activations[i]);
                let b_grad = bias_gradient(&delta);

                if i > 0 {
                    delta = backprop_delta(&delta, &self.layers[i], &pre_activations[i - 1]);
                }

                weight_states[i].update(
                    self.layers[i].weight.as_mut_slice(),
                    w_grad.as_slice(),
                    self.learning_rate,
                    t,
                );
                bias_states[i].update(
                    &mut self.layers[i].bias,
                    b_grad.as_slice(),
                    self.learning_rate,
                    t,
                );
            }
        }

        Ok(())
    }

    /// Predicts target values for samples.
    ///
    /// # Panics
    ///
    /// Panics if called before `fit`.
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32> {
        assert!(
            !self.layers.is_empty(),
            "Cannot predict with an unfitted network. Call fit() first."
        );

        let n_layers = self.layers.len();
        let mut current = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&current);
            current = if i + 1 < n_layers { relu(&z) } else { z };
        }

        Vector::from_vec((0..current.n_rows()).map(|row| current.get(row, 0)).collect())
    }

    fn score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> f32 {
        let predictions = self.predict(x);
        crate::metrics::r_squared(y, &predictions)
    }
}

#[cfg(test)]
mod tests;
