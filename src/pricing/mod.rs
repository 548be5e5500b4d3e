//! Ride-fare pricing: the ensemble estimator, training data handling,
//! rule-based fare blending, and the swappable model handle.
//!
//! The estimator fits two models on identical engineered features: a
//! random forest learning the final price directly and a feed-forward
//! network learning the *reward* (price minus the base distance cost).
//! Their unweighted average is the model estimate that quoting averages
//! with the rule-based fare.

pub mod data;
pub mod fare;
pub mod handle;

use crate::error::{Result, TarifaError};
use crate::nn::FeedForwardRegressor;
use crate::preprocessing::{FeaturePipeline, RAW_FEATURE_COUNT};
use crate::primitives::{Matrix, Vector};
use crate::traits::{Estimator, Transformer};
use crate::tree::RandomForestRegressor;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub use data::{
    load_ride_log, prepare_training_data, synthetic_training_data, train_and_save,
    DataProvenance, TrainingReport, MIN_HISTORICAL_ROWS, SYNTHETIC_ROWS,
};
pub use fare::{quote_fare, rule_fare, PriceQuote, PriceSource, MIN_RATE_PER_KM};
pub use handle::ModelHandle;

/// Base per-kilometer cost. Subtracted from prices to form the reward
/// target the network learns, and the base of the rule-based fare.
pub const BASE_RATE_PER_KM: f32 = 10.0;

/// Default random state for training when none is supplied.
pub const DEFAULT_SEED: u64 = 42;

/// One ride request as seen by the pricing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RideSample {
    /// Trip distance in kilometers.
    pub distance_km: f32,
    /// Priority service requested (skip-the-queue).
    pub priority: bool,
    /// Carpool (shared ride) requested.
    pub carpool: bool,
}

impl RideSample {
    /// Raw feature row in pipeline order:
    /// `[distance, priority, carpool, distance², priority·distance]`.
    #[must_use]
    pub fn raw_features(&self) -> [f32; RAW_FEATURE_COUNT] {
        let d = self.distance_km;
        let p = f32::from(u8::from(self.priority));
        let c = f32::from(u8::from(self.carpool));
        [d, p, c, d * d, p * d]
    }
}

/// The two-stage price estimator.
///
/// Owns the fitted feature pipeline and both model stages, so a saved
/// file restores everything inference needs.
///
/// # Examples
///
/// ```
/// use tarifa::pricing::{synthetic_training_data, PricingModel, RideSample};
///
/// let (x, y) = synthetic_training_data(42);
/// let mut model = PricingModel::new().with_forest_size(5);
/// model.train(&x, &y).expect("training should succeed");
///
/// let ride = RideSample { distance_km: 10.0, priority: false, carpool: false };
/// let estimate = model.predict_one(&ride).expect("model is trained");
/// assert!(estimate.is_finite());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingModel {
    pipeline: FeaturePipeline,
    forest: RandomForestRegressor,
    residual_net: FeedForwardRegressor,
    random_state: u64,
    forest_size: usize,
}

impl Default for PricingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingModel {
    /// Creates an untrained model with the default 100-tree forest and
    /// seed 42.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: FeaturePipeline::new(),
            forest: RandomForestRegressor::new(100),
            residual_net: FeedForwardRegressor::new(),
            random_state: DEFAULT_SEED,
            forest_size: 100,
        }
    }

    /// Sets the random state used to seed both models.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Sets the number of trees in the forest stage.
    #[must_use]
    pub fn with_forest_size(mut self, n_trees: usize) -> Self {
        self.forest_size = n_trees.max(1);
        self
    }

    /// Returns true once `train` has completed.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.pipeline.is_fitted() && self.forest.is_fitted() && self.residual_net.is_fitted()
    }

    /// Trains the pipeline and both model stages.
    ///
    /// `x_raw` holds the 5 raw feature columns; `prices` are the observed
    /// final prices. The forest learns the price directly; the network
    /// learns the reward `price - BASE_RATE_PER_KM * distance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the raw matrix doesn't match the expected
    /// schema or either model fails to fit.
    pub fn train(&mut self, x_raw: &Matrix<f32>, prices: &Vector<f32>) -> Result<()> {
        if x_raw.n_rows() != prices.len() {
            return Err("Number of samples in X and prices must match".into());
        }

        let features = self.pipeline.fit_transform(x_raw)?;

        self.forest = RandomForestRegressor::new(self.forest_size)
            .with_random_state(self.random_state);
        self.forest.fit(&features, prices)?;

        let rewards = Vector::from_vec(
            (0..x_raw.n_rows())
                .map(|i| prices.get(i) - BASE_RATE_PER_KM * x_raw.get(i, 0))
                .collect(),
        );

        // Offset the seed so the net's init stream is independent of the
        // forest's bootstrap stream.
        self.residual_net =
            FeedForwardRegressor::new().with_random_state(self.random_state.wrapping_add(1));
        self.residual_net.fit(&features, &rewards)?;

        Ok(())
    }

    /// Model estimates for a batch of raw feature rows: the unweighted
    /// average of the forest's price and the network's reward.
    ///
    /// # Errors
    ///
    /// Returns a not-fitted error before training and a schema mismatch
    /// when the raw matrix has the wrong column count.
    pub fn predict(&self, x_raw: &Matrix<f32>) -> Result<Vector<f32>> {
        if !self.is_fitted() {
            return Err(TarifaError::not_fitted("PricingModel"));
        }

        let features = self.pipeline.transform(x_raw)?;
        let forest_prices = self.forest.predict(&features);
        let net_rewards = self.residual_net.predict(&features);

        let estimates = (0..x_raw.n_rows())
            .map(|i| (forest_prices.get(i) + net_rewards.get(i)) / 2.0)
            .collect();
        Ok(Vector::from_vec(estimates))
    }

    /// Model estimate for a single ride.
    ///
    /// # Errors
    ///
    /// Returns a not-fitted error before training.
    pub fn predict_one(&self, ride: &RideSample) -> Result<f32> {
        let raw = ride.raw_features();
        let x = Matrix::from_vec(1, RAW_FEATURE_COUNT, raw.to_vec())?;
        Ok(self.predict(&x)?.get(0))
    }

    /// Saves the trained model as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is untrained or the file can't be
    /// written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.is_fitted() {
            return Err(TarifaError::not_fitted("PricingModel"));
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self)
            .map_err(|e| TarifaError::Serialization(e.to_string()))
    }

    /// Loads a trained model from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or doesn't contain a
    /// valid model.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| TarifaError::Serialization(e.to_string()))
    }
}
