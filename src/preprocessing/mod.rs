//! Preprocessing transformers for the pricing feature pipeline.
//!
//! The pipeline mirrors a column-transformer layout: a numeric branch
//! (median imputation + standardization) for the distance, a categorical
//! branch (most-frequent imputation + one-hot encoding) for the two ride
//! flags, and a passthrough branch for the derived interaction terms.
//!
//! # Example
//!
//! ```
//! use tarifa::prelude::*;
//! use tarifa::preprocessing::FeaturePipeline;
//!
//! // [distance_km, priority, carpool, distance², priority·distance]
//! let raw = Matrix::from_vec(4, 5, vec![
//!     5.0, 0.0, 0.0, 25.0, 0.0,
//!     10.0, 1.0, 0.0, 100.0, 10.0,
//!     15.0, 0.0, 1.0, 225.0, 0.0,
//!     20.0, 1.0, 1.0, 400.0, 20.0,
//! ]).expect("valid matrix dimensions");
//!
//! let mut pipeline = FeaturePipeline::new();
//! let features = pipeline.fit_transform(&raw).expect("fit_transform should succeed");
//!
//! // 1 scaled distance + 2 priority categories + 2 carpool categories + 2 passthrough
//! assert_eq!(features.n_cols(), 7);
//! ```

use crate::error::{Result, TarifaError};
use crate::primitives::Matrix;
use crate::traits::Transformer;
use serde::{Deserialize, Serialize};

/// Standardizes features by removing mean and scaling to unit variance.
///
/// The standard score of a sample x is: z = (x - mean) / std.
/// Missing (NaN) entries are imputed with the training-set median before
/// scaling; the median is fixed at fit time and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Median of each feature over non-missing fit values.
    median: Option<Vec<f32>>,
    /// Mean of each feature (computed during fit, after imputation).
    mean: Option<Vec<f32>>,
    /// Standard deviation of each feature (computed during fit).
    std: Option<Vec<f32>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    /// Creates a new `StandardScaler`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            median: None,
            mean: None,
            std: None,
        }
    }

    /// Returns true if the scaler has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Returns the fit-time mean of each feature.
    ///
    /// # Panics
    ///
    /// Panics if the scaler is not fitted.
    #[must_use]
    pub fn mean(&self) -> &[f32] {
        self.mean
            .as_ref()
            .expect("Scaler not fitted. Call fit() first.")
    }

    /// Returns the fit-time standard deviation of each feature.
    ///
    /// # Panics
    ///
    /// Panics if the scaler is not fitted.
    #[must_use]
    pub fn std(&self) -> &[f32] {
        self.std
            .as_ref()
            .expect("Scaler not fitted. Call fit() first.")
    }
}

/// Median of non-NaN values in a column; 0.0 when every value is missing.
fn column_median(values: &[f32]) -> f32 {
    let mut present: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return 0.0;
    }
    present.sort_by(|a, b| a.partial_cmp(b).expect("non-NaN values are comparable"));
    let n = present.len();
    if n % 2 == 1 {
        present[n / 2]
    } else {
        (present[n / 2 - 1] + present[n / 2]) / 2.0
    }
}

impl Transformer for StandardScaler {
    /// Computes the median, mean, and standard deviation of each feature.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        let mut median = vec![0.0; n_features];
        let mut mean = vec![0.0; n_features];
        let mut std = vec![0.0; n_features];

        for j in 0..n_features {
            let col = x.column(j);
            median[j] = column_median(col.as_slice());

            // Mean and std over the imputed column, matching an
            // impute-then-scale pipeline.
            let imputed: Vec<f32> = col
                .iter()
                .map(|v| if v.is_nan() { median[j] } else { *v })
                .collect();
            let m: f32 = imputed.iter().sum::<f32>() / n_samples as f32;
            mean[j] = m;
            let sum_sq: f32 = imputed.iter().map(|v| (v - m).powi(2)).sum();
            // Population std (divide by n, not n-1).
            std[j] = (sum_sq / n_samples as f32).sqrt();
        }

        self.median = Some(median);
        self.mean = Some(mean);
        self.std = Some(std);

        Ok(())
    }

    /// Standardizes the data using fitted median, mean, and std.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let median = self
            .median
            .as_ref()
            .ok_or_else(|| TarifaError::not_fitted("StandardScaler"))?;
        let mean = self
            .mean
            .as_ref()
            .ok_or_else(|| TarifaError::not_fitted("StandardScaler"))?;
        let std = self
            .std
            .as_ref()
            .ok_or_else(|| TarifaError::not_fitted("StandardScaler"))?;

        let (n_samples, n_features) = x.shape();
        if n_features != mean.len() {
            return Err(TarifaError::DimensionMismatch {
                expected: format!("{} features", mean.len()),
                actual: format!("{n_features} features"),
            });
        }

        let mut result = vec![0.0; n_samples * n_features];
        for i in 0..n_samples {
            for j in 0..n_features {
                let raw = x.get(i, j);
                let mut val = if raw.is_nan() { median[j] } else { raw };
                val -= mean[j];
                if std[j] > 1e-10 {
                    val /= std[j];
                }
                result[i * n_features + j] = val;
            }
        }

        Matrix::from_vec(n_samples, n_features, result).map_err(Into::into)
    }
}

/// One-hot encodes categorical columns using a fit-time vocabulary.
///
/// Missing (NaN) entries are imputed with the per-column most-frequent
/// value observed during fitting. Categories unseen at fit time encode
/// as all zeros rather than erroring, so inference never fails on a
/// novel flag value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted category vocabulary per column (fixed at fit).
    categories: Option<Vec<Vec<f32>>>,
    /// Most frequent value per column, used to impute NaN.
    most_frequent: Option<Vec<f32>>,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    /// Creates a new `OneHotEncoder`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            categories: None,
            most_frequent: None,
        }
    }

    /// Returns true if the encoder has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.categories.is_some()
    }

    /// Total number of output columns (sum of vocabulary sizes).
    ///
    /// # Panics
    ///
    /// Panics if the encoder is not fitted.
    #[must_use]
    pub fn output_width(&self) -> usize {
        self.categories
            .as_ref()
            .expect("Encoder not fitted. Call fit() first.")
            .iter()
            .map(Vec::len)
            .sum()
    }

    /// The category vocabulary for each input column.
    ///
    /// # Panics
    ///
    /// Panics if the encoder is not fitted.
    #[must_use]
    pub fn categories(&self) -> &[Vec<f32>] {
        self.categories
            .as_ref()
            .expect("Encoder not fitted. Call fit() first.")
    }
}

/// Most frequent non-NaN value in a column; ties break toward the
/// smallest value. Returns 0.0 when every value is missing.
fn column_most_frequent(values: &[f32]) -> f32 {
    let mut present: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return 0.0;
    }
    present.sort_by(|a, b| a.partial_cmp(b).expect("non-NaN values are comparable"));

    let mut best_value = present[0];
    let mut best_count = 0usize;
    let mut run_value = present[0];
    let mut run_count = 0usize;
    for &v in &present {
        if v == run_value {
            run_count += 1;
        } else {
            run_value = v;
            run_count = 1;
        }
        if run_count > best_count {
            best_count = run_count;
            best_value = run_value;
        }
    }
    best_value
}

impl Transformer for OneHotEncoder {
    /// Learns the per-column category vocabulary and imputation value.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        let mut categories = Vec::with_capacity(n_features);
        let mut most_frequent = Vec::with_capacity(n_features);

        for j in 0..n_features {
            let col = x.column(j);
            let fill = column_most_frequent(col.as_slice());
            most_frequent.push(fill);

            let mut vocab: Vec<f32> = col
                .iter()
                .map(|v| if v.is_nan() { fill } else { *v })
                .collect();
            vocab.sort_by(|a, b| a.partial_cmp(b).expect("non-NaN values are comparable"));
            vocab.dedup();
            categories.push(vocab);
        }

        self.categories = Some(categories);
        self.most_frequent = Some(most_frequent);

        Ok(())
    }

    /// Encodes each column against its fit-time vocabulary.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let categories = self
            .categories
            .as_ref()
            .ok_or_else(|| TarifaError::not_fitted("OneHotEncoder"))?;
        let most_frequent = self
            .most_frequent
            .as_ref()
            .ok_or_else(|| TarifaError::not_fitted("OneHotEncoder"))?;

        let (n_samples, n_features) = x.shape();
        if n_features != categories.len() {
            return Err(TarifaError::DimensionMismatch {
                expected: format!("{} features", categories.len()),
                actual: format!("{n_features} features"),
            });
        }

        let width: usize = categories.iter().map(Vec::len).sum();
        let mut result = vec![0.0; n_samples * width];

        for i in 0..n_samples {
            let mut offset = 0;
            for j in 0..n_features {
                let raw = x.get(i, j);
                let val = if raw.is_nan() { most_frequent[j] } else { raw };
                // Unseen categories leave the whole block at zero.
                if let Some(pos) = categories[j].iter().position(|&c| c == val) {
                    result[i * width + offset + pos] = 1.0;
                }
                offset += categories[j].len();
            }
        }

        Matrix::from_vec(n_samples, width, result).map_err(Into::into)
    }
}

/// Number of raw input columns the pipeline expects:
/// `[distance_km, priority, carpool, distance_squared,
/// priority_distance_interaction]`.
pub const RAW_FEATURE_COUNT: usize = 5;

/// The full feature pipeline for ride samples.
///
/// Output column order is fixed at fit time and reproduced exactly by
/// every `transform` call:
///
/// ```text
/// [scaled distance | one-hot priority | one-hot carpool |
///  distance_squared | priority_distance_interaction]
/// ```
///
/// With both flags taking both values during fitting this yields the
/// reference width of 7 columns; every downstream stage is sized to
/// whatever width fitting produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePipeline {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    output_width: Option<usize>,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturePipeline {
    /// Creates an unfitted pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scaler: StandardScaler::new(),
            encoder: OneHotEncoder::new(),
            output_width: None,
        }
    }

    /// Returns true once `fit` has run.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.output_width.is_some()
    }

    /// Width of the engineered feature vector, fixed at fit time.
    #[must_use]
    pub fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn check_schema(x: &Matrix<f32>) -> Result<()> {
        if x.n_cols() != RAW_FEATURE_COUNT {
            return Err(TarifaError::SchemaMismatch {
                expected: RAW_FEATURE_COUNT,
                actual: x.n_cols(),
            });
        }
        Ok(())
    }

    /// Extracts the single numeric column (distance) as an n×1 matrix.
    fn numeric_block(x: &Matrix<f32>) -> Matrix<f32> {
        let n = x.n_rows();
        let data = x.column(0).as_slice().to_vec();
        Matrix::from_vec(n, 1, data).expect("n x 1 block")
    }

    /// Extracts the two flag columns as an n×2 matrix.
    fn categorical_block(x: &Matrix<f32>) -> Matrix<f32> {
        let n = x.n_rows();
        let mut data = Vec::with_capacity(n * 2);
        for i in 0..n {
            data.push(x.get(i, 1));
            data.push(x.get(i, 2));
        }
        Matrix::from_vec(n, 2, data).expect("n x 2 block")
    }
}

impl Transformer for FeaturePipeline {
    /// Fits the numeric and categorical branches and fixes the output width.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        Self::check_schema(x)?;
        if x.n_rows() == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        self.scaler.fit(&Self::numeric_block(x))?;
        self.encoder.fit(&Self::categorical_block(x))?;
        self.output_width = Some(1 + self.encoder.output_width() + 2);
        Ok(())
    }

    /// Assembles `[scaled distance | one-hot flags | passthrough terms]`.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let width = self
            .output_width
            .ok_or_else(|| TarifaError::not_fitted("FeaturePipeline"))?;
        Self::check_schema(x)?;

        let scaled = self.scaler.transform(&Self::numeric_block(x))?;
        let encoded = self.encoder.transform(&Self::categorical_block(x))?;

        let n = x.n_rows();
        let enc_width = encoded.n_cols();
        let mut result = vec![0.0; n * width];
        for i in 0..n {
            result[i * width] = scaled.get(i, 0);
            for k in 0..enc_width {
                result[i * width + 1 + k] = encoded.get(i, k);
            }
            result[i * width + 1 + enc_width] = x.get(i, 3);
            result[i * width + 2 + enc_width] = x.get(i, 4);
        }

        Matrix::from_vec(n, width, result).map_err(Into::into)
    }
}
