//! Core traits for estimators and transformers.
//!
//! These traits define the API contracts for the pipeline stages and
//! both regression stages of the pricing estimator.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};

/// Primary trait for supervised learning estimators.
///
/// Estimators implement fit/predict/score following sklearn conventions.
///
/// # Examples
///
/// ```
/// use tarifa::prelude::*;
/// use tarifa::tree::RandomForestRegressor;
///
/// // Toy fare data: price grows linearly with distance
/// let x = Matrix::from_vec(5, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
/// let y = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
///
/// let mut forest = RandomForestRegressor::new(5).with_random_state(42);
/// forest.fit(&x, &y).unwrap();
/// let predictions = forest.predict(&x);
/// assert_eq!(predictions.len(), 5);
/// ```
pub trait Estimator {
    /// Fits the model to training data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (dimension mismatch, empty data, etc.).
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()>;

    /// Predicts target values for input data.
    fn predict(&self, x: &Matrix<f32>) -> Vector<f32>;

    /// Computes the R² score on test data.
    fn score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> f32;
}

/// Trait for data transformers (scalers, encoders, the feature pipeline).
///
/// Fitted state (medians, scale factors, category vocabularies) is
/// captured by `fit` and reused verbatim by every subsequent `transform`;
/// transform never recomputes statistics.
pub trait Transformer {
    /// Fits the transformer to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()>;

    /// Transforms data using fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the transformer is not fitted or the input
    /// schema differs from fit time.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Fits and transforms in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit_transform(&mut self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TarifaError;

    // Minimal transformer to exercise the trait's default method.
    struct HalvingTransformer {
        fitted: bool,
    }

    impl Transformer for HalvingTransformer {
        fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
            if x.n_rows() == 0 {
                return Err("Cannot fit with zero samples".into());
            }
            self.fitted = true;
            Ok(())
        }

        fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
            if !self.fitted {
                return Err(TarifaError::not_fitted("HalvingTransformer"));
            }
            let data: Vec<f32> = x.as_slice().iter().map(|v| v / 2.0).collect();
            Matrix::from_vec(x.n_rows(), x.n_cols(), data).map_err(Into::into)
        }
    }

    #[test]
    fn test_fit_transform_default_method() {
        let mut t = HalvingTransformer { fitted: false };
        let x = Matrix::from_vec(2, 2, vec![2.0_f32, 4.0, 6.0, 8.0]).expect("matrix");
        let out = t.fit_transform(&x).expect("fit_transform");
        assert_eq!(out.get(0, 0), 1.0);
        assert_eq!(out.get(1, 1), 4.0);
        assert!(t.fitted);
    }

    #[test]
    fn test_transform_before_fit_errors() {
        let t = HalvingTransformer { fitted: false };
        let x = Matrix::from_vec(1, 1, vec![1.0_f32]).expect("matrix");
        let err = t.transform(&x).unwrap_err();
        assert!(matches!(err, TarifaError::NotFitted { .. }));
    }

    #[test]
    fn test_fit_transform_propagates_fit_error() {
        let mut t = HalvingTransformer { fitted: false };
        let x = Matrix::from_vec(0, 2, vec![]).expect("matrix");
        assert!(t.fit_transform(&x).is_err());
    }
}
