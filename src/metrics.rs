//! Regression evaluation metrics.

use crate::primitives::Vector;

/// R² coefficient of determination.
///
/// Returns 1.0 for perfect predictions, 0.0 for a model no better than
/// predicting the mean, and negative values for worse-than-mean models.
///
/// # Panics
///
/// Panics if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use tarifa::metrics::r_squared;
/// use tarifa::primitives::Vector;
///
/// let y_true = Vector::from_slice(&[100.0, 150.0, 200.0]);
/// let y_pred = Vector::from_slice(&[100.0, 150.0, 200.0]);
/// assert!((r_squared(&y_true, &y_pred) - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn r_squared(y_true: &Vector<f32>, y_pred: &Vector<f32>) -> f32 {
    assert_eq!(
        y_true.len(),
        y_pred.len(),
        "r_squared: vector lengths must match"
    );

    let mean = y_true.mean();
    let ss_tot: f32 = y_true.iter().map(|&y| (y - mean).powi(2)).sum();
    let ss_res: f32 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        // Constant target: perfect iff residuals are zero.
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

/// Mean squared error.
///
/// # Panics
///
/// Panics if the vectors differ in length.
#[must_use]
pub fn mse(y_true: &Vector<f32>, y_pred: &Vector<f32>) -> f32 {
    assert_eq!(y_true.len(), y_pred.len(), "mse: vector lengths must match");
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f32 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();
    sum / y_true.len() as f32
}

/// Mean absolute error.
///
/// # Panics
///
/// Panics if the vectors differ in length.
#[must_use]
pub fn mae(y_true: &Vector<f32>, y_pred: &Vector<f32>) -> f32 {
    assert_eq!(y_true.len(), y_pred.len(), "mae: vector lengths must match");
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f32 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).abs())
        .sum();
    sum / y_true.len() as f32
}
