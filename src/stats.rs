//! Descriptive statistics used by the training driver.
//!
//! Only the quantile machinery needed for the outlier fence lives here.

use crate::error::{Result, TarifaError};

/// Compute a quantile using linear interpolation (R-7 method).
///
/// The method from Hyndman & Fan (1996), as used by R, `NumPy`, and
/// Pandas, so fences computed here match the reference pipeline's
/// `quantile(0.05)` / `quantile(0.95)` exactly.
///
/// # Errors
///
/// Returns an error if `values` is empty, `q` is outside [0, 1], or any
/// value is NaN.
///
/// # Examples
///
/// ```
/// use tarifa::stats::quantile;
///
/// let distances = [1.0_f32, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(quantile(&distances, 0.5).unwrap(), 3.0);
/// assert_eq!(quantile(&distances, 0.0).unwrap(), 1.0);
/// assert_eq!(quantile(&distances, 1.0).unwrap(), 5.0);
/// ```
pub fn quantile(values: &[f32], q: f64) -> Result<f32> {
    if values.is_empty() {
        return Err("Cannot compute quantile of empty slice".into());
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(TarifaError::InvalidHyperparameter {
            param: "q".to_string(),
            value: format!("{q}"),
            constraint: "0 <= q <= 1".to_string(),
        });
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err("Cannot compute quantile with NaN values".into());
    }

    let n = values.len();
    if n == 1 {
        return Ok(values[0]);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| {
        a.partial_cmp(b)
            .expect("f32 values should be comparable (not NaN)")
    });

    // R-7: h = (n - 1) * q, interpolate between floor and ceil positions.
    let h = (n - 1) as f64 * q;
    let h_floor = h.floor() as usize;
    let h_ceil = h.ceil() as usize;

    if h_floor == h_ceil {
        return Ok(sorted[h_floor]);
    }

    let lower = sorted[h_floor];
    let upper = sorted[h_ceil];
    let fraction = (h - h_floor as f64) as f32;
    Ok(lower + fraction * (upper - lower))
}

/// Interquartile-style fence over the 5th/95th quantiles.
///
/// Returns `(lower, upper)` bounds: values outside
/// `[q05 - 1.5 * (q95 - q05), q95 + 1.5 * (q95 - q05)]` are outliers.
///
/// # Errors
///
/// Propagates quantile errors (empty input, NaN values).
pub fn outlier_fence(values: &[f32]) -> Result<(f32, f32)> {
    let q1 = quantile(values, 0.05)?;
    let q3 = quantile(values, 0.95)?;
    let iqr = q3 - q1;
    Ok((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_median_odd() {
        let v = [5.0_f32, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(quantile(&v, 0.5).expect("median"), 3.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0_f32, 2.0, 3.0, 4.0];
        // h = 3 * 0.5 = 1.5 -> between 2.0 and 3.0
        assert!((quantile(&v, 0.5).expect("median") - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_quantile_single_element() {
        assert_eq!(quantile(&[7.0_f32], 0.9).expect("quantile"), 7.0);
    }

    #[test]
    fn test_quantile_empty_errors() {
        assert!(quantile(&[], 0.5).is_err());
    }

    #[test]
    fn test_quantile_out_of_range_errors() {
        assert!(quantile(&[1.0_f32], 1.5).is_err());
        assert!(quantile(&[1.0_f32], -0.1).is_err());
    }

    #[test]
    fn test_quantile_nan_errors() {
        assert!(quantile(&[1.0_f32, f32::NAN], 0.5).is_err());
    }

    #[test]
    fn test_outlier_fence_uniform_data() {
        // 1..=100: q05 = 5.95, q95 = 95.05, iqr = 89.1
        let v: Vec<f32> = (1..=100).map(|i| i as f32).collect();
        let (lo, hi) = outlier_fence(&v).expect("fence");
        assert!(lo < 1.0);
        assert!(hi > 100.0);
    }

    #[test]
    fn test_outlier_fence_excludes_extreme_point() {
        let mut v: Vec<f32> = vec![10.0; 50];
        for (i, val) in v.iter_mut().enumerate().take(50) {
            *val += i as f32 * 0.1;
        }
        v.push(10_000.0);
        let (_, hi) = outlier_fence(&v).expect("fence");
        assert!(hi < 10_000.0, "extreme value should fall outside the fence");
    }
}
