//! Train/test splitting for the training driver.
//!
//! The stratified variant keeps the joint distribution of the categorical
//! flags balanced across splits, which matters for the small ride logs
//! the driver typically sees.

use crate::error::{Result, TarifaError};
use crate::primitives::{Matrix, Vector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Split output: `(x_train, x_test, y_train, y_test)`.
pub type SplitResult = (Matrix<f32>, Matrix<f32>, Vector<f32>, Vector<f32>);

fn validate_split_inputs(x: &Matrix<f32>, y: &Vector<f32>, test_size: f64) -> Result<()> {
    let n_samples = x.shape().0;
    if n_samples != y.len() {
        return Err("Number of samples in X and y must match".into());
    }
    if n_samples < 2 {
        return Err(TarifaError::data_validation(format!(
            "cannot split {n_samples} sample(s); need at least 2"
        )));
    }
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(TarifaError::InvalidHyperparameter {
            param: "test_size".to_string(),
            value: format!("{test_size}"),
            constraint: "0 < test_size < 1".to_string(),
        });
    }
    Ok(())
}

fn shuffle_indices(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = random_state.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    indices.shuffle(&mut rng);
    indices
}

fn extract_samples(x: &Matrix<f32>, y: &Vector<f32>, indices: &[usize]) -> (Matrix<f32>, Vector<f32>) {
    let x_sub = x.select_rows(indices);
    let y_sub = Vector::from_vec(indices.iter().map(|&i| y.get(i)).collect());
    (x_sub, y_sub)
}

/// Random train/test split.
///
/// # Errors
///
/// Returns an error if `x` and `y` disagree on sample count, there are
/// fewer than 2 samples, or `test_size` is outside (0, 1).
pub fn train_test_split(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    test_size: f64,
    random_state: Option<u64>,
) -> Result<SplitResult> {
    validate_split_inputs(x, y, test_size)?;

    let n_samples = x.shape().0;
    let n_test = ((n_samples as f64 * test_size).round() as usize).clamp(1, n_samples - 1);

    let indices = shuffle_indices(n_samples, random_state);
    let (test_indices, train_indices) = indices.split_at(n_test);

    let (x_train, y_train) = extract_samples(x, y, train_indices);
    let (x_test, y_test) = extract_samples(x, y, test_indices);
    Ok((x_train, x_test, y_train, y_test))
}

/// Train/test split preserving the per-stratum proportions.
///
/// `strata[i]` labels the group of sample `i`; each group contributes
/// `max(1, round(len * test_size))` samples to the test side.
///
/// # Errors
///
/// In addition to the basic validation, errors with a data validation
/// failure if any stratum has fewer than 2 members, since such a group
/// cannot appear on both sides of the split.
pub fn stratified_train_test_split(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    strata: &[u32],
    test_size: f64,
    random_state: Option<u64>,
) -> Result<SplitResult> {
    validate_split_inputs(x, y, test_size)?;
    let n_samples = x.shape().0;
    if strata.len() != n_samples {
        return Err("Number of samples in X and strata must match".into());
    }

    // BTreeMap keeps group iteration order stable across runs.
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, &key) in strata.iter().enumerate() {
        groups.entry(key).or_default().push(idx);
    }

    for (key, members) in &groups {
        if members.len() < 2 {
            return Err(TarifaError::data_validation(format!(
                "stratum {key} has only {} member(s); need at least 2 to split",
                members.len()
            )));
        }
    }

    let mut rng = random_state.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();
    for members in groups.values() {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);

        let n_test = ((shuffled.len() as f64 * test_size).round() as usize)
            .clamp(1, shuffled.len() - 1);
        let (test_part, train_part) = shuffled.split_at(n_test);
        test_indices.extend_from_slice(test_part);
        train_indices.extend_from_slice(train_part);
    }

    let (x_train, y_train) = extract_samples(x, y, &train_indices);
    let (x_test, y_test) = extract_samples(x, y, &test_indices);
    Ok((x_train, x_test, y_train, y_test))
}
