//! Training data for the pricing model: historical ride-log loading with
//! validation, the synthetic fallback generator, and the training driver.

use crate::error::{Result, TarifaError};
use crate::model_selection::stratified_train_test_split;
use crate::preprocessing::RAW_FEATURE_COUNT;
use crate::primitives::{Matrix, Vector};
use crate::stats::outlier_fence;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{PricingModel, DEFAULT_SEED};

/// Minimum usable historical rows before falling back to synthetic data.
pub const MIN_HISTORICAL_ROWS: usize = 20;

/// Number of rows the synthetic generator produces.
pub const SYNTHETIC_ROWS: usize = 200;

/// Where the training data came from.
///
/// Surfaced by the training driver so operators can tell a model fitted
/// on real ride history from one fitted on the synthetic fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataProvenance {
    /// Trained on the validated historical ride log.
    Historical,
    /// Trained on generated data because the log was unusable.
    Synthetic {
        /// Why the historical log was rejected.
        reason: String,
    },
}

impl fmt::Display for DataProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataProvenance::Historical => write!(f, "historical ride log"),
            DataProvenance::Synthetic { reason } => {
                write!(f, "synthetic fallback ({reason})")
            }
        }
    }
}

/// Outcome of a [`train_and_save`] run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Source of the training data.
    pub provenance: DataProvenance,
    /// Number of training samples the model was fitted on.
    pub n_samples: usize,
}

/// One parsed ride-log row before feature derivation.
struct LogRow {
    distance_km: f32,
    priority: f32,
    carpool: f32,
    final_price: f32,
}

/// Parses a binary flag field: 0/1 or true/false, case-insensitive.
/// Returns a data validation error for anything else.
fn parse_flag(column: &str, raw: &str) -> Result<f32> {
    match raw.to_ascii_lowercase().as_str() {
        "0" | "false" => Ok(0.0),
        "1" | "true" => Ok(1.0),
        other => {
            if let Ok(v) = other.parse::<f32>() {
                if v == 0.0 || v == 1.0 {
                    return Ok(v);
                }
            }
            Err(TarifaError::data_validation(format!(
                "column {column} contains non-binary value {raw:?}"
            )))
        }
    }
}

fn header_index(header: &[&str], name: &str) -> Result<usize> {
    header.iter().position(|&h| h == name).ok_or_else(|| {
        TarifaError::data_validation(format!("required column {name:?} is missing"))
    })
}

/// Builds the 5-column raw feature matrix from base columns.
fn assemble_raw_matrix(distance: &[f32], priority: &[f32], carpool: &[f32]) -> Matrix<f32> {
    let n = distance.len();
    let mut data = Vec::with_capacity(n * RAW_FEATURE_COUNT);
    for i in 0..n {
        let d = distance[i];
        let p = priority[i];
        data.push(d);
        data.push(p);
        data.push(carpool[i]);
        data.push(d * d);
        data.push(p * d);
    }
    Matrix::from_vec(n, RAW_FEATURE_COUNT, data).expect("row-aligned feature data")
}

/// Loads and validates the historical ride log.
///
/// The file is CSV with a header naming at least `distance_km`,
/// `priority`, `carpool`, and `final_price`; extra columns are ignored.
/// Rows with missing or unparsable numeric fields are dropped. After
/// parsing, the log must still hold [`MIN_HISTORICAL_ROWS`] rows; rows
/// whose distance or price falls outside the quantile outlier fence are
/// then removed, and the surviving data is split 80/20 stratified on the
/// joint flag combination. The training side is returned.
///
/// # Errors
///
/// I/O errors if the file can't be read; data validation errors if
/// required columns are missing, a flag column holds non-binary values,
/// the log is too small, or a flag combination is too rare to split.
pub fn load_ride_log(path: impl AsRef<Path>) -> Result<(Matrix<f32>, Vector<f32>)> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let header_line = lines
        .next()
        .transpose()?
        .ok_or_else(|| TarifaError::data_validation("ride log is empty"))?;
    let header: Vec<&str> = header_line.split(',').map(str::trim).collect();

    let distance_idx = header_index(&header, "distance_km")?;
    let priority_idx = header_index(&header, "priority")?;
    let carpool_idx = header_index(&header, "carpool")?;
    let price_idx = header_index(&header, "final_price")?;

    let mut rows = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let max_idx = distance_idx.max(priority_idx).max(carpool_idx).max(price_idx);
        if fields.len() <= max_idx {
            continue;
        }

        let distance_raw = fields[distance_idx];
        let price_raw = fields[price_idx];
        let priority_raw = fields[priority_idx];
        let carpool_raw = fields[carpool_idx];
        if distance_raw.is_empty()
            || price_raw.is_empty()
            || priority_raw.is_empty()
            || carpool_raw.is_empty()
        {
            continue;
        }

        // Unparsable numerics drop the row; non-binary flags poison the
        // whole log because the schema itself is wrong.
        let (Ok(distance_km), Ok(final_price)) =
            (distance_raw.parse::<f32>(), price_raw.parse::<f32>())
        else {
            continue;
        };
        if !distance_km.is_finite() || !final_price.is_finite() {
            continue;
        }

        rows.push(LogRow {
            distance_km,
            priority: parse_flag("priority", priority_raw)?,
            carpool: parse_flag("carpool", carpool_raw)?,
            final_price,
        });
    }

    if rows.len() < MIN_HISTORICAL_ROWS {
        return Err(TarifaError::data_validation(format!(
            "ride log has {} usable rows, need at least {MIN_HISTORICAL_ROWS}",
            rows.len()
        )));
    }

    let distances: Vec<f32> = rows.iter().map(|r| r.distance_km).collect();
    let prices: Vec<f32> = rows.iter().map(|r| r.final_price).collect();
    let (d_lo, d_hi) = outlier_fence(&distances)?;
    let (p_lo, p_hi) = outlier_fence(&prices)?;

    rows.retain(|r| {
        r.distance_km >= d_lo
            && r.distance_km <= d_hi
            && r.final_price >= p_lo
            && r.final_price <= p_hi
    });

    let distance: Vec<f32> = rows.iter().map(|r| r.distance_km).collect();
    let priority: Vec<f32> = rows.iter().map(|r| r.priority).collect();
    let carpool: Vec<f32> = rows.iter().map(|r| r.carpool).collect();
    let y = Vector::from_vec(rows.iter().map(|r| r.final_price).collect());
    let x = assemble_raw_matrix(&distance, &priority, &carpool);

    // Stratify on the joint flag combination so rare segments appear on
    // both sides of the split.
    let strata: Vec<u32> = rows
        .iter()
        .map(|r| (r.priority as u32) * 2 + r.carpool as u32)
        .collect();

    let (x_train, _x_test, y_train, _y_test) =
        stratified_train_test_split(&x, &y, &strata, 0.2, Some(DEFAULT_SEED))?;
    Ok((x_train, y_train))
}

/// Standard normal draw via the Box-Muller transform.
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

/// Generates the synthetic fallback training set.
///
/// Distances follow an exponential distribution with mean 10 km, clipped
/// to [1, 50]; 20% of rides request priority and 30% carpool. Prices are
/// `10·distance + 20·priority − 5·carpool` plus N(0, 5) noise.
#[must_use]
pub fn synthetic_training_data(seed: u64) -> (Matrix<f32>, Vector<f32>) {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut distance = Vec::with_capacity(SYNTHETIC_ROWS);
    let mut priority = Vec::with_capacity(SYNTHETIC_ROWS);
    let mut carpool = Vec::with_capacity(SYNTHETIC_ROWS);
    let mut prices = Vec::with_capacity(SYNTHETIC_ROWS);

    for _ in 0..SYNTHETIC_ROWS {
        let u: f64 = rng.gen_range(0.0..1.0);
        let d = ((-10.0 * (1.0 - u).ln()) as f32).clamp(1.0, 50.0);
        let p = f32::from(u8::from(rng.gen_bool(0.2)));
        let c = f32::from(u8::from(rng.gen_bool(0.3)));
        let price = 10.0 * d + 20.0 * p - 5.0 * c + 5.0 * gaussian(&mut rng);

        distance.push(d);
        priority.push(p);
        carpool.push(c);
        prices.push(price);
    }

    (
        assemble_raw_matrix(&distance, &priority, &carpool),
        Vector::from_vec(prices),
    )
}

/// Loads historical data, falling back to the synthetic generator when
/// the log is missing or fails validation.
///
/// # Errors
///
/// Never fails in practice: every load failure routes to the fallback.
/// The signature stays fallible for future data sources that can fail
/// unrecoverably.
pub fn prepare_training_data(
    path: impl AsRef<Path>,
) -> Result<(Matrix<f32>, Vector<f32>, DataProvenance)> {
    match load_ride_log(path) {
        Ok((x, y)) => Ok((x, y, DataProvenance::Historical)),
        Err(err) => {
            let (x, y) = synthetic_training_data(DEFAULT_SEED);
            Ok((
                x,
                y,
                DataProvenance::Synthetic {
                    reason: err.to_string(),
                },
            ))
        }
    }
}

/// Full training driver: prepare data, train a fresh model, save it.
///
/// # Errors
///
/// Returns an error if training fails or the model file can't be written.
pub fn train_and_save(
    log_path: impl AsRef<Path>,
    model_path: impl AsRef<Path>,
) -> Result<TrainingReport> {
    let (x, y, provenance) = prepare_training_data(log_path)?;

    let mut model = PricingModel::new();
    model.train(&x, &y)?;
    model.save(model_path)?;

    Ok(TrainingReport {
        provenance,
        n_samples: y.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Writes a CSV with `n` well-formed rows cycling through all four
    /// flag combinations.
    fn write_log(path: &Path, n: usize, extra_lines: &[&str]) {
        let mut f = File::create(path).expect("create log");
        writeln!(f, "ride_id,distance_km,priority,carpool,final_price").expect("write");
        for i in 0..n {
            let d = 2.0 + (i % 12) as f32;
            let p = u8::from(i % 4 == 1 || i % 4 == 3);
            let c = u8::from(i % 4 == 2 || i % 4 == 3);
            let price = 10.0 * d + 20.0 * f32::from(p) - 5.0 * f32::from(c);
            writeln!(f, "{i},{d},{p},{c},{price}").expect("write");
        }
        for line in extra_lines {
            writeln!(f, "{line}").expect("write");
        }
    }

    #[test]
    fn test_load_valid_log_returns_train_split() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        write_log(&path, 25, &[]);

        let (x, y) = load_ride_log(&path).expect("load");
        assert_eq!(x.n_cols(), RAW_FEATURE_COUNT);
        // 80% train side of 25 rows, stratified rounding allowed.
        assert!(y.len() >= 19 && y.len() <= 21, "got {} rows", y.len());
        assert_eq!(x.n_rows(), y.len());
    }

    #[test]
    fn test_load_drops_unparsable_price_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        // 25 good rows plus 2 with garbage prices: still >= 20 usable.
        write_log(&path, 25, &["90,5.0,0,0,oops", "91,6.0,1,0,"]);

        assert!(load_ride_log(&path).is_ok());
    }

    #[test]
    fn test_load_small_log_fails_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        write_log(&path, 10, &[]);

        let err = load_ride_log(&path).unwrap_err();
        assert!(err.is_data_validation());
        assert!(err.to_string().contains("10 usable rows"));
    }

    #[test]
    fn test_load_missing_column_fails_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        let mut f = File::create(&path).expect("create");
        writeln!(f, "distance_km,priority,final_price").expect("write");
        writeln!(f, "5.0,0,50.0").expect("write");
        drop(f);

        let err = load_ride_log(&path).unwrap_err();
        assert!(err.is_data_validation());
        assert!(err.to_string().contains("carpool"));
    }

    #[test]
    fn test_load_non_binary_flag_fails_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        write_log(&path, 25, &["90,5.0,2,0,50.0"]);

        let err = load_ride_log(&path).unwrap_err();
        assert!(err.is_data_validation());
        assert!(err.to_string().contains("non-binary"));
    }

    #[test]
    fn test_load_accepts_true_false_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        let mut f = File::create(&path).expect("create");
        writeln!(f, "distance_km,priority,carpool,final_price").expect("write");
        for i in 0..24 {
            let d = 2.0 + i as f32;
            let p = if i % 2 == 0 { "True" } else { "False" };
            let c = if i % 3 == 0 { "true" } else { "false" };
            writeln!(f, "{d},{p},{c},{}", 10.0 * d).expect("write");
        }
        drop(f);

        assert!(load_ride_log(&path).is_ok());
    }

    #[test]
    fn test_load_outlier_rows_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        // One absurd fare amid tight normal data.
        write_log(&path, 40, &["90,5.0,0,0,1000000"]);

        let (_, y) = load_ride_log(&path).expect("load");
        assert!(y.iter().all(|&p| p < 1000.0), "outlier fare must be fenced out");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_ride_log("/nonexistent/rides.csv").unwrap_err();
        assert!(matches!(err, TarifaError::Io(_)));
    }

    #[test]
    fn test_synthetic_data_shape_and_bounds() {
        let (x, y) = synthetic_training_data(42);
        assert_eq!(x.shape(), (SYNTHETIC_ROWS, RAW_FEATURE_COUNT));
        assert_eq!(y.len(), SYNTHETIC_ROWS);

        for i in 0..SYNTHETIC_ROWS {
            let d = x.get(i, 0);
            assert!((1.0..=50.0).contains(&d), "distance {d} out of range");
            assert!(x.get(i, 1) == 0.0 || x.get(i, 1) == 1.0);
            assert!(x.get(i, 2) == 0.0 || x.get(i, 2) == 1.0);
            assert!((x.get(i, 3) - d * d).abs() < 1e-3);
            assert!((x.get(i, 4) - x.get(i, 1) * d).abs() < 1e-4);
        }
    }

    #[test]
    fn test_synthetic_data_deterministic_per_seed() {
        let (x1, y1) = synthetic_training_data(7);
        let (x2, y2) = synthetic_training_data(7);
        assert_eq!(x1, x2);
        assert_eq!(y1.as_slice(), y2.as_slice());

        let (x3, _) = synthetic_training_data(8);
        assert_ne!(x1, x3);
    }

    #[test]
    fn test_synthetic_flags_roughly_match_rates() {
        let (x, _) = synthetic_training_data(42);
        let priority_rate =
            (0..SYNTHETIC_ROWS).map(|i| x.get(i, 1)).sum::<f32>() / SYNTHETIC_ROWS as f32;
        let carpool_rate =
            (0..SYNTHETIC_ROWS).map(|i| x.get(i, 2)).sum::<f32>() / SYNTHETIC_ROWS as f32;
        assert!((0.08..=0.35).contains(&priority_rate), "priority rate {priority_rate}");
        assert!((0.15..=0.45).contains(&carpool_rate), "carpool rate {carpool_rate}");
    }

    #[test]
    fn test_prepare_falls_back_on_missing_file() {
        let (x, y, provenance) =
            prepare_training_data("/nonexistent/rides.csv").expect("prepare");
        assert_eq!(x.n_rows(), SYNTHETIC_ROWS);
        assert_eq!(y.len(), SYNTHETIC_ROWS);
        assert!(matches!(provenance, DataProvenance::Synthetic { .. }));
    }

    #[test]
    fn test_prepare_falls_back_on_small_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        write_log(&path, 10, &[]);

        let (_, _, provenance) = prepare_training_data(&path).expect("prepare");
        match provenance {
            DataProvenance::Synthetic { reason } => {
                assert!(reason.contains("usable rows"));
            }
            DataProvenance::Historical => panic!("small log must trigger fallback"),
        }
    }

    #[test]
    fn test_prepare_uses_historical_when_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rides.csv");
        write_log(&path, 30, &[]);

        let (_, _, provenance) = prepare_training_data(&path).expect("prepare");
        assert_eq!(provenance, DataProvenance::Historical);
    }

    #[test]
    fn test_provenance_display() {
        assert_eq!(DataProvenance::Historical.to_string(), "historical ride log");
        let synth = DataProvenance::Synthetic {
            reason: "ride log is empty".to_string(),
        };
        assert!(synth.to_string().contains("synthetic fallback"));
        assert!(synth.to_string().contains("ride log is empty"));
    }
}
