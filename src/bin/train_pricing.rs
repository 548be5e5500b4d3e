//! Offline training driver.
//!
//! Reads `ride_requests.csv` from the working directory, trains a fresh
//! pricing model (falling back to synthetic data when the log is
//! unusable), and writes `pricing_model.json` next to it.

use std::process::ExitCode;
use tarifa::pricing::train_and_save;

const LOG_PATH: &str = "ride_requests.csv";
const MODEL_PATH: &str = "pricing_model.json";

fn main() -> ExitCode {
    match train_and_save(LOG_PATH, MODEL_PATH) {
        Ok(report) => {
            println!(
                "trained on {} samples ({})",
                report.n_samples, report.provenance
            );
            println!("model written to {MODEL_PATH}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("training failed: {err}");
            ExitCode::FAILURE
        }
    }
}
