//! # tarifa
//!
//! Ride-fare pricing core: a feature pipeline, a forest + network
//! ensemble price estimator, and an offline training driver with a
//! synthetic-data fallback.
//!
//! The estimator pairs a random forest fit on observed prices with a
//! small network fit on the ride *reward* (price minus base distance
//! cost), both over the same engineered features; quoting averages
//! their blended estimate with a rule-based fare and never dips under
//! the per-kilometer floor.
//!
//! # Quick Start
//!
//! ```
//! use tarifa::prelude::*;
//! use tarifa::pricing::{quote_fare, synthetic_training_data, PricingModel, RideSample};
//!
//! let (x, y) = synthetic_training_data(42);
//! let mut model = PricingModel::new().with_forest_size(5);
//! model.train(&x, &y).expect("training should succeed");
//!
//! let ride = RideSample { distance_km: 10.0, priority: false, carpool: false };
//! let quote = quote_fare(Some(&model), &ride);
//! assert!(quote.total > 0.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod metrics;
pub mod model_selection;
pub mod nn;
pub mod preprocessing;
pub mod pricing;
pub mod primitives;
pub mod stats;
pub mod traits;
pub mod tree;

/// Common imports for working with the crate.
pub mod prelude {
    pub use crate::error::{Result, TarifaError};
    pub use crate::metrics::{mae, mse, r_squared};
    pub use crate::pricing::{PricingModel, RideSample};
    pub use crate::primitives::{Matrix, Vector};
    pub use crate::traits::{Estimator, Transformer};
}
