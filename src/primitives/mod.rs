//! Core compute primitives (Vector, Matrix).
//!
//! These types provide the foundation for the feature pipeline and both
//! stages of the pricing estimator.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
