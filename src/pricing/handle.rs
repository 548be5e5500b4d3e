//! Shared, swappable access to the currently deployed model.
//!
//! The quoting surface keeps serving while a retrained model is swapped
//! in: readers clone an `Arc` snapshot and never observe a half-loaded
//! state.

use super::PricingModel;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Thread-safe holder for the deployed [`PricingModel`].
///
/// An empty handle quotes rule-based fares only; a populated one serves
/// the model it held when the reader took its snapshot, even if a swap
/// lands mid-request.
#[derive(Debug, Default)]
pub struct ModelHandle {
    inner: RwLock<Option<Arc<PricingModel>>>,
}

impl ModelHandle {
    /// Creates a handle with no model loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Creates a handle from a saved model file.
    ///
    /// A missing or unreadable file yields an empty handle rather than
    /// an error, so a service can start before its first training run.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let handle = Self::empty();
        if let Ok(model) = PricingModel::load(path) {
            handle.swap(model);
        }
        handle
    }

    /// Snapshot of the current model, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<PricingModel>> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Atomically replaces the deployed model.
    pub fn swap(&self, model: PricingModel) {
        *self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::new(model));
    }

    /// Removes the deployed model; subsequent quotes are rule-based.
    pub fn clear(&self) {
        *self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    /// True if a model is currently deployed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}
