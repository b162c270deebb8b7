//! Live model registry
//!
//! Holds the single current-serving [`Predictor`] behind one atomically
//! swappable reference. Requests capture a snapshot `Arc` at entry and never
//! re-read the live pointer mid-request, so a concurrent swap can only ever
//! hand out the old or the new complete bundle — never a partial one. The
//! lock is held only for the instant of cloning or replacing the reference,
//! never while computing.
//!
//! A replaced bundle is dropped when the last in-flight snapshot releases
//! its `Arc`.

use crate::bundle::io::{load_bundle, BundleError};
use crate::bundle::{ArtifactBundle, BundleMetadata, FeatureImportance};
use crate::predict::{
    BatchOutcome, ExplainedPrediction, InputRow, PredictError, PredictionResult, Predictor,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Errors from registry maintenance operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Predict(#[from] PredictError),
}

/// The serving surface consumed by collaborating subsystems
pub struct ModelRegistry {
    live: RwLock<Option<Arc<Predictor>>>,
    artifact_dir: PathBuf,
}

impl ModelRegistry {
    /// Create an empty registry pointing at a persisted artifact directory
    #[must_use]
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            live: RwLock::new(None),
            artifact_dir: artifact_dir.into(),
        }
    }

    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.read_live().is_some()
    }

    /// Capture the live predictor for the duration of one request
    pub fn snapshot(&self) -> Result<Arc<Predictor>, PredictError> {
        self.read_live().ok_or(PredictError::ModelNotLoaded)
    }

    /// Swap in an already-validated predictor
    ///
    /// The write lock is held only for the pointer replacement; readers that
    /// captured the old `Arc` keep serving from it.
    pub fn swap(&self, predictor: Predictor) {
        let mut guard = self
            .live
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(predictor));
    }

    /// Validate a bundle and make it live
    pub fn install(&self, bundle: ArtifactBundle) -> Result<(), PredictError> {
        let predictor = Predictor::load(Arc::new(bundle))?;
        self.swap(predictor);
        Ok(())
    }

    /// Re-read the artifact set from disk and swap it in
    pub fn reload(&self) -> Result<(), RegistryError> {
        let bundle = load_bundle(&self.artifact_dir)?;
        self.install(bundle)?;
        Ok(())
    }

    pub fn predict(&self, row: &InputRow) -> Result<PredictionResult, PredictError> {
        Ok(self.snapshot()?.predict(row))
    }

    pub fn predict_with_explanation(
        &self,
        row: &InputRow,
    ) -> Result<ExplainedPrediction, PredictError> {
        Ok(self.snapshot()?.predict_with_explanation(row))
    }

    pub fn batch_predict(&self, rows: &[InputRow]) -> Result<BatchOutcome, PredictError> {
        Ok(self.snapshot()?.batch_predict(rows))
    }

    pub fn get_feature_importance(&self) -> Result<Vec<FeatureImportance>, PredictError> {
        Ok(self
            .snapshot()?
            .bundle()
            .metadata
            .feature_importance
            .clone())
    }

    pub fn get_metadata(&self) -> Result<BundleMetadata, PredictError> {
        Ok(self.snapshot()?.bundle().metadata.clone())
    }

    fn read_live(&self) -> Option<Arc<Predictor>> {
        let guard = self.live.read().unwrap_or_else(PoisonError::into_inner);
        (*guard).clone()
    }
}
