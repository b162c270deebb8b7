//! Retraining orchestration
//!
//! Drives a full dataset replacement through the state machine
//! `Idle → Hashing → Training → Validating → Swapped`, falling to `Failed`
//! from `Training` or `Validating`. The orchestrator's only interaction with
//! serving state is the final atomic swap on the registry: a failed or
//! crashed attempt leaves the previously live bundle serving untouched.
//!
//! Training runs on its own thread behind `catch_unwind` with a hard
//! deadline — a panic becomes [`RetrainError::TrainingPanicked`] and an
//! overrun becomes [`RetrainError::TrainingTimeout`] instead of a hung
//! request. Notification side effects (email etc.) belong to collaborating
//! subsystems; nothing here blocks on them.

pub mod ledger;

use crate::bundle::ArtifactBundle;
use crate::data::RawDataset;
use crate::predict::{PredictError, Predictor};
use crate::registry::ModelRegistry;
use crate::schema::{SchemaDetector, SchemaError};
use crate::train::{TrainConfig, Trainer, TrainingError};
use chrono::{DateTime, Utc};
use ledger::{LedgerBackend, LedgerError, UploadLedger, UploadLedgerEntry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Default training deadline
pub const DEFAULT_TRAINING_TIMEOUT: Duration = Duration::from_secs(600);

/// Orchestrator phases; `Failed` and `Swapped` are terminal per attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainState {
    Idle,
    Hashing,
    Training,
    Validating,
    Swapped,
    Failed,
}

/// Errors that abort a retrain attempt (and only the attempt)
#[derive(Debug, Error)]
pub enum RetrainError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("training exceeded the {limit_secs}s deadline")]
    TrainingTimeout { limit_secs: u64 },

    #[error("training task panicked")]
    TrainingPanicked,

    #[error("candidate bundle failed validation: {0}")]
    Validation(#[from] PredictError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Retrain policy knobs
#[derive(Clone, Debug)]
pub struct RetrainConfig {
    pub train: TrainConfig,
    /// Hard deadline on the isolated training unit
    pub timeout: Duration,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            train: TrainConfig::default(),
            timeout: DEFAULT_TRAINING_TIMEOUT,
        }
    }
}

impl RetrainConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What a successful attempt produced
#[derive(Clone, Debug)]
pub struct RetrainOutcome {
    pub content_hash: String,
    pub is_duplicate: bool,
    pub metrics: crate::train::metrics::EvalMetrics,
    pub n_rows: usize,
}

/// Accepts a new dataset, trains in isolation, and atomically swaps the
/// live bundle on success
pub struct RetrainOrchestrator<B: LedgerBackend> {
    registry: Arc<ModelRegistry>,
    ledger: UploadLedger<B>,
    config: RetrainConfig,
    state: RetrainState,
}

impl<B: LedgerBackend> RetrainOrchestrator<B> {
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        ledger: UploadLedger<B>,
        config: RetrainConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            config,
            state: RetrainState::Idle,
        }
    }

    /// Phase the most recent attempt reached
    #[must_use]
    pub fn state(&self) -> RetrainState {
        self.state
    }

    #[must_use]
    pub fn ledger(&self) -> &UploadLedger<B> {
        &self.ledger
    }

    /// Run one full retrain attempt
    pub fn run(
        &mut self,
        dataset: &RawDataset,
        filename: &str,
    ) -> Result<RetrainOutcome, RetrainError> {
        self.state = RetrainState::Hashing;
        let content_hash = content_hash(dataset);
        let original = self
            .ledger
            .find_original(&content_hash)
            .map(|e| e.timestamp);
        let is_duplicate = original.is_some();

        // A duplicate hash still retrains: hyperparameters or code may have
        // changed since the original upload. The flag is audit-only.
        self.state = RetrainState::Training;
        let bundle = match self.train_isolated(dataset) {
            Ok(bundle) => bundle,
            Err(err) => {
                return Err(self.fail(filename, &content_hash, is_duplicate, original, dataset, err))
            }
        };

        self.state = RetrainState::Validating;
        let predictor = match Predictor::load(Arc::new(bundle)) {
            Ok(predictor) => predictor,
            Err(err) => {
                return Err(self.fail(
                    filename,
                    &content_hash,
                    is_duplicate,
                    original,
                    dataset,
                    RetrainError::Validation(err),
                ))
            }
        };

        let metrics = predictor.bundle().metadata.metrics();
        let n_positive = predictor.bundle().metadata.n_positive;

        // The swap is the only touch on serving state; the explainer was
        // already rebuilt against the new bundle inside Predictor::load
        self.registry.swap(predictor);
        self.state = RetrainState::Swapped;

        self.ledger.append(UploadLedgerEntry {
            timestamp: Utc::now(),
            filename: filename.to_string(),
            content_hash: content_hash.clone(),
            is_duplicate,
            original_upload_timestamp: original,
            n_rows: dataset.n_rows(),
            n_positive,
            metrics: Some(metrics),
            outcome: RetrainState::Swapped,
        })?;

        Ok(RetrainOutcome {
            content_hash,
            is_duplicate,
            metrics,
            n_rows: dataset.n_rows(),
        })
    }

    /// Detection + fit on a dedicated thread: a panic or overrun in here
    /// cannot corrupt or stall the serving path
    fn train_isolated(&self, dataset: &RawDataset) -> Result<ArtifactBundle, RetrainError> {
        let (tx, rx) = mpsc::channel();
        let data = dataset.clone();
        let config = self.config.train.clone();

        thread::spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let schema = SchemaDetector::new().detect(&data)?;
                let bundle = Trainer::new(config).fit(&data, &schema)?;
                Ok::<ArtifactBundle, RetrainError>(bundle)
            }));
            let flattened = match outcome {
                Ok(result) => result,
                Err(_) => Err(RetrainError::TrainingPanicked),
            };
            // The receiver may have timed out and moved on; that's fine
            let _ = tx.send(flattened);
        });

        match rx.recv_timeout(self.config.timeout) {
            Ok(result) => result,
            Err(_) => Err(RetrainError::TrainingTimeout {
                limit_secs: self.config.timeout.as_secs(),
            }),
        }
    }

    /// Record a failed attempt; the live bundle keeps serving unchanged
    fn fail(
        &mut self,
        filename: &str,
        content_hash: &str,
        is_duplicate: bool,
        original: Option<DateTime<Utc>>,
        dataset: &RawDataset,
        err: RetrainError,
    ) -> RetrainError {
        self.state = RetrainState::Failed;
        // Audit append is best effort here; the caller gets the root cause
        let _ = self.ledger.append(UploadLedgerEntry {
            timestamp: Utc::now(),
            filename: filename.to_string(),
            content_hash: content_hash.to_string(),
            is_duplicate,
            original_upload_timestamp: original,
            n_rows: dataset.n_rows(),
            n_positive: 0,
            metrics: None,
            outcome: RetrainState::Failed,
        });
        err
    }
}

/// SHA-256 over the dataset's canonical byte stream, hex-encoded
#[must_use]
pub fn content_hash(dataset: &RawDataset) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dataset.canonical_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
