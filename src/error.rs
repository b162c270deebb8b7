//! Crate-level error type
//!
//! Each pipeline stage defines its own error enum; this aggregates them for
//! callers (the CLI, collaborating services) that cross stage boundaries.

use thiserror::Error;

/// Any error the pipeline can produce
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] crate::data::DataError),

    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaError),

    #[error(transparent)]
    Training(#[from] crate::train::TrainingError),

    #[error(transparent)]
    Bundle(#[from] crate::bundle::io::BundleError),

    #[error(transparent)]
    Predict(#[from] crate::predict::PredictError),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Retrain(#[from] crate::retrain::RetrainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;
