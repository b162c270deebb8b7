//! predecir — churn prediction core pipeline
//!
//! Predicts customer attrition probability from an arbitrary uploaded tabular
//! dataset and explains each prediction:
//!
//! - **`schema`**: infers target/id columns and categorical/numerical roles
//!   from raw rows with unknown columns
//! - **`features`** + **`train`**: fits encoders, scaler, and a
//!   gradient-boosted classifier into an immutable [`ArtifactBundle`]
//! - **`predict`**: serves single and batch predictions using exactly the
//!   fitted transformation, with risk tiers and confidence intervals
//! - **`explain`**: additive per-feature attribution in logit space
//! - **`registry`** + **`retrain`**: hot-swaps the live serving bundle when
//!   retraining completes, without interrupting in-flight requests
//!
//! # Example
//!
//! ```no_run
//! use predecir::{ModelRegistry, SchemaDetector, TrainConfig, Trainer};
//! use predecir::data::load::read_csv;
//!
//! # fn main() -> predecir::Result<()> {
//! let dataset = read_csv("customers.csv")?;
//! let schema = SchemaDetector::new().detect(&dataset)?;
//! let bundle = Trainer::new(TrainConfig::default()).fit(&dataset, &schema)?;
//!
//! let registry = ModelRegistry::new("models");
//! registry.install(bundle)?;
//!
//! let row = dataset.row_map(0);
//! let result = registry.predict(&row)?;
//! println!("churn probability: {:.4}", result.churn_probability);
//! # Ok(())
//! # }
//! ```

pub mod boost;
pub mod bundle;
pub mod cli;
pub mod data;
pub mod explain;
pub mod features;
pub mod predict;
pub mod registry;
pub mod retrain;
pub mod schema;
pub mod train;

mod error;

pub use error::{Error, Result};

pub use bundle::{ArtifactBundle, BundleMetadata, FeatureImportance};
pub use predict::{InputRow, PredictionResult, Predictor, RiskTier};
pub use registry::ModelRegistry;
pub use retrain::RetrainOrchestrator;
pub use schema::{SchemaDescriptor, SchemaDetector};
pub use train::{TrainConfig, Trainer};
