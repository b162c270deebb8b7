//! Artifact-set persistence
//!
//! One bundle serializes to four JSON files in a directory: `model.json`,
//! `scaler.json`, `encoders.json`, and `metadata.json` (which also carries
//! the schema descriptor). Classifier and metadata are mandatory on load;
//! scaler and encoders are optional, and their absence degrades serving to
//! raw pass-through rather than failing.

use super::{ArtifactBundle, BundleMetadata};
use crate::boost::GradientBoostedTrees;
use crate::features::{LabelEncoder, StandardScaler};
use crate::schema::SchemaDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const ENCODERS_FILE: &str = "encoders.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Errors from artifact-set IO
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required artifact: {0}")]
    MissingArtifact(String),
}

/// On-disk shape of `metadata.json`: the metadata record at the top level
/// plus the full schema descriptor under `schema`
#[derive(Serialize, Deserialize)]
struct MetadataDoc {
    schema: SchemaDescriptor,
    #[serde(flatten)]
    metadata: BundleMetadata,
}

/// Write the artifact set, creating the directory if needed
pub fn save_bundle(bundle: &ArtifactBundle, dir: impl AsRef<Path>) -> Result<(), BundleError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    write_json(&dir.join(MODEL_FILE), &bundle.classifier)?;
    if let Some(scaler) = &bundle.scaler {
        write_json(&dir.join(SCALER_FILE), scaler)?;
    }
    write_json(&dir.join(ENCODERS_FILE), &bundle.encoders)?;
    write_json(
        &dir.join(METADATA_FILE),
        &MetadataDoc {
            schema: bundle.schema.clone(),
            metadata: bundle.metadata.clone(),
        },
    )?;
    Ok(())
}

/// Read an artifact set back into a bundle
pub fn load_bundle(dir: impl AsRef<Path>) -> Result<ArtifactBundle, BundleError> {
    let dir = dir.as_ref();

    let classifier: GradientBoostedTrees = read_json(&dir.join(MODEL_FILE))?
        .ok_or_else(|| BundleError::MissingArtifact(MODEL_FILE.to_string()))?;
    let doc: MetadataDoc = read_json(&dir.join(METADATA_FILE))?
        .ok_or_else(|| BundleError::MissingArtifact(METADATA_FILE.to_string()))?;

    let scaler: Option<StandardScaler> = read_json(&dir.join(SCALER_FILE))?;
    let encoders: BTreeMap<String, LabelEncoder> =
        read_json(&dir.join(ENCODERS_FILE))?.unwrap_or_default();

    Ok(ArtifactBundle {
        classifier,
        encoders,
        scaler,
        schema: doc.schema,
        metadata: doc.metadata,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BundleError> {
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, BundleError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}
