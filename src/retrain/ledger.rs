//! Upload audit ledger
//!
//! An append-only trail of retrain attempts, capped at the most recent
//! [`LEDGER_CAP`] entries. Audit-only: nothing in the pipeline consults it
//! for correctness — duplicate detection flags an entry but never skips a
//! retrain. Persistence is pluggable, mirroring how run tracking backends
//! are swapped between tests and production.

use super::RetrainState;
use crate::train::metrics::EvalMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Most recent entries kept
pub const LEDGER_CAP: usize = 50;

/// Errors from ledger persistence
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One audited retrain attempt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadLedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub content_hash: String,
    pub is_duplicate: bool,
    /// Timestamp of the earliest entry with the same hash, when duplicate
    pub original_upload_timestamp: Option<DateTime<Utc>>,
    pub n_rows: usize,
    pub n_positive: usize,
    /// Held-out metrics of the attempt; absent when it failed before
    /// evaluation
    pub metrics: Option<EvalMetrics>,
    pub outcome: RetrainState,
}

/// Pluggable ledger persistence
pub trait LedgerBackend {
    fn persist(&mut self, entries: &[UploadLedgerEntry]) -> Result<(), LedgerError>;
    fn restore(&self) -> Result<Vec<UploadLedgerEntry>, LedgerError>;
}

/// Keeps entries only in the ledger itself; used in tests and for callers
/// that archive audit data elsewhere
#[derive(Clone, Debug, Default)]
pub struct InMemoryBackend;

impl LedgerBackend for InMemoryBackend {
    fn persist(&mut self, _entries: &[UploadLedgerEntry]) -> Result<(), LedgerError> {
        Ok(())
    }

    fn restore(&self) -> Result<Vec<UploadLedgerEntry>, LedgerError> {
        Ok(Vec::new())
    }
}

/// Writes the full (capped) entry list to one JSON file after each append
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LedgerBackend for JsonFileBackend {
    fn persist(&mut self, entries: &[UploadLedgerEntry]) -> Result<(), LedgerError> {
        let data = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    fn restore(&self) -> Result<Vec<UploadLedgerEntry>, LedgerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// The capped, append-only ledger
#[derive(Debug)]
pub struct UploadLedger<B: LedgerBackend> {
    entries: Vec<UploadLedgerEntry>,
    backend: B,
}

impl<B: LedgerBackend> UploadLedger<B> {
    /// Restore previously persisted entries from the backend
    pub fn new(backend: B) -> Result<Self, LedgerError> {
        let entries = backend.restore()?;
        Ok(Self { entries, backend })
    }

    #[must_use]
    pub fn entries(&self) -> &[UploadLedgerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest entry sharing a content hash, for duplicate flagging
    #[must_use]
    pub fn find_original(&self, content_hash: &str) -> Option<&UploadLedgerEntry> {
        self.entries.iter().find(|e| e.content_hash == content_hash)
    }

    /// Append one entry, dropping the oldest beyond the cap
    pub fn append(&mut self, entry: UploadLedgerEntry) -> Result<(), LedgerError> {
        self.entries.push(entry);
        if self.entries.len() > LEDGER_CAP {
            let excess = self.entries.len() - LEDGER_CAP;
            self.entries.drain(..excess);
        }
        self.backend.persist(&self.entries)
    }
}
