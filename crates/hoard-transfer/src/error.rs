use std::path::PathBuf;

use crate::orchestrator::Summary;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The ledger could not be read or persisted. Fatal to a run.
    #[error(transparent)]
    Ledger(#[from] hoard_ledger::Error),

    #[error(transparent)]
    Fs(#[from] hoard_fs::Error),

    #[error(transparent)]
    Catalog(#[from] hoard_catalog::Error),

    #[error("report {path} is malformed: {source}")]
    MalformedReport {
        path:   PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("worker task failed: {0}")]
    Join(String),

    /// A run stopped on a fatal error. `summary` holds every item that
    /// settled before it, and the reports on disk match it.
    #[error("transfer aborted after {} settled items: {source}", .summary.total())]
    Aborted {
        summary: Box<Summary>,
        source:  Box<TransferError>,
    },
}

impl TransferError {
    /// What a run settled before stopping, when this error ended one.
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            TransferError::Aborted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
