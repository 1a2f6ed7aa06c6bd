use std::path::PathBuf;

use hoard_verify::Digest;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fs(#[from] hoard_fs::Error),

    #[error("ledger {path} is not a valid identifier to digest mapping: {source}")]
    Malformed {
        path:   PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize ledger: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{id} is already recorded as {existing}; evict it before recording {new}")]
    Conflict {
        id:       String,
        existing: Digest,
        new:      Digest,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
