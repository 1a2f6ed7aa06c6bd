use std::io;
use std::path::PathBuf;

use crate::Digest;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: Digest, actual: Digest },

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid SHA-256 digest: {0:?}")]
    InvalidDigest(String),
}

impl VerifyError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptArchive { .. } | Self::Mismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
