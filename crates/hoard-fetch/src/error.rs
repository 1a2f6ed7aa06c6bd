//! Error types for hoard-fetch.

use thiserror::Error;

/// How the fetcher must react to a remote error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The asset is gone; report once and never retry automatically.
    Permanent,
    /// The credential was rejected; a fresh one is needed before retrying.
    Reauthenticate,
    /// Worth another attempt after a backoff delay.
    Transient,
}

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("asset does not exist on the remote")]
    Absent,

    #[error("credential expired")]
    CredentialExpired,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RemoteError::Absent => ErrorClass::Permanent,
            RemoteError::CredentialExpired => ErrorClass::Reauthenticate,
            RemoteError::Status { .. } | RemoteError::Transport(_) | RemoteError::Malformed(_) => {
                ErrorClass::Transient
            }
        }
    }

    pub fn is_retryable(&self) -> bool { self.class() == ErrorClass::Transient }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self { RemoteError::Transport(e.to_string()) }
}

/// Conditions that end a fetch without an outcome.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The credential of generation `generation` was rejected.
    #[error("credential expired (generation {generation})")]
    CredentialExpired { generation: u64 },
}

/// Why a single attempt did not produce a verified archive.
#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("size mismatch: remote advertised {expected} bytes, local file has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("verification failed: {0}")]
    Corrupt(String),

    #[error("local I/O error: {0}")]
    Local(String),
}

impl From<hoard_fs::Error> for AttemptError {
    fn from(e: hoard_fs::Error) -> Self { AttemptError::Local(e.to_string()) }
}

impl From<std::io::Error> for AttemptError {
    fn from(e: std::io::Error) -> Self { AttemptError::Local(e.to_string()) }
}
