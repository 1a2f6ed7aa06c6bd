use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read catalog {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("catalog {path} is malformed: {source}")]
    Malformed {
        path:   PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to scan {path}: {source}")]
    Scan { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
