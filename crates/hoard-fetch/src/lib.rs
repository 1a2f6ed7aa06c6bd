//! Resumable, verified archive downloads.
//!
//! # Architecture
//!
//! - [`Backoff`] - pure attempt → delay policy with jitter
//! - [`CredentialHolder`] - shared credential with a serialized refresh path
//! - [`Remote`] - the initiation and byte-stream calls, as a trait seam
//! - [`ResumableFetcher`] - one item: resume, stream, size check, verify
//! - [`testing::ScriptedRemote`] - in-memory remote for tests
//!
//! # Key Features
//!
//! - **Disk is the checkpoint**: the destination's current size is the resume
//!   offset; nothing else is persisted per transfer
//! - **Never trust a short file**: a size mismatch is a failed attempt
//! - **Corruption restarts from zero**: a structurally broken archive is
//!   deleted before the next attempt
//! - **Bounded**: an explicit attempt loop, never recursion

mod backoff;
mod credential;
mod error;
mod fetcher;
#[cfg(feature = "reqwest")]
mod http;
mod progress;
mod remote;
pub mod testing;

pub use backoff::{Backoff, Growth};
pub use credential::{Credential, CredentialHolder, Refresh};
pub use error::{ErrorClass, FetchError, RemoteError};
pub use fetcher::{FetchOptions, FetchOutcome, ProgressCallback, ResumableFetcher};
#[cfg(feature = "reqwest")]
pub use http::{
    DEFAULT_DOWNLOAD_URL, DEFAULT_INITIATE_URL, Endpoints, HttpRemote, HttpTimeouts, classify_rejection,
    content_range_total,
};
pub use progress::{FetchPhase, Progress};
pub use remote::{BoxStream, DownloadHandle, Remote, RemoteBody};
