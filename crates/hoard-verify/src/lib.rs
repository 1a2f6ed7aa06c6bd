//! Verification of downloaded archives.
//!
//! An archive is trusted once two independent checks pass:
//!
//! - **Structural**: the zip container opens and every member decompresses
//!   with a matching CRC-32 ([`scan_zip`]).
//! - **Cryptographic**: a streaming SHA-256 over the whole file, computed
//!   without loading it into memory ([`Sha256Hasher`], [`hash_reader`]).
//!
//! [`IntegrityVerifier`] runs them in that order and yields a [`Digest`].
//!
//! # Example
//!
//! ```no_run
//! use hoard_verify::IntegrityVerifier;
//!
//! let verified = IntegrityVerifier::new().verify("assets/rock_01.zip".as_ref())?;
//! println!("{} ({} members)", verified.digest, verified.archive.entry_count);
//! # Ok::<(), hoard_verify::VerifyError>(())
//! ```

pub use self::archive::{ArchiveReport, ScanFailure, scan_zip};
pub use self::digest::Digest;
pub use self::error::{Result, VerifyError};
pub use self::hasher::{Hasher, Sha256Hasher, hash_reader};
pub use self::integrity::{IntegrityVerifier, Verified};

mod archive;
mod digest;
mod error;
mod hasher;
mod integrity;
