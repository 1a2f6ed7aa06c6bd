use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::archive::{ArchiveReport, scan_zip};
use crate::hasher::{Sha256Hasher, hash_reader};
use crate::{Digest, Result, VerifyError};

/// Outcome of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verified {
    pub digest:  Digest,
    pub size:    u64,
    pub archive: ArchiveReport,
}

/// Confirms that a local archive is structurally sound, then digests it.
///
/// The digest is only computed once the structural scan has passed, so a
/// [`Verified`] value never describes a broken container.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn new() -> Self { Self }

    pub fn verify(&self, path: &Path) -> Result<Verified> {
        let io_err = |e| VerifyError::Io {
            path:   path.to_path_buf(),
            source: e,
        };

        let file = File::open(path).map_err(io_err)?;
        let archive = scan_zip(BufReader::new(file)).map_err(|f| VerifyError::CorruptArchive {
            path:   path.to_path_buf(),
            reason: f.0,
        })?;

        let (digest, size) = Self::digest_file(path)?;
        Ok(Verified { digest, size, archive })
    }

    /// Verify and additionally require the digest to equal `expected`.
    pub fn verify_against(&self, path: &Path, expected: &Digest) -> Result<Verified> {
        let verified = self.verify(path)?;
        if verified.digest != *expected {
            return Err(VerifyError::Mismatch {
                expected: *expected,
                actual:   verified.digest,
            });
        }
        Ok(verified)
    }

    /// Streaming SHA-256 of a whole file.
    pub fn digest_file(path: &Path) -> Result<(Digest, u64)> {
        let io_err = |e| VerifyError::Io {
            path:   path.to_path_buf(),
            source: e,
        };
        let file = File::open(path).map_err(io_err)?;
        let (bytes, size) = hash_reader(BufReader::new(file), Sha256Hasher::new()).map_err(io_err)?;
        let digest = Digest::from_slice(&bytes).ok_or_else(|| VerifyError::InvalidDigest(hex::encode(&bytes)))?;
        Ok((digest, size))
    }
}
