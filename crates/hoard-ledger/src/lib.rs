//! Completion ledger: the authoritative record of which assets are fully and
//! correctly acquired.
//!
//! The ledger is one JSON object (`{"<asset id>": "<sha256 hex>", ...}`). Every
//! mutation serializes the whole updated mapping and replaces the file with
//! [`hoard_fs::atomic_write`], so a reader only ever sees a complete mapping.
//!
//! Mutations are serialized by a mutex that is held across the disk write.
//! The in-memory mapping is only updated after the replacement succeeded, so
//! memory never runs ahead of disk.

mod error;

pub use error::{Error, Result};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hoard_fs::AtomicWriteOptions;
use hoard_verify::Digest;
use tracing::{debug, info};

pub type Entries = BTreeMap<String, Digest>;

/// Result of [`Ledger::record_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Inserted,
    /// The same digest was already on record; nothing was written.
    Unchanged,
}

#[derive(Debug)]
pub struct Ledger {
    path:    PathBuf,
    entries: Mutex<Entries>,
    write:   AtomicWriteOptions,
}

impl Ledger {
    /// Load the ledger at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match hoard_fs::read_if_exists(&path)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Malformed {
                path: path.clone(),
                source,
            })?,
            None => Entries::new(),
        };
        debug!(path = %path.display(), entries = entries.len(), "ledger loaded");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
            write: AtomicWriteOptions::new(),
        })
    }

    pub fn with_write_options(mut self, write: AtomicWriteOptions) -> Self {
        self.write = write;
        self
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn is_complete(&self, id: &str) -> bool { self.lock().contains_key(id) }

    pub fn get(&self, id: &str) -> Option<Digest> { self.lock().get(id).copied() }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    /// Snapshot of the full mapping.
    pub fn load_all(&self) -> Entries { self.lock().clone() }

    /// Record `id` as verified with `digest` and persist the ledger.
    ///
    /// Entries are immutable: recording a different digest for an id that is
    /// already present fails with [`Error::Conflict`].
    pub fn record_complete(&self, id: &str, digest: Digest) -> Result<Recorded> {
        let mut entries = self.lock();
        match entries.get(id) {
            Some(existing) if *existing == digest => return Ok(Recorded::Unchanged),
            Some(existing) => {
                return Err(Error::Conflict {
                    id:       id.to_string(),
                    existing: *existing,
                    new:      digest,
                });
            }
            None => {}
        }

        let mut next = entries.clone();
        next.insert(id.to_string(), digest);
        self.persist(&next)?;
        *entries = next;

        debug!(asset = id, %digest, "ledger entry recorded");
        Ok(Recorded::Inserted)
    }

    /// Record a batch with a single write.
    ///
    /// All or nothing: a conflict with the ledger or within the batch fails
    /// the whole batch before anything is written. Returns how many entries
    /// were new; nothing is written when none were.
    pub fn record_many<I, K>(&self, batch: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, Digest)>,
        K: Into<String>,
    {
        let mut entries = self.lock();
        let mut next = entries.clone();
        let mut inserted = 0;
        for (id, digest) in batch {
            let id = id.into();
            match next.get(&id) {
                Some(existing) if *existing == digest => {}
                Some(existing) => {
                    return Err(Error::Conflict {
                        existing: *existing,
                        new: digest,
                        id,
                    });
                }
                None => {
                    next.insert(id, digest);
                    inserted += 1;
                }
            }
        }
        if inserted == 0 {
            return Ok(0);
        }

        self.persist(&next)?;
        *entries = next;
        debug!(inserted, "ledger batch recorded");
        Ok(inserted)
    }

    /// Remove `id`, returning the digest it had. Operator repair path.
    pub fn evict(&self, id: &str) -> Result<Option<Digest>> {
        let mut entries = self.lock();
        if !entries.contains_key(id) {
            return Ok(None);
        }

        let mut next = entries.clone();
        let removed = next.remove(id);
        self.persist(&next)?;
        *entries = next;

        info!(asset = id, "ledger entry evicted");
        Ok(removed)
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        let bytes = encode(entries)?;
        hoard_fs::atomic_write(&self.path, &bytes, self.write)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // The guarded map is only replaced after a successful write, so a
        // panic elsewhere never leaves it half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serialized form written to disk.
pub fn encode(entries: &Entries) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(entries).map_err(Error::Serialize)
}
