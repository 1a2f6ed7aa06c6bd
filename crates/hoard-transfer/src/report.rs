use std::collections::BTreeMap;
use std::path::Path;

use hoard_catalog::{AssetId, CatalogEntry};
use hoard_fs::AtomicWriteOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Result, TransferError};

/// Assets the remote reported as gone, keyed by id, valued by the
/// fingerprint of the catalog entry they were skipped under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipReport {
    entries: BTreeMap<AssetId, String>,
}

impl SkipReport {
    pub fn load(path: &Path) -> Result<Self> { load_or_default(path) }

    pub fn save(&self, path: &Path) -> Result<()> { save(path, self) }

    /// Whether `id` was skipped under exactly this catalog entry.
    pub fn covers(&self, id: &str, entry: &CatalogEntry) -> bool {
        self.entries.get(id).is_some_and(|fp| *fp == entry.fingerprint())
    }

    pub fn insert(&mut self, id: impl Into<AssetId>, entry: &CatalogEntry) {
        self.entries.insert(id.into(), entry.fingerprint());
    }

    pub fn remove(&mut self, id: &str) -> bool { self.entries.remove(id).is_some() }

    pub fn contains(&self, id: &str) -> bool { self.entries.contains_key(id) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// One item that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id:     AssetId,
    pub reason: String,
}

/// Items of the last run that need an operator re-run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureReport {
    pub items: Vec<FailedItem>,
}

impl FailureReport {
    pub fn load(path: &Path) -> Result<Self> { load_or_default(path) }

    pub fn save(&self, path: &Path) -> Result<()> { save(path, self) }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match hoard_fs::read_if_exists(path)? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| TransferError::MalformedReport {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(T::default()),
    }
}

fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(TransferError::Serialize)?;
    hoard_fs::atomic_write(path, &bytes, AtomicWriteOptions::new())?;
    Ok(())
}
