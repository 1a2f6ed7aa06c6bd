use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use hoard_verify::Sha256Hasher;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Layout;

/// Globally unique asset identifier.
pub type AssetId = String;

/// Descriptive attributes the catalog provider knows about one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Asset type, which also names the sub-directory the archive lands in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category:   Option<String>,
    /// Component types requested alongside the asset, sorted and unique.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    /// Remote locator; the asset identifier is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator:    Option<String>,
}

impl CatalogEntry {
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = components.into_iter().map(Into::into).collect();
        self.components = set.into_iter().collect();
        self
    }

    /// Hex SHA-256 of the entry's canonical JSON; changes whenever any
    /// attribute changes.
    pub fn fingerprint(&self) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256Hasher::digest(&json))
    }
}

/// One asset pending transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id:           AssetId,
    pub locator:      String,
    pub category:     Option<String>,
    pub components:   Vec<String>,
    pub destination:  PathBuf,
    /// Total archive size, when known before the transfer starts.
    pub expected_len: Option<u64>,
}

/// Mapping from asset identifier to its attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<AssetId, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, id: impl Into<AssetId>, entry: CatalogEntry) -> Option<CatalogEntry> {
        self.entries.insert(id.into(), entry)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> { self.entries.get(id) }

    pub fn contains(&self, id: &str) -> bool { self.entries.contains_key(id) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &CatalogEntry)> { self.entries.iter() }

    pub fn ids(&self) -> impl Iterator<Item = &AssetId> { self.entries.keys() }

    /// Distinct categories present in the catalog.
    pub fn categories(&self) -> BTreeSet<String> {
        self.entries.values().filter_map(|e| e.category.clone()).collect()
    }

    /// Keep only entries whose category is one of `selected`.
    pub fn retain_categories<S: AsRef<str>>(&mut self, selected: &[S]) {
        self.entries.retain(|_, entry| {
            entry
                .category
                .as_deref()
                .is_some_and(|c| selected.iter().any(|s| s.as_ref() == c))
        });
    }

    /// `None` for unknown ids and for entries whose id or category cannot
    /// be used as a file name under `layout`.
    pub fn work_item(&self, id: &str, layout: &Layout) -> Option<WorkItem> {
        let entry = self.entries.get(id)?;
        let Some(destination) = layout.archive_path(id, entry.category.as_deref()) else {
            warn!(asset = %id, category = ?entry.category, "unusable as a file name; not transferred");
            return None;
        };
        Some(WorkItem {
            id:           id.to_string(),
            locator:      entry.locator.clone().unwrap_or_else(|| id.to_string()),
            category:     entry.category.clone(),
            components:   entry.components.clone(),
            destination,
            expected_len: None,
        })
    }
}

impl<K: Into<AssetId>> FromIterator<(K, CatalogEntry)> for Catalog {
    fn from_iter<T: IntoIterator<Item = (K, CatalogEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        [
            ("a", CatalogEntry::default().with_category("3d")),
            ("b", CatalogEntry::default().with_category("surface")),
            ("c", CatalogEntry::default()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn categories_are_distinct() {
        let cats: Vec<_> = sample().categories().into_iter().collect();
        assert_eq!(cats, vec!["3d", "surface"]);
    }

    #[test]
    fn retain_drops_uncategorized_and_unselected() {
        let mut catalog = sample();
        catalog.retain_categories(&["surface"]);
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn components_are_sorted_and_unique() {
        let entry = CatalogEntry::default().with_components(["roughness", "albedo", "albedo"]);
        assert_eq!(entry.components, vec!["albedo", "roughness"]);
    }

    #[test]
    fn fingerprint_tracks_changes() {
        let a = CatalogEntry::default().with_category("3d");
        let b = a.clone().with_components(["normal"]);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn work_item_uses_layout_and_default_locator() {
        let layout = Layout::new("/data");
        let item = sample().work_item("a", &layout).unwrap();
        assert_eq!(item.locator, "a");
        assert_eq!(item.destination, PathBuf::from("/data/3d/a.zip"));
        assert!(sample().work_item("zz", &layout).is_none());
    }

    #[test]
    fn escaping_entries_have_no_work_item() {
        let layout = Layout::new("/data");
        let catalog: Catalog = [
            ("../../etc/cron.d/x", CatalogEntry::default()),
            ("ok", CatalogEntry::default().with_category("../..")),
            ("fine", CatalogEntry::default().with_category("3d")),
        ]
        .into_iter()
        .collect();

        assert!(catalog.work_item("../../etc/cron.d/x", &layout).is_none());
        assert!(catalog.work_item("ok", &layout).is_none());
        assert_eq!(catalog.work_item("fine", &layout).unwrap().destination, PathBuf::from("/data/3d/fine.zip"));
    }
}
