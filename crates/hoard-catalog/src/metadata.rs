//! Catalog provider backed by an `asset_metadata.json` document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::layout::is_plain_name;
use crate::{Catalog, CatalogEntry, Error, Result};

/// Source of the asset catalog.
pub trait CatalogProvider {
    fn catalog(&self) -> Result<Catalog>;
}

/// Reads the complete metadata document produced by the metadata crawl.
#[derive(Debug, Clone)]
pub struct MetadataFile {
    path: PathBuf,
}

#[derive(Deserialize)]
struct Document {
    asset_metadata: BTreeMap<String, RawAsset>,
}

#[derive(Deserialize)]
struct RawAsset {
    #[serde(default)]
    full_metadata: Option<FullMetadata>,
}

#[derive(Deserialize)]
struct FullMetadata {
    #[serde(rename = "semanticTags", default)]
    semantic_tags: Option<SemanticTags>,
    #[serde(default)]
    components:    Option<Vec<Component>>,
    #[serde(default)]
    maps:          Option<Vec<Component>>,
}

#[derive(Deserialize)]
struct SemanticTags {
    #[serde(default)]
    asset_type: Option<String>,
}

#[derive(Deserialize)]
struct Component {
    #[serde(rename = "type")]
    kind: String,
}

impl MetadataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Catalog> {
        let doc: Document = serde_json::from_slice(bytes).map_err(|source| Error::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

        let mut catalog = Catalog::new();
        for (id, raw) in doc.asset_metadata {
            let Some(full) = raw.full_metadata else {
                warn!(asset = %id, "no full metadata; asset left out of the catalog");
                continue;
            };
            let components = full.components.or(full.maps).unwrap_or_default();
            let mut entry = CatalogEntry::default().with_components(components.into_iter().map(|c| c.kind));
            entry.category = full.semantic_tags.and_then(|t| t.asset_type);
            if !is_plain_name(&id) || !entry.category.as_deref().is_none_or(is_plain_name) {
                warn!(asset = %id, category = ?entry.category, "not a plain file name; asset left out of the catalog");
                continue;
            }
            catalog.insert(id, entry);
        }
        Ok(catalog)
    }
}

impl CatalogProvider for MetadataFile {
    fn catalog(&self) -> Result<Catalog> {
        let bytes = std::fs::read(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;
        Self::parse(&self.path, &bytes)
    }
}
