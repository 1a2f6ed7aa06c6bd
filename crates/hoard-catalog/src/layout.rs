use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{AssetId, Error, Result};

pub const LEDGER_FILE: &str = "checksums.json";
pub const SKIP_REPORT_FILE: &str = "skipped.json";
pub const FAILURE_REPORT_FILE: &str = "failed.json";
pub const AUDIT_REPORT_FILE: &str = "bad_assets.txt";
pub const ARCHIVE_EXT: &str = "zip";

/// Where things live under a destination directory.
///
/// ```text
/// <root>/checksums.json
/// <root>/<category>/<id>.zip
/// <root>/<id>.zip                 (uncategorized)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

/// An archive found on disk by [`Layout::scan_archives`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArchive {
    pub id:       AssetId,
    pub category: Option<String>,
    pub path:     PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// `None` when `id` or `category` is not a single plain path component,
    /// so no catalog entry can place a file outside the root.
    pub fn archive_path(&self, id: &str, category: Option<&str>) -> Option<PathBuf> {
        if !is_plain_name(id) || !category.is_none_or(is_plain_name) {
            return None;
        }
        let file = format!("{id}.{ARCHIVE_EXT}");
        Some(match category {
            Some(c) => self.root.join(c).join(file),
            None => self.root.join(file),
        })
    }

    pub fn ledger_path(&self) -> PathBuf { self.root.join(LEDGER_FILE) }

    pub fn skip_report_path(&self) -> PathBuf { self.root.join(SKIP_REPORT_FILE) }

    pub fn failure_report_path(&self) -> PathBuf { self.root.join(FAILURE_REPORT_FILE) }

    pub fn audit_report_path(&self) -> PathBuf { self.root.join(AUDIT_REPORT_FILE) }

    /// Archives directly under the root and one category level below it,
    /// sorted by identifier.
    pub fn scan_archives(&self) -> Result<Vec<LocalArchive>> {
        let mut found = Vec::new();
        for entry in read_dir(&self.root)? {
            let path = entry.path();
            if path.is_dir() {
                let category = entry.file_name().to_string_lossy().into_owned();
                for inner in read_dir(&path)? {
                    push_archive(&mut found, inner.path(), Some(category.clone()));
                }
            } else {
                push_archive(&mut found, path, None);
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

/// Exactly one normal component: no separators, no `.` or `..`, not empty,
/// not absolute.
pub(crate) fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(only)), None) if only == name
    )
}

fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let scan_err = |e| Error::Scan {
        path:   dir.to_path_buf(),
        source: e,
    };
    fs::read_dir(dir)
        .map_err(scan_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(scan_err)
}

fn push_archive(found: &mut Vec<LocalArchive>, path: PathBuf, category: Option<String>) {
    if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXT) {
        return;
    }
    if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
        found.push(LocalArchive {
            id: id.to_string(),
            category,
            path,
        });
    }
}
