use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use hoard_catalog::{AssetId, Catalog, Layout};
use hoard_fs::AtomicWriteOptions;
use hoard_ledger::Ledger;
use hoard_verify::{Digest, IntegrityVerifier, VerifyError};
use tracing::{info, warn};

use crate::Result;

/// Why a ledger entry no longer describes a good archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    Corrupt(String),
    Mismatch { actual: Digest },
    Unreadable(String),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing => write!(f, "archive missing"),
            Problem::Corrupt(reason) => write!(f, "corrupt archive: {reason}"),
            Problem::Mismatch { actual } => write!(f, "digest mismatch: archive hashes to {actual}"),
            Problem::Unreadable(reason) => write!(f, "unreadable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub id:      AssetId,
    pub path:    Option<PathBuf>,
    pub problem: Problem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Ledger entries examined.
    pub checked:  usize,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool { self.findings.is_empty() }

    pub fn bad_ids(&self) -> impl Iterator<Item = &str> { self.findings.iter().map(|f| f.id.as_str()) }
}

/// Re-verify every ledger entry against the archive on disk and write the
/// ids that fail to the audit report file, one per line.
///
/// The archive of an id is looked up at its catalog location first, then
/// among the archives found under the layout root. The ledger is not
/// modified; see [`repair`].
pub fn audit(ledger: &Ledger, catalog: &Catalog, layout: &Layout) -> Result<AuditReport> {
    let on_disk: HashMap<AssetId, PathBuf> = if layout.root().is_dir() {
        layout.scan_archives()?.into_iter().map(|a| (a.id, a.path)).collect()
    } else {
        HashMap::new()
    };

    let verifier = IntegrityVerifier::new();
    let mut report = AuditReport::default();
    for (id, digest) in ledger.load_all() {
        report.checked += 1;

        let path = catalog
            .get(&id)
            .and_then(|entry| layout.archive_path(&id, entry.category.as_deref()))
            .filter(|p| p.is_file())
            .or_else(|| on_disk.get(&id).cloned());

        let problem = match &path {
            None => Some(Problem::Missing),
            Some(path) => match verifier.verify_against(path, &digest) {
                Ok(_) => None,
                Err(VerifyError::Mismatch { actual, .. }) => Some(Problem::Mismatch { actual }),
                Err(VerifyError::CorruptArchive { reason, .. }) => Some(Problem::Corrupt(reason)),
                Err(e) => Some(Problem::Unreadable(e.to_string())),
            },
        };

        if let Some(problem) = problem {
            warn!(asset = %id, %problem, "ledger entry failed audit");
            report.findings.push(Finding { id, path, problem });
        }
    }

    let mut listing = String::new();
    for id in report.bad_ids() {
        listing.push_str(id);
        listing.push('\n');
    }
    hoard_fs::atomic_write(layout.audit_report_path(), listing.as_bytes(), AtomicWriteOptions::new())?;

    info!(checked = report.checked, bad = report.findings.len(), "audit finished");
    Ok(report)
}

/// Evict every id the audit flagged, so the next run fetches it again.
/// Returns the ids actually removed.
pub fn repair(ledger: &Ledger, report: &AuditReport) -> Result<Vec<AssetId>> {
    let mut evicted = Vec::new();
    for id in report.bad_ids() {
        if ledger.evict(id)?.is_some() {
            evicted.push(id.to_string());
        }
    }
    Ok(evicted)
}
