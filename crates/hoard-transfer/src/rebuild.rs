use hoard_catalog::{AssetId, Layout};
use hoard_ledger::Ledger;
use hoard_verify::IntegrityVerifier;
use tracing::{info, warn};

use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Newly recorded ids.
    pub recorded: Vec<AssetId>,
    /// Archives whose id the ledger already had.
    pub present:  usize,
    /// Archives that failed verification, with the reason.
    pub rejected: Vec<(AssetId, String)>,
}

/// Record every verifiable archive under the layout that the ledger does not
/// know yet. Existing entries are left alone. The ledger is written once, at
/// the end.
pub fn rebuild(ledger: &Ledger, layout: &Layout) -> Result<RebuildReport> {
    let verifier = IntegrityVerifier::new();
    let mut report = RebuildReport::default();
    let mut verified = Vec::new();

    for archive in layout.scan_archives()? {
        if ledger.is_complete(&archive.id) {
            report.present += 1;
            continue;
        }
        match verifier.verify(&archive.path) {
            Ok(v) => verified.push((archive.id, v.digest)),
            Err(e) => {
                warn!(asset = %archive.id, error = %e, "archive not recorded");
                report.rejected.push((archive.id, e.to_string()));
            }
        }
    }

    ledger.record_many(verified.iter().map(|(id, digest)| (id.as_str(), *digest)))?;
    report.recorded = verified.into_iter().map(|(id, _)| id).collect();

    info!(
        recorded = report.recorded.len(),
        present = report.present,
        rejected = report.rejected.len(),
        "ledger rebuilt"
    );
    Ok(report)
}
