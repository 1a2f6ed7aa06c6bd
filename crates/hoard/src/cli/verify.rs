use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use hoard_catalog::{Catalog, CatalogProvider, MetadataFile};
use hoard_ledger::Ledger;

use super::app::DestArg;

#[derive(Clone, Debug, Args)]
pub struct VerifyArg {
    #[command(flatten)]
    pub dest: DestArg,

    /// Catalog document, used to locate archives by category. Archives are
    /// also searched under the destination when it is absent.
    #[arg(long, short)]
    pub metadata: Option<PathBuf>,

    /// Remove failing entries from the ledger so the next download fetches
    /// them again.
    #[arg(long)]
    pub evict: bool,
}

pub fn run(arg: VerifyArg) -> Result<ExitCode> {
    let layout = arg.dest.layout();
    let ledger = Ledger::open(layout.ledger_path()).context("failed to open the ledger")?;
    let catalog = match &arg.metadata {
        Some(path) => MetadataFile::new(path).catalog().context("failed to load the catalog")?,
        None => Catalog::new(),
    };

    let report = hoard_transfer::audit(&ledger, &catalog, &layout).context("audit failed")?;
    for finding in &report.findings {
        println!("{} {}: {}", style("✗").red(), finding.id, finding.problem);
    }
    println!(
        "{} checked, {} bad (listed in {})",
        report.checked,
        style(report.findings.len()).bold(),
        layout.audit_report_path().display()
    );

    if report.is_clean() {
        return Ok(ExitCode::SUCCESS);
    }
    if !arg.evict {
        println!("run again with --evict to drop them from the ledger");
        return Ok(ExitCode::FAILURE);
    }

    let evicted = hoard_transfer::repair(&ledger, &report).context("failed to evict entries")?;
    println!("{} entries evicted", style(evicted.len()).green().bold());
    Ok(ExitCode::SUCCESS)
}
