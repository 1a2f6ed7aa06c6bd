use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use hoard_ledger::Ledger;

use super::app::DestArg;

#[derive(Clone, Debug, Args)]
pub struct RebuildArg {
    #[command(flatten)]
    pub dest: DestArg,
}

pub fn run(arg: RebuildArg) -> Result<ExitCode> {
    let layout = arg.dest.layout();
    let ledger = Ledger::open(layout.ledger_path()).context("failed to open the ledger")?;
    let report = hoard_transfer::rebuild(&ledger, &layout).context("rebuild failed")?;

    for (id, reason) in &report.rejected {
        println!("{} {id}: {reason}", style("✗").red());
    }
    println!(
        "{} recorded, {} already present, {} rejected",
        style(report.recorded.len()).green().bold(),
        report.present,
        style(report.rejected.len()).red().bold(),
    );
    Ok(if report.rejected.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
