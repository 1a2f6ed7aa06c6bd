use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use hoard_ledger::Ledger;

use super::app::DestArg;

#[derive(Clone, Debug, Args)]
pub struct EvictArg {
    #[command(flatten)]
    pub dest: DestArg,

    /// Asset identifiers to forget.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub fn run(arg: EvictArg) -> Result<ExitCode> {
    let ledger = Ledger::open(arg.dest.layout().ledger_path()).context("failed to open the ledger")?;

    let mut missing = 0;
    for id in &arg.ids {
        match ledger.evict(id).with_context(|| format!("failed to evict {id}"))? {
            Some(digest) => println!("{} {id} ({digest})", style("evicted").green()),
            None => {
                missing += 1;
                println!("{} {id} is not in the ledger", style("skipped").yellow());
            }
        }
    }
    Ok(if missing == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
