use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use console::style;
use hoard_catalog::{CatalogProvider, MetadataFile};
use hoard_fetch::{Credential, CredentialHolder, FetchOptions, FetchPhase, HttpRemote, ResumableFetcher};
use hoard_ledger::Ledger;
use hoard_transfer::{Orchestrator, Summary, TransferError, TransferOptions};
use tracing::info;

use super::app::DestArg;
use crate::config::Settings;
use crate::ui::{TransferTracker, prompt};

#[derive(Clone, Debug, Args)]
pub struct DownloadArg {
    #[command(flatten)]
    pub dest: DestArg,

    /// Catalog document listing every asset.
    #[arg(long, short, default_value = "asset_metadata.json")]
    pub metadata: PathBuf,

    /// Only transfer assets of these categories (repeatable).
    #[arg(long = "category", short)]
    pub categories: Vec<String>,

    /// Print the categories present in the catalog and exit.
    #[arg(long)]
    pub list_categories: bool,

    /// Items in flight at once.
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Attempts per item before it is reported failed.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Access token; prompted for when absent.
    #[arg(long)]
    pub token: Option<String>,
}

impl DownloadArg {
    fn apply(&self, settings: &mut Settings) {
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            settings.max_attempts = max_attempts;
        }
        if let Some(token) = &self.token {
            settings.token = Some(token.clone());
        }
    }
}

pub async fn run(arg: DownloadArg) -> Result<ExitCode> {
    let layout = arg.dest.layout();
    std::fs::create_dir_all(layout.root())
        .with_context(|| format!("failed to create {}", layout.root().display()))?;

    let mut settings = Settings::load(layout.root()).context("failed to load configuration")?;
    arg.apply(&mut settings);

    let mut catalog = MetadataFile::new(&arg.metadata).catalog().context("failed to load the catalog")?;
    if arg.list_categories {
        for category in catalog.categories() {
            println!("{category}");
        }
        return Ok(ExitCode::SUCCESS);
    }
    if !arg.categories.is_empty() {
        catalog.retain_categories(&arg.categories);
    }

    let credential = match settings.token.as_deref() {
        Some(token) => Credential::from_pasted(token),
        None => prompt::ask_token("No token configured.").ok_or_else(|| anyhow!("a token is required"))?,
    };

    let ledger = Arc::new(Ledger::open(layout.ledger_path()).context("failed to open the ledger")?);
    let remote = HttpRemote::with_timeouts(settings.endpoints(), settings.http_timeouts())
        .context("failed to build the HTTP client")?;
    let tracker = TransferTracker::new();

    let bytes = tracker.clone();
    let fetcher = ResumableFetcher::new(remote).with_options(
        FetchOptions::default()
            .max_attempts(settings.max_attempts)
            .backoff(settings.backoff())
            .stall_timeout(settings.stall_timeout())
            .on_progress(move |p| {
                if p.phase == FetchPhase::Downloading {
                    bytes.on_chunk(p.chunk);
                }
            }),
    );

    let multi = tracker.multi();
    let credentials = CredentialHolder::new(credential).with_refresh(move || {
        let multi = multi.clone();
        async move {
            tokio::task::spawn_blocking(move || multi.suspend(|| prompt::ask_token("The token has expired.")))
                .await
                .ok()
                .flatten()
        }
    });

    let items = tracker.clone();
    let orchestrator = Orchestrator::new(fetcher, Arc::new(credentials)).with_options(
        TransferOptions::default()
            .concurrency(settings.concurrency)
            .on_item(move |id, outcome| items.on_item(id, outcome)),
    );

    let plan = orchestrator.plan(&catalog, &ledger, &layout)?;
    info!(
        catalog = catalog.len(),
        pending = plan.items.len(),
        complete = plan.complete,
        skipped = plan.skipped,
        "catalog loaded"
    );
    tracker.set_len(plan.items.len() as u64);

    let summary = match orchestrator.run(&catalog, ledger, &layout).await {
        Ok(summary) => summary,
        Err(TransferError::Aborted { summary, source }) => {
            tracker.finish();
            print_summary(&summary, &layout);
            return Err(anyhow::Error::new(*source).context("transfer aborted"));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("transfer aborted")),
    };
    tracker.finish();
    print_summary(&summary, &layout);

    Ok(if summary.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_summary(summary: &Summary, layout: &hoard_catalog::Layout) {
    println!(
        "{} succeeded, {} skipped, {} failed ({} bytes received)",
        style(summary.succeeded.len()).green().bold(),
        style(summary.skipped.len()).yellow().bold(),
        style(summary.failed.len()).red().bold(),
        summary.transferred,
    );
    if !summary.skipped.is_empty() {
        println!("absent assets are listed in {}", layout.skip_report_path().display());
    }
    if !summary.is_clean() {
        for failed in &summary.failed {
            println!("  {} {}: {}", style("✗").red(), failed.id, failed.reason);
        }
        println!("re-run to retry; details in {}", layout.failure_report_path().display());
    }
}
