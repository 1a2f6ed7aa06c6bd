use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use hoard_catalog::{AssetId, Catalog, Layout, WorkItem};
use hoard_fetch::{CredentialHolder, FetchError, FetchOutcome, Remote, ResumableFetcher};
use hoard_ledger::{Ledger, Recorded};
use hoard_verify::Digest;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::report::{FailedItem, FailureReport, SkipReport};
use crate::{Result, TransferError};

/// Failure reason of an item whose credential could not be renewed.
pub const CREDENTIAL_EXPIRED: &str = "credential expired";

pub type ItemCallback = Arc<dyn Fn(&str, &ItemOutcome) + Send + Sync>;

#[derive(Clone)]
pub struct TransferOptions {
    /// Items in flight at once.
    ///
    /// Default: 4
    pub concurrency: usize,

    /// Credential refreshes one item may trigger before it is reported failed.
    ///
    /// Default: 3
    pub max_refreshes: u32,

    /// Invoked once per settled item, in completion order.
    pub on_item: Option<ItemCallback>,
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("concurrency", &self.concurrency)
            .field("max_refreshes", &self.max_refreshes)
            .field("on_item", &self.on_item.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency:   4,
            max_refreshes: 3,
            on_item:       None,
        }
    }
}

impl TransferOptions {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn max_refreshes(mut self, max_refreshes: u32) -> Self {
        self.max_refreshes = max_refreshes;
        self
    }

    pub fn on_item(mut self, callback: impl Fn(&str, &ItemOutcome) + Send + Sync + 'static) -> Self {
        self.on_item = Some(Arc::new(callback));
        self
    }
}

/// How one item of a run settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded { digest: Digest, transferred: u64 },
    Skipped { reason: String },
    Failed { reason: String },
}

/// Result of [`Orchestrator::run`]. Identifier lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded:   Vec<AssetId>,
    pub skipped:     Vec<AssetId>,
    pub failed:      Vec<FailedItem>,
    /// Bytes received over the network.
    pub transferred: u64,
}

impl Summary {
    /// No item failed.
    pub fn is_clean(&self) -> bool { self.failed.is_empty() }

    pub fn total(&self) -> usize { self.succeeded.len() + self.skipped.len() + self.failed.len() }

    fn settle(&mut self, id: AssetId, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded { transferred, .. } => {
                self.transferred += transferred;
                self.succeeded.push(id);
            }
            ItemOutcome::Skipped { .. } => self.skipped.push(id),
            ItemOutcome::Failed { reason } => self.failed.push(FailedItem { id, reason }),
        }
    }

    fn sort(&mut self) {
        self.succeeded.sort();
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.id.cmp(&b.id));
    }
}

/// What a run will do before it starts.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Catalog entries neither in the ledger nor skipped under their
    /// current fingerprint.
    pub items:    Vec<WorkItem>,
    /// Already in the ledger.
    pub complete: usize,
    /// Previously reported absent, entry unchanged since.
    pub skipped:  usize,
}

/// Pending set: catalog minus ledger minus still-valid skips.
pub fn plan(catalog: &Catalog, ledger: &Ledger, skips: &SkipReport, layout: &Layout) -> Plan {
    let recorded = ledger.load_all();
    let mut plan = Plan::default();
    for (id, entry) in catalog.iter() {
        if recorded.contains_key(id) {
            plan.complete += 1;
        } else if skips.covers(id, entry) {
            plan.skipped += 1;
        } else if let Some(item) = catalog.work_item(id, layout) {
            plan.items.push(item);
        }
    }
    plan
}

/// Drives a catalog through a bounded pool of fetch workers and merges the
/// results into the ledger.
///
/// A ledger write that fails stops the run: no further items start, the
/// ones in flight finish, the reports are written and
/// [`TransferError::Aborted`] carries the partial summary together with the
/// cause. A success is never reported without its ledger entry on disk.
pub struct Orchestrator<R: Remote> {
    fetcher:     Arc<ResumableFetcher<R>>,
    credentials: Arc<CredentialHolder>,
    options:     TransferOptions,
}

impl<R: Remote + 'static> Orchestrator<R> {
    pub fn new(fetcher: ResumableFetcher<R>, credentials: Arc<CredentialHolder>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            credentials,
            options: TransferOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn fetcher(&self) -> &ResumableFetcher<R> { &self.fetcher }

    pub fn options(&self) -> &TransferOptions { &self.options }

    /// The pending set a [`run`](Self::run) would start with.
    pub fn plan(&self, catalog: &Catalog, ledger: &Ledger, layout: &Layout) -> Result<Plan> {
        let skips = SkipReport::load(&layout.skip_report_path())?;
        Ok(plan(catalog, ledger, &skips, layout))
    }

    pub async fn run(&self, catalog: &Catalog, ledger: Arc<Ledger>, layout: &Layout) -> Result<Summary> {
        let skip_path = layout.skip_report_path();
        let mut skips = SkipReport::load(&skip_path)?;
        let plan = plan(catalog, &ledger, &skips, layout);
        let concurrency = self.options.concurrency.max(1);
        info!(
            pending = plan.items.len(),
            complete = plan.complete,
            skipped = plan.skipped,
            concurrency,
            "transfer starting"
        );

        // A skip recorded under an older catalog entry no longer applies.
        for item in &plan.items {
            if skips.remove(&item.id) {
                debug!(asset = %item.id, "catalog entry changed since skip; retrying");
            }
        }

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut running: FuturesUnordered<_> = plan
            .items
            .into_iter()
            .map(|item| {
                let worker = Worker {
                    fetcher:       Arc::clone(&self.fetcher),
                    credentials:   Arc::clone(&self.credentials),
                    ledger:        Arc::clone(&ledger),
                    semaphore:     Arc::clone(&semaphore),
                    max_refreshes: self.options.max_refreshes,
                };
                tokio::spawn(worker.run(item))
            })
            .collect();

        let mut summary = Summary::default();
        let mut fatal: Option<TransferError> = None;
        while let Some(joined) = running.next().await {
            let (id, settled) = match joined {
                Ok(settled) => settled,
                Err(e) => {
                    error!(error = %e, "worker task aborted; stopping run");
                    semaphore.close();
                    fatal.get_or_insert(TransferError::Join(e.to_string()));
                    continue;
                }
            };

            match settled {
                Settled::Done(outcome) => {
                    if let Some(callback) = &self.options.on_item {
                        callback(&id, &outcome);
                    }
                    if let ItemOutcome::Skipped { .. } = outcome
                        && let Some(entry) = catalog.get(&id)
                    {
                        skips.insert(id.clone(), entry);
                    }
                    summary.settle(id, outcome);
                }
                Settled::NotStarted => {}
                Settled::LedgerFailed(e) => {
                    error!(asset = %id, error = %e, "ledger write failed; stopping run");
                    semaphore.close();
                    fatal.get_or_insert(e);
                }
            }
        }

        summary.sort();
        skips.save(&skip_path)?;
        FailureReport {
            items: summary.failed.clone(),
        }
        .save(&layout.failure_report_path())?;

        if let Some(e) = fatal {
            return Err(TransferError::Aborted {
                summary: Box::new(summary),
                source:  Box::new(e),
            });
        }
        info!(
            succeeded = summary.succeeded.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            bytes = summary.transferred,
            "transfer finished"
        );
        Ok(summary)
    }
}

enum Settled {
    Done(ItemOutcome),
    /// The pool was closed before this item got a slot.
    NotStarted,
    LedgerFailed(TransferError),
}

struct Worker<R: Remote> {
    fetcher:       Arc<ResumableFetcher<R>>,
    credentials:   Arc<CredentialHolder>,
    ledger:        Arc<Ledger>,
    semaphore:     Arc<Semaphore>,
    max_refreshes: u32,
}

impl<R: Remote + 'static> Worker<R> {
    async fn run(self, item: WorkItem) -> (AssetId, Settled) {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return (item.id, Settled::NotStarted);
        };

        let settled = match self.fetch(&item).await {
            FetchOutcome::Success {
                digest, transferred, ..
            } => self.record(&item.id, digest, transferred).await,
            FetchOutcome::PermanentSkip { reason } => Settled::Done(ItemOutcome::Skipped { reason }),
            FetchOutcome::Failure { attempts, reason } => {
                warn!(asset = %item.id, attempts, %reason, "giving up on asset");
                Settled::Done(ItemOutcome::Failed { reason })
            }
        };
        (item.id, settled)
    }

    async fn fetch(&self, item: &WorkItem) -> FetchOutcome {
        let mut refreshes = 0;
        loop {
            match self.fetcher.fetch(item, &self.credentials).await {
                Ok(outcome) => return outcome,
                Err(FetchError::CredentialExpired { generation }) => {
                    if refreshes == self.max_refreshes || self.credentials.refresh(generation).await.is_none() {
                        return FetchOutcome::Failure {
                            attempts: refreshes + 1,
                            reason:   CREDENTIAL_EXPIRED.to_string(),
                        };
                    }
                    refreshes += 1;
                }
            }
        }
    }

    async fn record(&self, id: &str, digest: Digest, transferred: u64) -> Settled {
        let ledger = Arc::clone(&self.ledger);
        let key = id.to_string();
        // A blocking task runs to completion even if this future is dropped,
        // so the atomic replace is never cut short by cancellation.
        match tokio::task::spawn_blocking(move || ledger.record_complete(&key, digest)).await {
            Ok(Ok(recorded)) => {
                if recorded == Recorded::Unchanged {
                    debug!(asset = id, "ledger already had this digest");
                }
                Settled::Done(ItemOutcome::Succeeded { digest, transferred })
            }
            Ok(Err(e)) => Settled::LedgerFailed(e.into()),
            Err(e) => Settled::LedgerFailed(TransferError::Join(e.to_string())),
        }
    }
}
