//! Runs a catalog through the fetcher into a verified local mirror.
//!
//! # Architecture
//!
//! - [`Orchestrator`] - pending set, bounded worker pool, ledger merge
//! - [`SkipReport`] / [`FailureReport`] - what an operator inspects after a run
//! - [`audit`] / [`repair`] - re-verify ledger entries and evict bad ones
//! - [`rebuild`] - recover ledger entries from archives already on disk
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hoard_catalog::{CatalogProvider, Layout, MetadataFile};
//! use hoard_fetch::{Credential, CredentialHolder, Endpoints, HttpRemote, ResumableFetcher};
//! use hoard_ledger::Ledger;
//! use hoard_transfer::Orchestrator;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = Layout::new("mirror");
//! let catalog = MetadataFile::new("asset_metadata.json").catalog()?;
//! let ledger = Arc::new(Ledger::open(layout.ledger_path())?);
//! let credentials = Arc::new(CredentialHolder::new(Credential::new("token")));
//!
//! let fetcher = ResumableFetcher::new(HttpRemote::new(Endpoints::default())?);
//! let summary = Orchestrator::new(fetcher, credentials)
//!     .run(&catalog, ledger, &layout)
//!     .await?;
//! println!("{} done, {} failed", summary.succeeded.len(), summary.failed.len());
//! # Ok(())
//! # }
//! ```

mod audit;
mod error;
mod orchestrator;
mod rebuild;
mod report;

pub use audit::{AuditReport, Finding, Problem, audit, repair};
pub use error::{Result, TransferError};
pub use orchestrator::{
    CREDENTIAL_EXPIRED, ItemCallback, ItemOutcome, Orchestrator, Plan, Summary, TransferOptions, plan,
};
pub use rebuild::{RebuildReport, rebuild};
pub use report::{FailedItem, FailureReport, SkipReport};
