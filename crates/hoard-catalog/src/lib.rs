//! Catalog side of the mirror: what exists remotely and where it lands locally.
//!
//! - [`Catalog`] maps asset identifiers to [`CatalogEntry`] attributes.
//! - [`WorkItem`] is one asset ready to hand to the fetcher.
//! - [`Layout`] fixes the on-disk locations of archives, ledger and reports.
//! - [`MetadataFile`] is the [`CatalogProvider`] reading `asset_metadata.json`.

mod entry;
mod error;
mod layout;
mod metadata;

pub use entry::{AssetId, Catalog, CatalogEntry, WorkItem};
pub use error::{Error, Result};
pub use layout::{
    ARCHIVE_EXT, AUDIT_REPORT_FILE, FAILURE_REPORT_FILE, LEDGER_FILE, Layout, LocalArchive, SKIP_REPORT_FILE,
};
pub use metadata::{CatalogProvider, MetadataFile};
