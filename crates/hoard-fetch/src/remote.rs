use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use hoard_catalog::WorkItem;

use crate::error::RemoteError;

pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Transient token returned by transfer initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadHandle {
    pub id:           String,
    /// Archive size, when the remote reports it at initiation.
    pub expected_len: Option<u64>,
}

/// An open response body.
pub struct RemoteBody {
    /// Full size of the archive (not just of this response), if advertised.
    pub total:   Option<u64>,
    /// Whether the body continues at the requested offset. When `false` the
    /// body starts at byte 0 and the local file must be truncated.
    pub resumed: bool,
    pub stream:  BoxStream<'static, Result<Bytes, RemoteError>>,
}

impl std::fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBody")
            .field("total", &self.total)
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}

/// The two network calls the fetcher needs.
///
/// # Implementations
///
/// - [`HttpRemote`](crate::HttpRemote): production implementation over `reqwest`
/// - [`ScriptedRemote`](crate::testing::ScriptedRemote): in-memory double for tests
pub trait Remote: Send + Sync {
    /// Ask the remote to prepare `item` for transfer.
    ///
    /// Must map "asset does not exist" to [`RemoteError::Absent`] and a
    /// rejected credential to [`RemoteError::CredentialExpired`].
    fn initiate(
        &self,
        item: &WorkItem,
        credential: &str,
    ) -> impl Future<Output = Result<DownloadHandle, RemoteError>> + Send;

    /// Open the archive body, continuing at `offset` when the remote
    /// supports partial transfer.
    fn open(
        &self,
        handle: &DownloadHandle,
        offset: u64,
    ) -> impl Future<Output = Result<RemoteBody, RemoteError>> + Send;
}
