//! In-memory [`Remote`] driven by per-asset scripts.
//!
//! Every asset is served from a byte buffer. Each initiation pops the next
//! [`Step`] for that asset (or [`Step::Serve`] once the script is empty), so a
//! test can describe "truncated once, then fine" without real sockets.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures_util::StreamExt;
use hoard_catalog::WorkItem;

use crate::error::RemoteError;
use crate::remote::{BoxStream, DownloadHandle, Remote, RemoteBody};

const CHUNK: usize = 1024;

/// Behaviour of one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    /// Honour the requested range and send everything.
    Serve,
    /// Send at most this many bytes of the requested range, then end cleanly.
    Truncate(usize),
    /// Send this many bytes, then fail the stream.
    FailMidStream(usize),
    /// Reject the initiation call.
    FailInitiate(RemoteError),
    /// Send the full archive with one byte flipped in the middle.
    Corrupt,
    /// Ignore the range header and send from byte 0.
    IgnoreRange,
    /// Send this many bytes, then go silent without closing the stream.
    Stall(usize),
}

/// What the remote saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub locator: String,
    pub offset:  u64,
}

#[derive(Default)]
struct Inner {
    archives:  HashMap<String, Vec<u8>>,
    scripts:   HashMap<String, VecDeque<Step>>,
    absent:    HashSet<String>,
    accepted:  Option<HashSet<String>>,
    pending:   HashMap<String, (String, Step)>,
    initiated: Vec<String>,
    opened:    Vec<Request>,
    next_id:   u64,
}

#[derive(Default)]
pub struct ScriptedRemote {
    inner:        Mutex<Inner>,
    bytes_served: AtomicU64,
}

impl ScriptedRemote {
    pub fn new() -> Self { Self::default() }

    pub fn with_archive(self, locator: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.lock().archives.insert(locator.into(), bytes);
        self
    }

    pub fn with_script(self, locator: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        self.lock().scripts.insert(locator.into(), steps.into_iter().collect());
        self
    }

    pub fn with_absent(self, locator: impl Into<String>) -> Self {
        self.lock().absent.insert(locator.into());
        self
    }

    /// Only these credentials are accepted; anything else is "expired".
    pub fn accepting(self, credentials: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.lock().accepted = Some(credentials.into_iter().map(Into::into).collect());
        self
    }

    pub fn initiated(&self) -> Vec<String> { self.lock().initiated.clone() }

    pub fn opened(&self) -> Vec<Request> { self.lock().opened.clone() }

    pub fn bytes_served(&self) -> u64 { self.bytes_served.load(Ordering::SeqCst) }

    fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }
}

fn chunked(bytes: &[u8]) -> Vec<Result<Bytes, RemoteError>> {
    bytes.chunks(CHUNK).map(|c| Ok(Bytes::copy_from_slice(c))).collect()
}

impl Remote for ScriptedRemote {
    async fn initiate(&self, item: &WorkItem, credential: &str) -> Result<DownloadHandle, RemoteError> {
        let mut inner = self.lock();
        inner.initiated.push(item.locator.clone());

        if let Some(accepted) = &inner.accepted
            && !accepted.contains(credential)
        {
            return Err(RemoteError::CredentialExpired);
        }
        if inner.absent.contains(&item.locator) {
            return Err(RemoteError::Absent);
        }

        let step = inner
            .scripts
            .get_mut(&item.locator)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Serve);
        if let Step::FailInitiate(e) = step {
            return Err(e);
        }

        inner.next_id += 1;
        let id = format!("{}#{}", item.locator, inner.next_id);
        inner.pending.insert(id.clone(), (item.locator.clone(), step));
        Ok(DownloadHandle {
            id,
            expected_len: None,
        })
    }

    async fn open(&self, handle: &DownloadHandle, offset: u64) -> Result<RemoteBody, RemoteError> {
        let mut inner = self.lock();
        let (locator, step) = inner
            .pending
            .remove(&handle.id)
            .ok_or_else(|| RemoteError::Malformed(format!("unknown handle {}", handle.id)))?;
        inner.opened.push(Request {
            locator: locator.clone(),
            offset,
        });

        let archive = inner.archives.get(&locator).cloned().ok_or(RemoteError::Absent)?;
        let total = archive.len() as u64;

        let (start, resumed) = match step {
            Step::IgnoreRange => (0, false),
            _ if offset == 0 => (0, false),
            _ if offset >= total => {
                return Ok(RemoteBody {
                    total:   Some(total),
                    resumed: true,
                    stream:  Box::pin(futures_util::stream::empty()),
                });
            }
            _ => (offset as usize, true),
        };

        let mut body = archive[start..].to_vec();
        let chunks = match step {
            Step::Truncate(n) => {
                body.truncate(n);
                chunked(&body)
            }
            Step::FailMidStream(n) => {
                body.truncate(n);
                let mut chunks = chunked(&body);
                chunks.push(Err(RemoteError::Transport("connection reset".into())));
                chunks
            }
            Step::Corrupt => {
                let mid = body.len() / 2;
                if let Some(b) = body.get_mut(mid) {
                    *b ^= 0xff;
                }
                chunked(&body)
            }
            Step::Stall(n) => {
                body.truncate(n);
                chunked(&body)
            }
            _ => chunked(&body),
        };
        self.bytes_served.fetch_add(body.len() as u64, Ordering::SeqCst);

        let sent = futures_util::stream::iter(chunks);
        let stream: BoxStream<'static, _> = match step {
            Step::Stall(_) => Box::pin(sent.chain(futures_util::stream::pending())),
            _ => Box::pin(sent),
        };
        Ok(RemoteBody {
            total: Some(total),
            resumed,
            stream,
        })
    }
}
