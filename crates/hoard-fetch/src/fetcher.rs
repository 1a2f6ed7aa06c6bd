use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use hoard_catalog::WorkItem;
use hoard_verify::{Digest, IntegrityVerifier, Verified};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::credential::CredentialHolder;
use crate::error::{AttemptError, ErrorClass, FetchError, RemoteError};
use crate::progress::{FetchPhase, Progress};
use crate::remote::Remote;

pub type ProgressCallback = Arc<dyn Fn(&Progress<'_>) + Send + Sync>;

/// Configuration for [`ResumableFetcher`].
#[derive(Clone)]
pub struct FetchOptions {
    /// Total attempts per item, including the first. Values below 1 are
    /// treated as 1.
    ///
    /// Default: 5
    pub max_attempts: u32,

    /// Delay policy between attempts.
    pub backoff: Backoff,

    /// Longest wait for the remote: initiation, opening the body, and the
    /// gap between two body chunks. Exceeding it fails the attempt as a
    /// transport error.
    ///
    /// Default: 60s
    pub stall_timeout: Duration,

    /// Invoked on phase transitions and after each written chunk.
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("stall_timeout", &self.stall_timeout)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_attempts:  5,
            backoff:       Backoff::default(),
            stall_timeout: Duration::from_secs(60),
            on_progress:   None,
        }
    }
}

impl FetchOptions {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&Progress<'_>) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

/// Terminal result of fetching one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The archive is on disk, structurally sound, and hashes to `digest`.
    Success {
        digest:      Digest,
        size:        u64,
        /// Bytes received over the network across all attempts.
        transferred: u64,
        attempts:    u32,
    },
    /// The remote no longer has the asset.
    PermanentSkip { reason: String },
    /// Every attempt failed; `reason` describes the last one.
    Failure { attempts: u32, reason: String },
}

/// Downloads one archive at a time, continuing partial files and verifying
/// the result before reporting success.
///
/// The only resume state is the size of the destination file, so a process
/// killed mid-stream leaves a valid resume point behind.
pub struct ResumableFetcher<R: Remote> {
    remote:   R,
    verifier: IntegrityVerifier,
    options:  FetchOptions,
}

impl<R: Remote> ResumableFetcher<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            verifier: IntegrityVerifier::new(),
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn remote(&self) -> &R { &self.remote }

    pub fn options(&self) -> &FetchOptions { &self.options }

    /// Fetch `item` with bounded retry.
    ///
    /// An expired credential is not retried here; it is returned as
    /// [`FetchError::CredentialExpired`] so the caller can refresh it and
    /// call again.
    pub async fn fetch(&self, item: &WorkItem, credentials: &CredentialHolder) -> Result<FetchOutcome, FetchError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut transferred = 0u64;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let (credential, generation) = credentials.current();

            match self.attempt(item, credential.as_str(), attempt, &mut transferred).await {
                Ok(verified) => {
                    info!(
                        asset = %item.id,
                        attempt,
                        size = verified.size,
                        digest = %verified.digest,
                        "archive verified"
                    );
                    self.report(Progress {
                        asset: &item.id,
                        phase: FetchPhase::Completed,
                        bytes_on_disk: verified.size,
                        chunk: 0,
                        total_bytes: Some(verified.size),
                        attempt,
                    });
                    return Ok(FetchOutcome::Success {
                        digest: verified.digest,
                        size: verified.size,
                        transferred,
                        attempts: attempt,
                    });
                }
                Err(AttemptError::Remote(e)) if e.class() == ErrorClass::Permanent => {
                    info!(asset = %item.id, error = %e, "asset absent on remote; skipping");
                    return Ok(FetchOutcome::PermanentSkip { reason: e.to_string() });
                }
                Err(AttemptError::Remote(e)) if e.class() == ErrorClass::Reauthenticate => {
                    warn!(asset = %item.id, generation, "credential rejected");
                    return Err(FetchError::CredentialExpired { generation });
                }
                Err(e) => {
                    warn!(asset = %item.id, attempt, max_attempts, error = %e, "attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                let delay = self.options.backoff.next_delay(attempt - 1);
                debug!(asset = %item.id, ?delay, "backing off");
                tokio::time::sleep(delay).await;
            }
        }

        Ok(FetchOutcome::Failure {
            attempts: max_attempts,
            reason:   last_error,
        })
    }

    async fn attempt(
        &self,
        item: &WorkItem,
        credential: &str,
        attempt: u32,
        transferred: &mut u64,
    ) -> Result<Verified, AttemptError> {
        let destination = item.destination.as_path();
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let offset = hoard_fs::file_len(destination)?;
        self.report(Progress {
            asset: &item.id,
            phase: FetchPhase::Connecting,
            bytes_on_disk: offset,
            chunk: 0,
            total_bytes: item.expected_len,
            attempt,
        });

        let stall = self.options.stall_timeout;
        let handle = within(stall, "initiation", self.remote.initiate(item, credential)).await?;
        let body = within(stall, "opening the body", self.remote.open(&handle, offset)).await?;
        let total = body.total.or(handle.expected_len).or(item.expected_len);

        let (mut file, mut on_disk) = if offset > 0 && body.resumed {
            debug!(asset = %item.id, offset, ?total, "resuming");
            (OpenOptions::new().append(true).open(destination).await?, offset)
        } else {
            if offset > 0 {
                debug!(asset = %item.id, offset, "remote restarted from zero; truncating");
            }
            (File::create(destination).await?, 0)
        };

        let mut stream = body.stream;
        let streamed = async {
            loop {
                let next = tokio::time::timeout(stall, stream.next())
                    .await
                    .map_err(|_| stalled("body", stall))?;
                let Some(chunk) = next else { break };
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                on_disk += chunk.len() as u64;
                *transferred += chunk.len() as u64;
                self.report(Progress {
                    asset: &item.id,
                    phase: FetchPhase::Downloading,
                    bytes_on_disk: on_disk,
                    chunk: chunk.len() as u64,
                    total_bytes: total,
                    attempt,
                });
            }
            Ok::<(), AttemptError>(())
        }
        .await;

        // Whatever arrived stays on disk as the next resume point.
        file.flush().await?;
        file.sync_data().await?;
        drop(file);
        streamed?;

        let actual = hoard_fs::file_len(destination)?;
        if let Some(expected) = total
            && actual != expected
        {
            if actual > expected {
                // Longer than the archive itself: no prefix of it can be trusted.
                hoard_fs::remove_if_exists(destination)?;
            }
            return Err(AttemptError::SizeMismatch { expected, actual });
        }

        self.report(Progress {
            asset: &item.id,
            phase: FetchPhase::Verifying,
            bytes_on_disk: actual,
            chunk: 0,
            total_bytes: total,
            attempt,
        });
        self.verify(destination).await
    }

    async fn verify(&self, destination: &Path) -> Result<Verified, AttemptError> {
        let verifier = self.verifier;
        let path = destination.to_path_buf();
        let result = tokio::task::spawn_blocking(move || verifier.verify(&path))
            .await
            .map_err(|e| AttemptError::Local(e.to_string()))?;

        match result {
            Ok(verified) => Ok(verified),
            Err(e) if e.is_corrupt() => {
                // A corrupt tail is not a resume point; start over next time.
                hoard_fs::remove_if_exists(destination)?;
                Err(AttemptError::Corrupt(e.to_string()))
            }
            Err(e) => Err(AttemptError::Local(e.to_string())),
        }
    }

    fn report(&self, progress: Progress<'_>) {
        if let Some(ref callback) = self.options.on_progress {
            callback(&progress);
        }
    }
}

async fn within<T>(
    limit: Duration,
    stage: &str,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    tokio::time::timeout(limit, call).await.map_err(|_| stalled(stage, limit))?
}

fn stalled(stage: &str, limit: Duration) -> RemoteError {
    RemoteError::Transport(format!("{stage} stalled for {limit:?}"))
}
