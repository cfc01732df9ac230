//! Operation handles
//!
//! An [`OperationHandle`] wraps the snapshot returned by the call that started
//! a long-running operation, together with the shared [`OperationService`]
//! used to ask for fresh status. Queries (`is_done`, `is_error`, `result`)
//! only read the cached snapshot; `refresh` and `wait_until_done` are the only
//! methods that perform I/O.
//!
//! # Example
//!
//! ```rust,ignore
//! use optrack_core::{OperationHandle, json_decoder};
//! use std::sync::Arc;
//!
//! // `snapshot` comes back from the RPC that created the instance
//! let mut handle = OperationHandle::new(snapshot, Arc::clone(&service), json_decoder::<_, Instance>());
//!
//! handle.wait_until_done().await?;
//! if handle.is_error() {
//!     eprintln!("create failed: {}", handle.error().unwrap());
//! } else if let Some(instance) = handle.result() {
//!     println!("created {}", instance?.name);
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backoff::{BackoffPolicy, MIN_DELAY};
use crate::decoder::ResultDecoder;
use crate::error::{CoreError, Result};
use crate::operation::{
    OperationError, OperationId, OperationSnapshot, OperationState, OperationStatus, Payload,
};
use crate::progress::{WaitCallback, WaitEvent, emit};
use crate::service::OperationService;

/// Client-side tracker for one server-side operation
pub struct OperationHandle<S: ?Sized, T> {
    snapshot: OperationSnapshot,
    service: Arc<S>,
    decoder: ResultDecoder<S, T>,
    backoff: BackoffPolicy,
}

impl<S, T> OperationHandle<S, T>
where
    S: OperationService + ?Sized,
{
    /// Wrap the snapshot returned by the initiating call
    ///
    /// No I/O happens here.
    pub fn new(
        snapshot: OperationSnapshot,
        service: Arc<S>,
        decoder: ResultDecoder<S, T>,
    ) -> Self {
        Self {
            snapshot,
            service,
            decoder,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Use `backoff` for `wait_until_done`
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn id(&self) -> &OperationId {
        &self.snapshot.name
    }

    /// Last-known snapshot; may be stale relative to the server
    pub fn snapshot(&self) -> &OperationSnapshot {
        &self.snapshot
    }

    pub fn status(&self) -> &OperationStatus {
        &self.snapshot.status
    }

    pub fn state(&self) -> OperationState {
        self.snapshot.state()
    }

    pub fn metadata(&self) -> Option<&Payload> {
        self.snapshot.metadata.as_ref()
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn into_snapshot(self) -> OperationSnapshot {
        self.snapshot
    }

    /// True once the operation has succeeded or failed
    pub fn is_done(&self) -> bool {
        self.snapshot.status.is_terminal()
    }

    /// True if the operation finished unsuccessfully
    pub fn is_error(&self) -> bool {
        matches!(self.snapshot.status, OperationStatus::Failed { .. })
    }

    /// Server-reported failure cause, if the operation failed
    pub fn error(&self) -> Option<&OperationError> {
        match &self.snapshot.status {
            OperationStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Decoded result, if the operation succeeded
    ///
    /// Returns `None` while pending and when the operation failed.
    pub fn result(&self) -> Option<T> {
        match &self.snapshot.status {
            OperationStatus::Succeeded { result } => {
                Some((self.decoder)(result, self.service.as_ref()))
            }
            _ => None,
        }
    }

    /// Fetch the current status once and update the snapshot
    ///
    /// A still-pending reply is a normal outcome. Service errors propagate
    /// unchanged and leave the snapshot untouched.
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        self.fetch().await?;
        Ok(self)
    }

    /// Refresh with backoff until the operation is done
    ///
    /// Returns immediately if the snapshot is already terminal. There is no
    /// deadline; see [`wait_until_done_with`](Self::wait_until_done_with) for
    /// timeouts and cancellation.
    pub async fn wait_until_done(&mut self) -> Result<&mut Self> {
        self.wait_until_done_with(WaitOptions::default()).await
    }

    /// [`wait_until_done`](Self::wait_until_done) with cancellation, an overall
    /// timeout, progress callbacks or a one-off backoff policy
    pub async fn wait_until_done_with(&mut self, options: WaitOptions) -> Result<&mut Self> {
        if self.is_done() {
            return Ok(self);
        }

        let WaitOptions {
            cancel,
            timeout,
            on_progress,
            backoff,
        } = options;
        let backoff = backoff.unwrap_or_else(|| self.backoff.clone());
        if let Err(e) = backoff.validate() {
            warn!("{}; delays are clamped to at least {:?}", e, MIN_DELAY);
        }

        let poll = self.poll_until_done(&backoff, cancel.as_ref(), &on_progress);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, poll).await.map_err(|_| {
                warn!("Gave up waiting for operation after {:?}", limit);
                CoreError::Timeout(limit)
            })??,
            None => poll.await?,
        }

        Ok(self)
    }

    async fn poll_until_done(
        &mut self,
        backoff: &BackoffPolicy,
        cancel: Option<&CancellationToken>,
        on_progress: &Option<WaitCallback>,
    ) -> Result<()> {
        let start = Instant::now();
        let mut delays = backoff.delays();
        let mut attempt: u32 = 0;

        emit(
            on_progress,
            WaitEvent::Started {
                operation: self.id().clone(),
            },
        );

        loop {
            self.check_cancelled(cancel)?;

            attempt += 1;
            self.fetch().await?;
            let elapsed = start.elapsed();

            if self.is_done() {
                emit(
                    on_progress,
                    WaitEvent::Polling {
                        operation: self.id().clone(),
                        attempt,
                        state: self.state(),
                        elapsed,
                        next_delay: None,
                    },
                );
                self.emit_finished(on_progress, attempt, elapsed);
                info!(
                    "Operation {} {} after {} refreshes ({:.1}s)",
                    self.id(),
                    self.state(),
                    attempt,
                    elapsed.as_secs_f64()
                );
                return Ok(());
            }

            let delay = delays.next().unwrap_or_else(|| backoff.max_delay());
            emit(
                on_progress,
                WaitEvent::Polling {
                    operation: self.id().clone(),
                    attempt,
                    state: self.state(),
                    elapsed,
                    next_delay: Some(delay),
                },
            );

            self.check_cancelled(cancel)?;
            trace!("Operation {} still pending, sleeping {:?}", self.id(), delay);
            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(CoreError::Cancelled(self.id().clone())),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    /// One status round-trip, applied to the snapshot
    async fn fetch(&mut self) -> Result<()> {
        debug!("Refreshing operation {}", self.id());
        let fetched = self.service.fetch_status(self.id()).await.map_err(|e| {
            debug!("Refreshing operation {} failed: {}", self.id(), e);
            CoreError::from(e)
        })?;
        self.apply(fetched)
    }

    fn apply(&mut self, fetched: OperationSnapshot) -> Result<()> {
        if fetched.name != self.snapshot.name {
            return Err(CoreError::OperationMismatch {
                expected: self.snapshot.name.clone(),
                actual: fetched.name,
            });
        }

        let previous = self.state();
        if previous.is_terminal() && fetched.status != self.snapshot.status {
            warn!(
                "Ignoring {} status for operation {} which already {}",
                fetched.state(),
                self.id(),
                previous
            );
            return Ok(());
        }

        self.snapshot = fetched;
        let current = self.state();
        if current != previous {
            info!("Operation {} is now {}", self.id(), current);
        } else {
            debug!("Operation {} is {}", self.id(), current);
        }
        Ok(())
    }

    fn check_cancelled(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        match cancel {
            Some(token) if token.is_cancelled() => {
                debug!("Wait for operation {} cancelled", self.id());
                Err(CoreError::Cancelled(self.id().clone()))
            }
            _ => Ok(()),
        }
    }

    fn emit_finished(&self, on_progress: &Option<WaitCallback>, attempts: u32, elapsed: Duration) {
        let event = match &self.snapshot.status {
            OperationStatus::Succeeded { .. } => WaitEvent::Completed {
                operation: self.id().clone(),
                attempts,
                elapsed,
            },
            OperationStatus::Failed { error } => WaitEvent::Failed {
                operation: self.id().clone(),
                error: error.clone(),
                elapsed,
            },
            OperationStatus::Pending => return,
        };
        emit(on_progress, event);
    }
}

impl<S: ?Sized, T> fmt::Debug for OperationHandle<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("snapshot", &self.snapshot)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Optional knobs for [`OperationHandle::wait_until_done_with`]
///
/// # Example
///
/// ```rust
/// use optrack_core::{BackoffPolicy, WaitOptions};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let options = WaitOptions::new()
///     .cancel(token.clone())
///     .timeout(Duration::from_secs(600))
///     .backoff(BackoffPolicy::fixed(Duration::from_secs(5)));
/// assert_eq!(options.timeout_duration(), Some(Duration::from_secs(600)));
/// ```
#[derive(Default)]
pub struct WaitOptions {
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
    on_progress: Option<WaitCallback>,
    backoff: Option<BackoffPolicy>,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the wait once `token` is cancelled
    ///
    /// The token is checked before every refresh and every delay, and the
    /// delay itself is cut short by cancellation.
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Give up with [`CoreError::Timeout`] after `timeout`
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(WaitEvent) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Override the handle's backoff for this wait only
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn backoff_policy(&self) -> Option<&BackoffPolicy> {
        self.backoff.as_ref()
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("cancel", &self.cancel)
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .field("backoff", &self.backoff)
            .finish()
    }
}
