//! Upload session: state machine, control surface and transfer loop

use crate::{
    events::{EventDispatcher, EventKind, UploadEvent},
    protocol::{interpret_response, ContentRange, ExchangeOutcome, UploadRequest},
    ChunkSource, HttpTransport, ReadAt, Result, SendProgress, UploadConfig, UploadError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn, Instrument, Span};

/// Upload state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Transferring, waiting to retry, or stalled after exhausting retries
    InProgress,
    /// Paused by the caller
    Paused,
    /// Cancelled by the caller, terminal
    Cancelled,
    /// Completed, terminal
    Done,
}

impl UploadStatus {
    /// Check if no transition can leave this state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Done)
    }
}

/// Upload progress information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes confirmed by the endpoint
    pub bytes_confirmed: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_confirmed as f64 / self.total_bytes as f64) * 100.0
    }
}

struct SessionState {
    status: UploadStatus,
    progress: u64,
    // Highest value sent to progress listeners, confirmed or in flight.
    reported: u64,
    last_error: Option<Arc<UploadError>>,
    retry_count: u32,
    // At most one transfer loop per session; guarded together with `status`.
    loop_active: bool,
    probe_requested: bool,
}

enum Recovery {
    Retry,
    Stop,
    Stalled,
}

struct Inner {
    total_size: u64,
    content_type: String,
    session_uri: String,
    max_retries: u32,
    retry_delay: Duration,
    transport: Arc<dyn HttpTransport>,
    chunks: tokio::sync::Mutex<ChunkSource>,
    state: Mutex<SessionState>,
    events: EventDispatcher,
    settled: Notify,
    runtime: tokio::runtime::Handle,
    span: Span,
}

/// Handle to a running resumable upload.
///
/// Cloning the handle is cheap; all clones control the same upload. The
/// transfer loop runs on the tokio runtime the upload was started from and
/// keeps going while any work remains, even if every handle is dropped.
#[derive(Clone)]
pub struct UploadSession {
    inner: Arc<Inner>,
}

impl UploadSession {
    pub(crate) fn start(
        chunks: ChunkSource,
        session_uri: String,
        config: &UploadConfig,
        transport: Arc<dyn HttpTransport>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let inner = Arc::new(Inner {
            total_size: chunks.total_size(),
            content_type: chunks.content_type().to_string(),
            session_uri,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            transport,
            chunks: tokio::sync::Mutex::new(chunks),
            state: Mutex::new(SessionState {
                status: UploadStatus::InProgress,
                progress: 0,
                reported: 0,
                last_error: None,
                retry_count: 0,
                loop_active: true,
                probe_requested: false,
            }),
            events: EventDispatcher::new(),
            settled: Notify::new(),
            runtime,
            span: Span::current(),
        });

        let session = Self { inner };
        session.spawn_loop(ReadAt::Cursor);
        session
    }

    fn spawn_loop(&self, at: ReadAt) {
        let inner = Arc::clone(&self.inner);
        let span = self.inner.span.clone();
        self.inner.runtime.spawn(inner.drive(at).instrument(span));
    }

    // ==================== Control ====================

    /// Pause the upload. A request already in flight completes, but its
    /// result is discarded and no further requests are sent.
    pub fn pause(&self) {
        let paused = {
            let mut state = self.inner.state.lock();
            if state.status == UploadStatus::InProgress {
                state.status = UploadStatus::Paused;
                true
            } else {
                false
            }
        };

        if paused {
            info!(session_uri = %self.inner.session_uri, "upload paused");
            self.inner.events.emit(UploadEvent::Paused);
        }
    }

    /// Resume a paused or stalled upload. The next request is always a probe
    /// asking the endpoint how many bytes it holds.
    pub fn resume(&self) {
        let spawn = {
            let mut state = self.inner.state.lock();
            match state.status {
                UploadStatus::Paused => {}
                UploadStatus::InProgress if !state.loop_active => {}
                _ => return,
            }
            state.status = UploadStatus::InProgress;
            state.retry_count = 0;
            if state.loop_active {
                state.probe_requested = true;
                false
            } else {
                state.loop_active = true;
                true
            }
        };

        info!(session_uri = %self.inner.session_uri, "upload resumed");
        if spawn {
            self.spawn_loop(ReadAt::Probe);
        }
    }

    /// Cancel the upload. Cancelling twice has no further effect.
    pub fn cancel(&self) {
        let cancelled = {
            let mut state = self.inner.state.lock();
            if state.status.is_terminal() {
                false
            } else {
                state.status = UploadStatus::Cancelled;
                true
            }
        };

        if cancelled {
            info!(session_uri = %self.inner.session_uri, "upload cancelled");
            self.inner.events.emit(UploadEvent::Cancelled);
        }
    }

    // ==================== Inspection ====================

    /// Current state
    pub fn status(&self) -> UploadStatus {
        self.inner.state.lock().status
    }

    /// Number of bytes confirmed by the endpoint
    pub fn progress(&self) -> u64 {
        self.inner.state.lock().progress
    }

    /// Progress with the total size
    pub fn snapshot(&self) -> UploadProgress {
        UploadProgress {
            bytes_confirmed: self.progress(),
            total_bytes: self.inner.total_size,
        }
    }

    /// Most recent transfer error
    pub fn last_error(&self) -> Option<Arc<UploadError>> {
        self.inner.state.lock().last_error.clone()
    }

    /// Consecutive failed attempts
    pub fn retry_count(&self) -> u32 {
        self.inner.state.lock().retry_count
    }

    /// Check if the upload gave up retrying and waits for [`resume`](Self::resume)
    pub fn is_stalled(&self) -> bool {
        let state = self.inner.state.lock();
        state.status == UploadStatus::InProgress && !state.loop_active
    }

    /// Total size of the upload
    pub fn total_size(&self) -> u64 {
        self.inner.total_size
    }

    /// Content type sent with data requests
    pub fn content_type(&self) -> &str {
        &self.inner.content_type
    }

    /// Session URI requests are sent to
    pub fn session_uri(&self) -> &str {
        &self.inner.session_uri
    }

    /// Wait until the transfer loop stops, returning the state it stopped in:
    /// done, cancelled, paused, or in progress when stalled.
    pub async fn settled(&self) -> UploadStatus {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.inner.state.lock().loop_active {
                return self.status();
            }
            notified.await;
        }
    }

    // ==================== Listeners ====================

    /// Register the listener for one kind of event. Events raised earlier are
    /// delivered immediately, in order.
    pub fn subscribe(&self, kind: EventKind, listener: impl Fn(&UploadEvent) + Send + Sync + 'static) {
        self.inner.events.subscribe(kind, Arc::new(listener));
    }

    /// Called whenever the number of uploaded bytes grows.
    ///
    /// The value is a byte count, not an offset: `1000` means bytes `0..=999`.
    /// While a chunk is being sent it includes the bytes handed to the
    /// connection so far; once the endpoint answers it is the count the
    /// endpoint confirmed. Values never decrease, so a count the endpoint
    /// later reports lower is not repeated. [`progress`](Self::progress)
    /// always returns the confirmed count.
    pub fn on_progress(&self, f: impl Fn(u64) + Send + Sync + 'static) {
        self.subscribe(EventKind::Progress, move |event: &UploadEvent| {
            if let UploadEvent::Progress(bytes) = event {
                f(*bytes);
            }
        });
    }

    /// Called for every failed attempt, retried or not
    pub fn on_error(&self, f: impl Fn(&UploadError) + Send + Sync + 'static) {
        self.subscribe(EventKind::Error, move |event: &UploadEvent| {
            if let UploadEvent::Error(err) = event {
                f(err);
            }
        });
    }

    /// Called once when the upload completes
    pub fn on_done(&self, f: impl Fn() + Send + Sync + 'static) {
        self.subscribe(EventKind::Done, move |_: &UploadEvent| f());
    }

    /// Called once when the upload is cancelled
    pub fn on_cancel(&self, f: impl Fn() + Send + Sync + 'static) {
        self.subscribe(EventKind::Cancel, move |_: &UploadEvent| f());
    }

    /// Called each time the upload goes from running to paused
    pub fn on_pause(&self, f: impl Fn() + Send + Sync + 'static) {
        self.subscribe(EventKind::Pause, move |_: &UploadEvent| f());
    }
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("session_uri", &self.inner.session_uri)
            .field("total_size", &self.inner.total_size)
            .field("status", &self.status())
            .field("progress", &self.progress())
            .finish()
    }
}

// ==================== Transfer Loop ====================

impl Inner {
    async fn drive(self: Arc<Self>, mut at: ReadAt) {
        debug!(session_uri = %self.session_uri, ?at, "transfer loop started");

        loop {
            {
                let mut state = self.state.lock();
                if state.status != UploadStatus::InProgress {
                    state.loop_active = false;
                    debug!(status = ?state.status, "transfer loop stopped");
                    drop(state);
                    self.settled.notify_waiters();
                    return;
                }
                if std::mem::take(&mut state.probe_requested) {
                    at = ReadAt::Probe;
                }
            }

            match self.exchange(at).await {
                Ok(outcome) => {
                    if let Some(next) = self.on_success(outcome) {
                        at = next;
                    }
                }
                Err(err) => match self.on_failure(err) {
                    Recovery::Retry => {
                        tokio::time::sleep(self.retry_delay).await;
                        at = ReadAt::Probe;
                    }
                    Recovery::Stop => {}
                    Recovery::Stalled => {
                        warn!(
                            session_uri = %self.session_uri,
                            max_retries = self.max_retries,
                            "retries exhausted, upload stalled until resumed"
                        );
                        self.settled.notify_waiters();
                        return;
                    }
                },
            }
        }
    }

    /// One HTTP exchange: read the chunk, send it, interpret the answer
    async fn exchange(self: &Arc<Self>, at: ReadAt) -> Result<ExchangeOutcome> {
        let chunk = self.chunks.lock().await.next(at).await?;
        let request = match chunk {
            None => UploadRequest::probe(),
            Some(chunk) => UploadRequest::data(chunk, self.total_size, &self.content_type)?,
        };
        let offset = match request.content_range {
            Some(ContentRange::Bytes { start, .. }) => start,
            _ => 0,
        };

        debug!(
            range = %request
                .content_range
                .map_or_else(|| "probe".to_string(), |r| r.to_string()),
            "sending chunk"
        );
        let response = self
            .transport
            .put_with_progress(
                &self.session_uri,
                request.headers,
                request.body,
                self.send_progress(offset),
            )
            .await?;
        debug!(status = response.status, range = ?response.header("range"), "received response");

        interpret_response(&response, self.total_size)
    }

    /// Reports bytes of the chunk at `offset` as they leave
    fn send_progress(self: &Arc<Self>, offset: u64) -> SendProgress {
        let inner = Arc::clone(self);
        Arc::new(move |sent| {
            let raised = {
                let mut state = inner.state.lock();
                if state.status != UploadStatus::InProgress {
                    return;
                }
                announce(&mut state, offset.saturating_add(sent).min(inner.total_size))
            };
            if let Some(progress) = raised {
                inner.events.emit(UploadEvent::Progress(progress));
            }
        })
    }

    /// Apply a successful exchange. Returns where to read next, or `None` when
    /// the result was discarded or the upload finished.
    fn on_success(&self, outcome: ExchangeOutcome) -> Option<ReadAt> {
        let mut state = self.state.lock();
        if state.status != UploadStatus::InProgress {
            debug!(status = ?state.status, "discarding response");
            return None;
        }
        state.retry_count = 0;

        match outcome {
            ExchangeOutcome::Complete => {
                let raised = advance(&mut state, self.total_size);
                state.status = UploadStatus::Done;
                drop(state);

                if let Some(progress) = raised {
                    self.events.emit(UploadEvent::Progress(progress));
                }
                info!(session_uri = %self.session_uri, size = self.total_size, "upload complete");
                self.events.emit(UploadEvent::Done);
                None
            }
            ExchangeOutcome::Partial(persisted) => {
                let raised = advance(&mut state, persisted);
                drop(state);

                if let Some(progress) = raised {
                    self.events.emit(UploadEvent::Progress(progress));
                }
                Some(ReadAt::Offset(persisted))
            }
        }
    }

    fn on_failure(&self, err: UploadError) -> Recovery {
        let err = Arc::new(err);
        let (recovery, retry_count) = {
            let mut state = self.state.lock();
            state.last_error = Some(Arc::clone(&err));

            let recovery = if state.status != UploadStatus::InProgress {
                Recovery::Stop
            } else if state.retry_count < self.max_retries {
                state.retry_count += 1;
                Recovery::Retry
            } else {
                state.loop_active = false;
                Recovery::Stalled
            };
            (recovery, state.retry_count)
        };

        warn!(error = %err, retry_count, "upload attempt failed");
        self.events.emit(UploadEvent::Error(err));
        recovery
    }
}

/// Raise confirmed progress, returning the value to report if listeners have
/// not seen it yet
fn advance(state: &mut SessionState, confirmed: u64) -> Option<u64> {
    state.progress = state.progress.max(confirmed);
    announce(state, confirmed)
}

fn announce(state: &mut SessionState, value: u64) -> Option<u64> {
    if value == 0 || value <= state.reported {
        return None;
    }
    state.reported = value;
    Some(value)
}
