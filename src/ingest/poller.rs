//! Polling loop that turns visible chat messages into ingestion events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ingest::dedup::FingerprintCache;
use crate::ingest::message::IngestedMessage;
use crate::ingest::source::{MessageSource, SourceError};

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default number of recent messages looked at per poll.
pub const DEFAULT_MAX_MESSAGES: usize = 10;

/// Result of asking the ingestor to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A polling loop is already running; nothing changed.
    AlreadyPolling,
    /// The source is not connected; polling was not started.
    NotConnected,
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub emitted: usize,
    pub duplicates: usize,
    pub skipped_self: usize,
    pub oversized: usize,
}

struct Inner {
    source: Arc<dyn MessageSource>,
    max_messages: usize,
    /// Held for the whole tick, so ticks never overlap.
    cache: Mutex<FingerprintCache>,
    /// Set when a reset was requested while a tick held the cache.
    reset_pending: AtomicBool,
    events: mpsc::UnboundedSender<IngestedMessage>,
}

struct PollTask {
    cancel: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Polls a [`MessageSource`] and emits each new non-self message once.
pub struct MessageIngestor {
    inner: Arc<Inner>,
    task: StdMutex<Option<PollTask>>,
}

impl MessageIngestor {
    /// Create an ingestor and the receiving end of its event stream.
    pub fn new(
        source: Arc<dyn MessageSource>,
        max_messages: usize,
    ) -> (Self, mpsc::UnboundedReceiver<IngestedMessage>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            source,
            max_messages: max_messages.max(1),
            cache: Mutex::new(FingerprintCache::new()),
            reset_pending: AtomicBool::new(false),
            events,
        });
        let ingestor = Self {
            inner,
            task: StdMutex::new(None),
        };
        (ingestor, rx)
    }

    pub fn is_polling(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    /// Start polling every `interval`.
    ///
    /// Does nothing if already polling or if the source is not connected.
    /// The fingerprint cache is reset on every successful start. The task
    /// slot stays locked from the check until the new loop is installed, so
    /// concurrent callers see exactly one `Started`.
    pub fn start(&self, interval: Duration) -> StartOutcome {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            info!("Message polling already running");
            return StartOutcome::AlreadyPolling;
        }
        if !self.inner.source.is_connected() {
            warn!("Source not connected, message polling not started");
            return StartOutcome::NotConnected;
        }

        self.inner.reset_cache();

        let cancel = Arc::new(Notify::new());
        let cancel_clone = cancel.clone();
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the first poll happens one interval in.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = cancel_clone.notified() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        match inner.tick().await {
                            Ok(report) if report.emitted > 0 => {
                                debug!(emitted = report.emitted, duplicates = report.duplicates, "Poll finished");
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Message poll failed: {e}"),
                        }
                    }
                }
            }
        });

        *task = Some(PollTask { cancel, handle });
        info!("Message polling started, interval {}ms", interval.as_millis());
        StartOutcome::Started
    }

    /// Stop polling and forget every fingerprint.
    ///
    /// A poll that is already running is allowed to finish and still emits
    /// its events.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(task) = task.take() {
            task.cancel.notify_one();
            self.inner.reset_cache();
            info!("Message polling stopped");
        }
    }

    /// Run a single poll right now.
    ///
    /// Waits for any in-flight poll to finish first.
    pub async fn poll_once(&self) -> Result<TickReport, SourceError> {
        self.inner.tick().await
    }

    /// Number of fingerprints currently remembered.
    pub async fn cache_len(&self) -> usize {
        self.inner.lock_cache().await.len()
    }

    /// How many times the fingerprint cache overflowed and was wiped.
    pub async fn cache_resets(&self) -> u64 {
        self.inner.lock_cache().await.resets()
    }
}

impl Drop for MessageIngestor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    /// Clear the cache now, or on next lock if a tick is holding it.
    fn reset_cache(&self) {
        match self.cache.try_lock() {
            Ok(mut cache) => {
                cache.clear();
                self.reset_pending.store(false, Ordering::SeqCst);
            }
            Err(_) => self.reset_pending.store(true, Ordering::SeqCst),
        }
    }

    async fn lock_cache(&self) -> MutexGuard<'_, FingerprintCache> {
        let mut cache = self.cache.lock().await;
        if self.reset_pending.swap(false, Ordering::SeqCst) {
            cache.clear();
        }
        cache
    }

    async fn tick(&self) -> Result<TickReport, SourceError> {
        let mut cache = self.lock_cache().await;

        if !self.source.is_connected() {
            return Err(SourceError::NotConnected);
        }
        let mut messages = self.source.poll_recent_messages(self.max_messages).await?;
        let skip = messages.len().saturating_sub(self.max_messages);
        messages.drain(..skip);

        let mut report = TickReport::default();
        for raw in messages {
            if raw.is_self {
                report.skipped_self += 1;
                continue;
            }
            if raw.text.trim().is_empty() {
                continue;
            }
            if raw.is_oversized() {
                report.oversized += 1;
                continue;
            }
            if !cache.insert(raw.fingerprint()) {
                report.duplicates += 1;
                continue;
            }

            let event = IngestedMessage::from_raw(raw);
            info!("[new message] {}: {}", event.sender_name, event.preview());
            if self.events.send(event).is_err() {
                debug!("Ingestion receiver dropped, event discarded");
            }
            report.emitted += 1;
        }
        Ok(report)
    }
}
