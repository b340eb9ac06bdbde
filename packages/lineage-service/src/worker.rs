//! Batch worker
//!
//! Single consumer of the event queue. Events are collected in memory and
//! flushed when either `batch_size` events are pending or `flush_interval`
//! has elapsed since the last flush, whichever comes first.
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopping --(join + drain)--> Stopped
//! ```
//!
//! A flush commits events and derived edges in one store transaction. A
//! failed flush discards the batch (at-most-once); an optional
//! [`DeadLetterSink`] sees what was discarded.

use lineage_storage::{LineageEvent, LineageStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::deriver::derive_edges;
use crate::error::{LineageError, Result};
use crate::stats::IngestStats;

/// Receives batches discarded by a failed flush
pub trait DeadLetterSink: Send + Sync {
    fn on_discarded(&self, events: &[LineageEvent], error: &LineageError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    Stopping,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Stopped => "stopped",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub stop_timeout: Duration,
}

struct Control {
    state: WorkerState,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Everything the loop and the shutdown drain share
struct Shared {
    rx: tokio::sync::Mutex<mpsc::Receiver<LineageEvent>>,
    store: Arc<dyn LineageStore>,
    stats: Arc<IngestStats>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    settings: WorkerSettings,
}

enum Received {
    Event(LineageEvent),
    Timeout,
    Closed,
}

pub struct BatchWorker {
    shared: Arc<Shared>,
    control: Mutex<Control>,
    // Held for the whole of `stop`, so a concurrent caller returns only
    // after the first caller's drain has finished
    stopping: tokio::sync::Mutex<()>,
}

impl BatchWorker {
    pub fn new(
        rx: mpsc::Receiver<LineageEvent>,
        store: Arc<dyn LineageStore>,
        stats: Arc<IngestStats>,
        dead_letter: Option<Arc<dyn DeadLetterSink>>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                rx: tokio::sync::Mutex::new(rx),
                store,
                stats,
                dead_letter,
                settings,
            }),
            control: Mutex::new(Control {
                state: WorkerState::Stopped,
                cancel: None,
                handle: None,
            }),
            stopping: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.control.lock().state
    }

    /// Running and the task has not exited
    pub fn is_alive(&self) -> bool {
        let control = self.control.lock();
        control.state == WorkerState::Running
            && control.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the worker task on the current tokio runtime.
    ///
    /// No-op unless the worker is `Stopped`.
    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock();
        if control.state != WorkerState::Stopped {
            debug!(state = %control.state, "Batch worker already started");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LineageError::NoRuntime)?;
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run(Arc::clone(&self.shared), cancel.clone()));

        control.cancel = Some(cancel);
        control.handle = Some(handle);
        control.state = WorkerState::Running;

        info!(
            batch_size = self.shared.settings.batch_size,
            flush_interval_ms = self.shared.settings.flush_interval.as_millis() as u64,
            "Batch worker started"
        );
        Ok(())
    }

    /// Stop the worker and persist everything still queued.
    ///
    /// Waits up to `stop_timeout` for the task, then drains the queue and
    /// flushes it in `batch_size` chunks. Safe to call repeatedly; when the
    /// worker was never started the queue is still drained. Concurrent calls
    /// wait for the one in progress to finish its drain.
    pub async fn stop(&self) -> Result<()> {
        let _stopping = self.stopping.lock().await;

        let (cancel, handle) = {
            let mut control = self.control.lock();
            control.state = WorkerState::Stopping;
            (control.cancel.take(), control.handle.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        let mut result = Ok(());
        if let Some(handle) = handle {
            let timeout = self.shared.settings.stop_timeout;
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Batch worker terminated abnormally");
                    result = Err(LineageError::WorkerJoin(e.to_string()));
                }
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Batch worker did not stop in time");
                    result = Err(LineageError::StopTimeout(timeout));
                }
            }
        }

        let drained = self.shared.drain_and_flush().await;
        self.control.lock().state = WorkerState::Stopped;
        info!(drained, "Batch worker stopped");
        result
    }
}

impl Drop for BatchWorker {
    fn drop(&mut self) {
        if let Some(cancel) = self.control.get_mut().cancel.take() {
            cancel.cancel();
        }
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let WorkerSettings {
        batch_size,
        flush_interval,
        ..
    } = shared.settings;

    let mut batch: Vec<LineageEvent> = Vec::with_capacity(batch_size);
    let mut last_flush = Instant::now();

    loop {
        let wait = flush_interval.saturating_sub(last_flush.elapsed());
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = shared.recv_timeout(wait) => received,
        };

        match received {
            Received::Event(event) => batch.push(event),
            Received::Timeout => {}
            Received::Closed => {
                debug!("Event queue closed");
                break;
            }
        }

        if batch.len() >= batch_size || last_flush.elapsed() >= flush_interval {
            if !batch.is_empty() {
                shared.flush(&batch).await;
                batch.clear();
            }
            last_flush = Instant::now();
        }
    }

    if !batch.is_empty() {
        shared.flush(&batch).await;
    }
}

impl Shared {
    async fn recv_timeout(&self, wait: Duration) -> Received {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(event)) => Received::Event(event),
            Ok(None) => Received::Closed,
            Err(_) => Received::Timeout,
        }
    }

    async fn drain_and_flush(&self) -> usize {
        let mut pending = Vec::new();
        {
            let mut rx = self.rx.lock().await;
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }

        for chunk in pending.chunks(self.settings.batch_size.max(1)) {
            self.flush(chunk).await;
        }
        pending.len()
    }

    /// Persist one batch; returns whether it committed
    async fn flush(&self, batch: &[LineageEvent]) -> bool {
        let edges = derive_edges(batch);

        match self.store.commit_batch(batch, &edges).await {
            Ok(commit) => {
                self.stats
                    .record_persisted(commit.events_inserted, commit.edges_created);
                debug!(
                    batch_size = batch.len(),
                    edges = commit.edges_upserted,
                    edges_created = commit.edges_created,
                    "Flushed lineage batch"
                );
                true
            }
            Err(e) => {
                let err = LineageError::from(e);
                self.stats.record_failed(batch.len());
                error!(
                    batch_size = batch.len(),
                    edges = edges.len(),
                    category = %err.category(),
                    error = %err,
                    "Lineage batch discarded"
                );
                if let Some(sink) = &self.dead_letter {
                    sink.on_discarded(batch, &err);
                }
                false
            }
        }
    }
}
