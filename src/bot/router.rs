use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::Bot;
use crate::models::{InboundEvent, SessionId};

type Workers = Arc<Mutex<HashMap<SessionId, mpsc::UnboundedSender<InboundEvent>>>>;

enum Next {
    Event(InboundEvent),
    Closed,
    Idle,
}

/// Runs each session's events in arrival order on a dedicated worker task,
/// while different sessions proceed concurrently.
///
/// A worker retires after `idle` without events. Retirement and dispatch
/// both happen under the worker map lock, so an event is never queued on a
/// worker that has already decided to exit.
///
/// Once `shutdown` is cancelled, workers finish the events already queued and
/// exit; after a fatal error they stop before the next event instead.
#[derive(Clone)]
pub struct SessionRouter {
    bot: Arc<Bot>,
    failed: Arc<AtomicBool>,
    idle: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    workers: Workers,
}

impl SessionRouter {
    /// Fatal handler errors cancel `shutdown`.
    pub fn new(bot: Arc<Bot>, idle: Duration, shutdown: CancellationToken) -> Self {
        Self {
            bot,
            failed: Arc::new(AtomicBool::new(false)),
            idle,
            shutdown,
            tracker: TaskTracker::new(),
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dispatch(&self, event: InboundEvent) {
        if self.shutdown.is_cancelled() {
            tracing::debug!("Dropping event received during shutdown");
            return;
        }

        let session = event.session();
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());

        let event = match workers.get(&session) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker exited (e.g. panicked); start a fresh one.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }
        workers.insert(session, tx);
        drop(workers);

        self.tracker.spawn(self.clone().run_worker(session, rx));
    }

    /// Waits up to `deadline` for every worker to exit. Returns false if some
    /// were still running when it elapsed.
    pub async fn drain(&self, deadline: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(deadline, self.tracker.wait())
            .await
            .is_ok()
    }

    /// True once a handler hit a fatal error.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Number of sessions with a live worker.
    pub fn active_sessions(&self) -> usize {
        self.workers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn run_worker(self, session: SessionId, mut rx: mpsc::UnboundedReceiver<InboundEvent>) {
        loop {
            if self.has_failed() {
                self.workers
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&session);
                break;
            }

            let next = tokio::select! {
                biased;
                received = tokio::time::timeout(self.idle, rx.recv()) => match received {
                    Ok(Some(event)) => Next::Event(event),
                    Ok(None) => Next::Closed,
                    Err(_) => Next::Idle,
                },
                _ = self.shutdown.cancelled() => Next::Idle,
            };

            let event = match next {
                Next::Event(event) => event,
                Next::Closed => break,
                Next::Idle => {
                    let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
                    match rx.try_recv() {
                        Ok(event) => event,
                        Err(_) => {
                            workers.remove(&session);
                            break;
                        }
                    }
                }
            };

            if let Err(e) = self.bot.handle(event).await {
                if e.is_fatal() {
                    tracing::error!(%session, error = %e, "Fatal error, shutting down");
                    self.failed.store(true, Ordering::SeqCst);
                    self.shutdown.cancel();
                } else {
                    tracing::warn!(%session, error = %e, "Failed to handle event");
                }
            }
        }
        tracing::trace!(%session, "Session worker retired");
    }
}
