//! Ordered background flushing
//!
//! The engine hands `(version, snapshot)` pairs to a [`FlushHandle`] without
//! waiting. A single tokio task writes them in order:
//! - queued snapshots are coalesced to the newest
//! - a version not newer than the last one written is skipped
//! - failed saves are retried with linear backoff, then reported
//!
//! A failure never touches the engine's in-memory ledger.

use crate::adapter::PersistenceAdapter;
use crate::error::PersistenceError;
use firedup_ledger::{FlushSink, Ledger};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Latest flush outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushStatus {
    /// Nothing written yet
    Idle,
    /// Snapshot `version` is durable
    Persisted {
        /// Version written
        version: u64,
    },
    /// Snapshot `version` could not be written after all attempts
    Failed {
        /// Version that failed
        version: u64,
        /// Last error
        error: String,
    },
}

/// How hard to try before reporting a failed flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per snapshot, at least one
    pub attempts: u32,
    /// Delay before the second attempt; grows linearly
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
enum FlushCommand {
    Write { version: u64, snapshot: Box<Ledger> },
    Barrier(oneshot::Sender<FlushStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Spawns the flush task
#[derive(Debug)]
pub struct FlushWorker;

impl FlushWorker {
    /// Start a worker writing through `adapter`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(adapter: PersistenceAdapter, policy: RetryPolicy) -> FlushHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(FlushStatus::Idle);
        tokio::spawn(run(adapter, policy, rx, status_tx));
        FlushHandle {
            tx,
            status: status_rx,
        }
    }
}

/// Handle to a running flush worker
#[derive(Debug, Clone)]
pub struct FlushHandle {
    tx: mpsc::UnboundedSender<FlushCommand>,
    status: watch::Receiver<FlushStatus>,
}

impl FlushHandle {
    /// Most recent outcome
    #[must_use]
    pub fn status(&self) -> FlushStatus {
        self.status.borrow().clone()
    }

    /// Watch outcomes as they happen
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FlushStatus> {
        self.status.clone()
    }

    /// Wait until everything scheduled so far has been written or has failed
    ///
    /// # Errors
    /// - `PersistenceError::WorkerClosed` if the worker is gone
    pub async fn flush(&self) -> Result<FlushStatus, PersistenceError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(FlushCommand::Barrier(reply))
            .map_err(|_| PersistenceError::WorkerClosed)?;
        done.await.map_err(|_| PersistenceError::WorkerClosed)
    }

    /// Drain pending writes and stop the worker
    ///
    /// # Errors
    /// - `PersistenceError::WorkerClosed` if the worker was already gone
    pub async fn shutdown(&self) -> Result<(), PersistenceError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(FlushCommand::Shutdown(reply))
            .map_err(|_| PersistenceError::WorkerClosed)?;
        done.await.map_err(|_| PersistenceError::WorkerClosed)
    }
}

impl FlushSink for FlushHandle {
    fn schedule(&self, version: u64, snapshot: Ledger) {
        let command = FlushCommand::Write {
            version,
            snapshot: Box::new(snapshot),
        };
        if self.tx.send(command).is_err() {
            warn!(version, "flush worker closed, snapshot not persisted");
        }
    }
}

struct Writer {
    adapter: PersistenceAdapter,
    policy: RetryPolicy,
    status: watch::Sender<FlushStatus>,
    last_written: Option<u64>,
}

impl Writer {
    async fn write(&mut self, version: u64, snapshot: &Ledger) {
        if let Some(last) = self.last_written {
            if version <= last {
                debug!(version, last, "skipping stale snapshot");
                return;
            }
        }

        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            match self.adapter.save(snapshot).await {
                Ok(()) => {
                    self.last_written = Some(version);
                    self.status.send_replace(FlushStatus::Persisted { version });
                    debug!(version, attempt, "snapshot persisted");
                    return;
                }
                Err(err) if attempt < attempts && err.is_retryable() => {
                    warn!(version, attempt, %err, "flush failed, retrying");
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                }
                Err(err) => {
                    error!(version, attempt, %err, "flush failed, in-memory state kept");
                    self.status.send_replace(FlushStatus::Failed {
                        version,
                        error: err.to_string(),
                    });
                    return;
                }
            }
        }
    }
}

async fn run(
    adapter: PersistenceAdapter,
    policy: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<FlushCommand>,
    status: watch::Sender<FlushStatus>,
) {
    let mut writer = Writer {
        adapter,
        policy,
        status,
        last_written: None,
    };
    let mut pending: Option<FlushCommand> = None;

    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            FlushCommand::Write {
                mut version,
                mut snapshot,
            } => {
                while let Ok(next) = rx.try_recv() {
                    match next {
                        FlushCommand::Write {
                            version: newer,
                            snapshot: newer_snapshot,
                        } => {
                            debug!(skipped = version, kept = newer, "coalescing queued snapshot");
                            if newer >= version {
                                version = newer;
                                snapshot = newer_snapshot;
                            }
                        }
                        other => {
                            pending = Some(other);
                            break;
                        }
                    }
                }
                writer.write(version, &snapshot).await;
            }
            FlushCommand::Barrier(reply) => {
                let _ = reply.send(writer.status.borrow().clone());
            }
            FlushCommand::Shutdown(reply) => {
                info!("flush worker stopping");
                let _ = reply.send(());
                return;
            }
        }
    }
    debug!("flush worker channel closed");
}
