//! Bounded concurrent operation queue.
//!
//! # Data Flow
//! ```text
//! submit(operation)
//!     → priority heap (priority desc, FIFO within a priority)
//!     → one of N worker tasks pops and runs the attempt
//!     → Requeue outcome re-enters the heap after the retry delay
//! shutdown()
//!     → workers stop, pending operations finalize as Cancelled
//! ```
//!
//! # Design Decisions
//! - Fixed worker count = the concurrency bound; the network phase only
//!   suspends the worker, it never blocks the runtime
//! - Retries go through submit like fresh work: no slot reservation
//! - Operation cancel tokens are children of the shutdown token, so
//!   shutdown also aborts in-flight transfers

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::service::definition::QueuePriority;
use crate::service::error::ServiceError;
use crate::service::operation::{RunOutcome, ServiceOperation};

struct PendingEntry {
    priority: QueuePriority,
    seq: u64,
    operation: Arc<ServiceOperation>,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority first, then lower sequence (FIFO).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner {
    pending: Mutex<BinaryHeap<PendingEntry>>,
    available: Notify,
    shutdown: CancellationToken,
    seq: AtomicU64,
}

impl QueueInner {
    fn push(&self, operation: Arc<ServiceOperation>) -> Result<(), ServiceError> {
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::Shutdown);
        }
        let entry = PendingEntry {
            priority: operation.queue_priority(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            operation,
        };
        self.pending
            .lock()
            .expect("operation queue mutex poisoned")
            .push(entry);
        self.available.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<Arc<ServiceOperation>> {
        self.pending
            .lock()
            .expect("operation queue mutex poisoned")
            .pop()
            .map(|entry| entry.operation)
    }
}

/// The bounded worker pool behind a service client. Workers are spawned
/// at construction and live until [`shutdown`](OperationQueue::shutdown).
pub(crate) struct OperationQueue {
    inner: Arc<QueueInner>,
}

impl OperationQueue {
    /// Spawn `max_concurrency` workers. Must be called inside a tokio
    /// runtime.
    pub(crate) fn new(max_concurrency: usize) -> Self {
        let inner = Arc::new(QueueInner {
            pending: Mutex::new(BinaryHeap::new()),
            available: Notify::new(),
            shutdown: CancellationToken::new(),
            seq: AtomicU64::new(0),
        });
        let workers = max_concurrency.max(1);
        tracing::debug!(workers, "operation queue starting");
        for worker in 0..workers {
            let inner = inner.clone();
            tokio::spawn(worker_loop(worker, inner));
        }
        Self { inner }
    }

    pub(crate) fn submit(&self, operation: Arc<ServiceOperation>) -> Result<(), ServiceError> {
        self.inner.push(operation)
    }

    /// Cancellation token for a new operation, tied to queue shutdown.
    pub(crate) fn operation_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }

    /// Stop accepting work and wake every worker. Pending operations
    /// finalize as Cancelled; in-flight transfers abort through their
    /// child tokens.
    pub(crate) fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        tracing::debug!("operation queue shutting down");
        self.inner.shutdown.cancel();
        self.inner.available.notify_waiters();
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(worker: usize, inner: Arc<QueueInner>) {
    loop {
        if inner.shutdown.is_cancelled() {
            break;
        }
        match inner.pop() {
            Some(operation) => match operation.run().await {
                RunOutcome::Finished => {}
                RunOutcome::Requeue(delay) => requeue(&inner, operation, delay),
            },
            None => {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = inner.available.notified() => {}
                }
            }
        }
    }

    // Drain whatever is still pending; every operation must finalize.
    while let Some(operation) = inner.pop() {
        operation.finish_cancelled();
    }
    tracing::trace!(worker, "queue worker exited");
}

fn requeue(inner: &Arc<QueueInner>, operation: Arc<ServiceOperation>, delay: Duration) {
    if delay.is_zero() {
        if inner.push(operation.clone()).is_err() {
            operation.finish_cancelled();
        }
        return;
    }
    let inner = inner.clone();
    tokio::spawn(async move {
        // A cancel during the backoff sleep must finalize right away,
        // not after the delay expires.
        tokio::select! {
            _ = inner.shutdown.cancelled() => {
                operation.finish_cancelled();
            }
            _ = operation.cancel_token().cancelled() => {
                operation.finish_cancelled();
            }
            _ = tokio::time::sleep(delay) => {
                if inner.push(operation.clone()).is_err() {
                    operation.finish_cancelled();
                }
            }
        }
    });
}
