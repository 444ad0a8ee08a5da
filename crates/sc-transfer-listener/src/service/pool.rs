//! Worker pool for connection handlers
//!
//! Workers are tokio tasks on the multi-threaded runtime. With the default
//! `Unbounded` policy a task is spawned per connection and idle runtime
//! threads are reused, the same shape as a cached thread pool. Bounded
//! policies hand out semaphore permits; a worker holds its permit until the
//! handler returns.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::domain::AdmissionPolicy;

/// Elastic pool executing connection handlers
pub struct WorkerPool {
    policy: AdmissionPolicy,
    permits: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
    next_worker_id: AtomicU64,
}

/// Slot in the pool, released on drop
pub struct WorkerPermit {
    _permit: Option<OwnedSemaphorePermit>,
    active: Arc<AtomicUsize>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl WorkerPool {
    pub fn new(policy: AdmissionPolicy) -> Self {
        let permits = policy.capacity().map(|n| Arc::new(Semaphore::new(n)));
        Self {
            policy,
            permits,
            active: Arc::new(AtomicUsize::new(0)),
            next_worker_id: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Workers currently running a handler
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Ask for a worker slot.
    ///
    /// `Unbounded` always admits. `Reject` admits only while below capacity.
    /// `Queue` waits for a slot to free up.
    pub async fn admit(&self) -> Option<WorkerPermit> {
        let permit = match (&self.policy, &self.permits) {
            (AdmissionPolicy::Unbounded, _) | (_, None) => None,
            (AdmissionPolicy::Reject { .. }, Some(permits)) => {
                Some(Arc::clone(permits).try_acquire_owned().ok()?)
            }
            (AdmissionPolicy::Queue { .. }, Some(permits)) => {
                Some(Arc::clone(permits).acquire_owned().await.ok()?)
            }
        };

        self.active.fetch_add(1, Ordering::AcqRel);
        Some(WorkerPermit {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    /// Run `task` on a fresh worker that owns `permit` until the task ends
    pub fn submit<F>(&self, permit: WorkerPermit, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("transfer-worker", worker_id);

        tokio::spawn(
            async move {
                let _permit = permit;
                task.await;
            }
            .instrument(span),
        )
    }
}
