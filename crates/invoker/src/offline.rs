//! Offline invoker: accumulates payloads, runs them locally on demand.

use crate::Invoker;
use fanout_core::{
    BackendConfig, CallHandle, LocalExecutor, Payload, Result, StatusStore,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Invoker that never talks to a backend. Payloads accumulate until
/// [`OfflineInvoker::run_jobs`] drains them through a [`LocalExecutor`],
/// persisting each status record so the normal wait path observes them.
///
/// Intended for tests and offline development. The drain is single-writer:
/// do not call `run_jobs` from more than one task at a time.
pub struct OfflineInvoker {
    store: Arc<dyn StatusStore>,
    queue: Mutex<Vec<(Payload, CallHandle)>>,
}

impl OfflineInvoker {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            store,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Number of payloads currently queued.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run up to `max_jobs` queued payloads through `executor` (`None`
    /// drains everything). Returns the number of jobs executed. On failure
    /// the failed job and everything drained behind it go back to the front
    /// of the queue, so a later drain retries them in order.
    pub async fn run_jobs(
        &self,
        max_jobs: Option<usize>,
        executor: &dyn LocalExecutor,
    ) -> Result<usize> {
        let jobs: Vec<(Payload, CallHandle)> = {
            let mut queue = self.queue.lock();
            let n = max_jobs.unwrap_or(queue.len()).min(queue.len());
            queue.drain(..n).collect()
        };

        let count = jobs.len();
        let mut remaining = jobs.into_iter();
        while let Some((payload, handle)) = remaining.next() {
            if let Err(e) = self.run_one(&payload, &handle, executor).await {
                let mut requeue = vec![(payload, handle)];
                requeue.extend(remaining);
                let mut queue = self.queue.lock();
                requeue.extend(queue.drain(..));
                *queue = requeue;
                return Err(e);
            }
        }
        Ok(count)
    }

    async fn run_one(
        &self,
        payload: &Payload,
        handle: &CallHandle,
        executor: &dyn LocalExecutor,
    ) -> Result<()> {
        let record = executor.execute(payload).await?;
        self.store
            .put_status(&payload.callset_id, &payload.call_id, &record)
            .await?;
        handle.apply_record(record);
        Ok(())
    }
}

impl Invoker for OfflineInvoker {
    fn invoke(&self, payload: Payload) -> Result<CallHandle> {
        let handle = CallHandle::new(payload.callset_id.clone(), payload.call_id.clone());
        self.queue.lock().push((payload, handle.clone()));
        Ok(handle)
    }

    fn flush(&self) {
        // Nothing to dispatch; jobs wait for an explicit run_jobs.
    }

    fn config(&self) -> BackendConfig {
        BackendConfig {
            function_name: "offline".into(),
            endpoint: "local".into(),
        }
    }
}
