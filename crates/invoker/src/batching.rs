//! The real invoker: queue, batch trigger, detached bounded dispatch.

use crate::{BackendClient, Invoker};
use fanout_core::{
    BackendConfig, CallHandle, Payload, Result, DEFAULT_BATCH_LIMIT, DEFAULT_DISPATCH_PARALLELISM,
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;

/// Batches payloads and dispatches them to the backend through a bounded
/// worker pool, without ever blocking the caller on the network.
///
/// The queue is swapped out atomically at flush time: payloads invoked while
/// a flush is in flight accumulate into the next batch, never into the one
/// already handed off.
pub struct BatchingInvoker {
    backend: Arc<dyn BackendClient>,
    queue: Mutex<Vec<(Payload, CallHandle)>>,
    batch_limit: usize,
    dispatch_parallelism: usize,
}

impl BatchingInvoker {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self::with_limits(backend, DEFAULT_BATCH_LIMIT, DEFAULT_DISPATCH_PARALLELISM)
    }

    pub fn with_limits(
        backend: Arc<dyn BackendClient>,
        batch_limit: usize,
        dispatch_parallelism: usize,
    ) -> Self {
        Self {
            backend,
            queue: Mutex::new(Vec::new()),
            batch_limit: batch_limit.max(1),
            dispatch_parallelism: dispatch_parallelism.max(1),
        }
    }

    /// Number of payloads currently queued (diagnostics only).
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Invoker for BatchingInvoker {
    fn invoke(&self, payload: Payload) -> Result<CallHandle> {
        let handle = CallHandle::new(payload.callset_id.clone(), payload.call_id.clone());
        let should_flush = {
            let mut queue = self.queue.lock();
            queue.push((payload, handle.clone()));
            queue.len() >= self.batch_limit
        };
        if should_flush {
            self.flush();
        }
        Ok(handle)
    }

    fn flush(&self) {
        // Swap-then-dispatch: the snapshot is taken under the lock so a
        // concurrent invoke can never land in both batches.
        let batch = std::mem::take(&mut *self.queue.lock());
        if batch.is_empty() {
            return;
        }

        let backend = Arc::clone(&self.backend);
        let parallelism = self.dispatch_parallelism;
        let endpoint = backend.describe().endpoint;
        tracing::debug!(count = batch.len(), "dispatching batch");

        tokio::spawn(async move {
            futures::stream::iter(batch)
                .for_each_concurrent(parallelism, |(payload, handle)| {
                    let backend = Arc::clone(&backend);
                    let endpoint = endpoint.clone();
                    async move {
                        if let Err(e) = backend.fire(&payload).await {
                            tracing::warn!(
                                callset_id = %payload.callset_id,
                                call_id = %payload.call_id,
                                endpoint = %endpoint,
                                error = %e,
                                "dispatch failed"
                            );
                            handle.mark_dispatch_failed(e.to_string());
                        }
                    }
                })
                .await;
        });
    }

    fn config(&self) -> BackendConfig {
        self.backend.describe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use fanout_core::{CallId, CallsetId, Error, JobState, RuntimeDescriptor};
    use std::time::Duration;

    /// Backend double that counts invocations and can fail specific calls.
    #[derive(Default)]
    pub(crate) struct MockBackend {
        pub fired: Mutex<Vec<CallId>>,
        pub called: Mutex<Vec<Payload>>,
        pub fail_calls: Mutex<Vec<CallId>>,
    }

    #[async_trait]
    impl BackendClient for MockBackend {
        async fn fire(&self, payload: &Payload) -> Result<()> {
            if self.fail_calls.lock().contains(&payload.call_id) {
                return Err(Error::dispatch("mock", "function not found"));
            }
            self.fired.lock().push(payload.call_id.clone());
            Ok(())
        }

        async fn call(&self, payload: &Payload) -> Result<()> {
            self.called.lock().push(payload.clone());
            Ok(())
        }

        fn describe(&self) -> BackendConfig {
            BackendConfig {
                function_name: "mock".into(),
                endpoint: "mock://".into(),
            }
        }
    }

    pub(crate) fn payload(callset: &str, n: usize) -> Payload {
        Payload::new(
            CallsetId::new(callset),
            CallId::indexed(n),
            RuntimeDescriptor::new("runtimes/test.tar.gz"),
        )
    }

    pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn reaching_batch_limit_triggers_exactly_one_flush() {
        let backend = Arc::new(MockBackend::default());
        let invoker = BatchingInvoker::with_limits(backend.clone(), 4, 8);

        for n in 0..3 {
            invoker.invoke(payload("cs", n)).unwrap();
        }
        assert_eq!(invoker.queued(), 3);
        assert!(backend.fired.lock().is_empty());

        invoker.invoke(payload("cs", 3)).unwrap();
        assert_eq!(invoker.queued(), 0);

        wait_until(|| backend.fired.lock().len() == 4).await;
    }

    #[tokio::test]
    async fn below_batch_limit_nothing_dispatches_until_flush() {
        let backend = Arc::new(MockBackend::default());
        let invoker = BatchingInvoker::with_limits(backend.clone(), 128, 8);

        for n in 0..5 {
            invoker.invoke(payload("cs", n)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(backend.fired.lock().is_empty());
        assert_eq!(invoker.queued(), 5);

        invoker.flush();
        assert_eq!(invoker.queued(), 0);
        wait_until(|| backend.fired.lock().len() == 5).await;
    }

    #[tokio::test]
    async fn invokes_after_flush_accumulate_into_next_batch() {
        let backend = Arc::new(MockBackend::default());
        let invoker = BatchingInvoker::with_limits(backend.clone(), 128, 8);

        invoker.invoke(payload("cs", 0)).unwrap();
        invoker.flush();
        invoker.invoke(payload("cs", 1)).unwrap();

        assert_eq!(invoker.queued(), 1);
        wait_until(|| backend.fired.lock().len() == 1).await;

        invoker.flush();
        wait_until(|| backend.fired.lock().len() == 2).await;
    }

    #[tokio::test]
    async fn dispatch_failure_marks_future_dispatch_failed() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_calls.lock().push(CallId::indexed(1));
        let invoker = BatchingInvoker::with_limits(backend.clone(), 128, 8);

        let ok = invoker.invoke(payload("cs", 0)).unwrap();
        let bad = invoker.invoke(payload("cs", 1)).unwrap();
        invoker.flush();

        wait_until(|| bad.is_done()).await;
        assert_eq!(bad.state(), JobState::DispatchFailed);
        assert!(bad.result().is_err());

        // The healthy call is unaffected; it stays pending until a status
        // record shows up.
        wait_until(|| backend.fired.lock().len() == 1).await;
        assert_eq!(ok.state(), JobState::Invoked);
    }

    #[tokio::test]
    async fn empty_flush_is_a_no_op() {
        let backend = Arc::new(MockBackend::default());
        let invoker = BatchingInvoker::with_limits(backend.clone(), 128, 8);
        invoker.flush();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(backend.fired.lock().is_empty());
    }
}
