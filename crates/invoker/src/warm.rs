//! Pre-warming invoker variant.

use crate::{BackendClient, BatchingInvoker, Invoker};
use fanout_core::{BackendConfig, CallHandle, Payload, Result, RuntimeDescriptor};
use futures::TryStreamExt;
use std::sync::Arc;

/// Invoker that provisions backend capacity on construction.
///
/// `new` sends `num` warm control payloads with synchronous acknowledgement
/// and only returns once every acknowledgement has come back (or the first
/// failure propagates): the caller wants warm capacity before dispatching
/// real work. Each warm payload selects a runtime shard uniformly at random
/// with fresh randomness, falling back to no URL when the runtime has no
/// shard list.
pub struct WarmInvoker {
    inner: BatchingInvoker,
}

impl WarmInvoker {
    pub async fn new(
        backend: Arc<dyn BackendClient>,
        runtime: RuntimeDescriptor,
        num: usize,
    ) -> Result<Self> {
        let payloads: Vec<Payload> = (0..num).map(|_| Payload::warm(runtime.clone())).collect();

        futures::stream::iter(payloads.iter().map(Ok))
            .try_for_each_concurrent(num.max(1), |payload| {
                let backend = Arc::clone(&backend);
                async move { backend.call(payload).await }
            })
            .await?;

        tracing::info!(num, "warmed backend instances");
        Ok(Self {
            inner: BatchingInvoker::new(backend),
        })
    }
}

impl Invoker for WarmInvoker {
    fn invoke(&self, payload: Payload) -> Result<CallHandle> {
        self.inner.invoke(payload)
    }

    fn flush(&self) {
        self.inner.flush();
    }

    fn config(&self) -> BackendConfig {
        self.inner.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::tests::MockBackend;
    use fanout_core::InvocationKind;

    #[tokio::test]
    async fn construction_sends_exactly_num_warm_acknowledgements() {
        let backend = Arc::new(MockBackend::default());
        let _invoker = WarmInvoker::new(
            backend.clone(),
            RuntimeDescriptor::new("runtimes/test.tar.gz"),
            5,
        )
        .await
        .unwrap();

        // `new` is synchronous with respect to warm acks: all five are
        // visible the moment the constructor returns.
        let called = backend.called.lock();
        assert_eq!(called.len(), 5);
        assert!(called.iter().all(|p| p.kind == InvocationKind::Warm));
    }

    #[tokio::test]
    async fn warm_payloads_spread_across_shards() {
        let backend = Arc::new(MockBackend::default());
        let mut runtime = RuntimeDescriptor::new("runtimes/test.tar.gz");
        runtime.urls = vec!["http://a/rt".into(), "http://b/rt".into()];

        let _invoker = WarmInvoker::new(backend.clone(), runtime.clone(), 8)
            .await
            .unwrap();

        let called = backend.called.lock();
        assert_eq!(called.len(), 8);
        for p in called.iter() {
            let url = p.runtime_url.as_deref().expect("shard selected");
            assert!(runtime.urls.iter().any(|u| u == url));
        }
    }

    #[tokio::test]
    async fn warm_without_shards_omits_runtime_url() {
        let backend = Arc::new(MockBackend::default());
        let _invoker = WarmInvoker::new(
            backend.clone(),
            RuntimeDescriptor::new("runtimes/test.tar.gz"),
            2,
        )
        .await
        .unwrap();

        assert!(backend.called.lock().iter().all(|p| p.runtime_url.is_none()));
    }
}
