//! Payload batching and backend dispatch.
//!
//! An [`Invoker`] accepts payloads and guarantees each is eventually handed
//! to the compute backend without blocking the caller beyond a bounded
//! queuing delay. Three variants exist: the real [`BatchingInvoker`], the
//! pre-warming [`WarmInvoker`], and the network-free [`OfflineInvoker`].

mod backend;
mod batching;
mod offline;
mod warm;

pub use backend::{BackendClient, HttpBackend};
pub use batching::BatchingInvoker;
pub use offline::OfflineInvoker;
pub use warm::WarmInvoker;

use fanout_core::{BackendConfig, CallHandle, Payload, Result};

/// Accepts payloads for dispatch to the compute backend.
///
/// `invoke` returns a [`CallHandle`] immediately; actual network dispatch
/// happens asynchronously in batches. Dispatch order across a batch is
/// unspecified.
pub trait Invoker: Send + Sync {
    /// Queue one payload; may trigger an automatic flush when the queue
    /// reaches the batch limit. Never blocks on the network.
    fn invoke(&self, payload: Payload) -> Result<CallHandle>;

    /// Hand all currently queued payloads off to the dispatch pool and
    /// return immediately. Concurrent `invoke` calls accumulate into the
    /// next batch.
    fn flush(&self);

    /// Read-only backend descriptor for diagnostics.
    fn config(&self) -> BackendConfig;
}
