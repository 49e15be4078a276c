//! The wait engine: rounds, probing, and the three return policies.

use fanout_core::{
    CallHandle, CallId, CallsetId, Error, Result, StatusStore, DEFAULT_RETURN_EARLY_N,
};
use futures::StreamExt;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// When `wait` returns control to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Poll until every future is terminal.
    AllCompleted,
    /// Return as soon as at least one future is terminal. Pending futures
    /// are not re-probed before returning.
    AnyCompleted,
    /// Perform exactly one round and return its snapshot. Never sleeps.
    Always,
}

impl TryFrom<u32> for WaitMode {
    type Error = Error;

    /// Numeric wire encoding: 1 = all, 2 = any, 3 = always. Anything else
    /// fails before any I/O happens.
    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(WaitMode::AllCompleted),
            2 => Ok(WaitMode::AnyCompleted),
            3 => Ok(WaitMode::Always),
            other => Err(Error::InvalidWaitMode {
                value: other.to_string(),
            }),
        }
    }
}

/// Resolves which of a set of futures are done, minimizing status-store
/// traffic. The storage handle is injected at construction; its lifecycle
/// belongs to the caller.
pub struct WaitEngine {
    store: Arc<dyn StatusStore>,
    return_early_n: usize,
}

impl WaitEngine {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            store,
            return_early_n: DEFAULT_RETURN_EARLY_N,
        }
    }

    /// Lower the direct-probe early-return threshold. Bounds tail latency
    /// when only a handful of stragglers remain outstanding.
    pub fn with_return_early_n(mut self, n: usize) -> Self {
        self.return_early_n = n.max(1);
        self
    }

    /// Wait on `handles` under the given return policy.
    ///
    /// Returns the `(done, pending)` partition at the moment the policy was
    /// satisfied. Neither list carries any ordering guarantee: futures
    /// complete out of order and both probe phases observe them in
    /// indeterminate order.
    pub async fn wait(
        &self,
        handles: &[CallHandle],
        mode: WaitMode,
        pool_size: usize,
        poll_interval: Duration,
    ) -> Result<(Vec<CallHandle>, Vec<CallHandle>)> {
        let total = handles.len();
        let mut done: Vec<CallHandle> = Vec::new();
        let mut pending: Vec<CallHandle> = handles.to_vec();

        match mode {
            WaitMode::AllCompleted => loop {
                let (new_done, still_pending) = self.wait_round(pending, pool_size).await?;
                done.extend(new_done);
                pending = still_pending;

                if done.len() + pending.len() != total {
                    return Err(Error::ConsistencyViolation {
                        done: done.len(),
                        pending: pending.len(),
                        total,
                    });
                }
                if done.len() == total {
                    return Ok((done, pending));
                }
                tokio::time::sleep(poll_interval).await;
            },
            WaitMode::AnyCompleted => loop {
                let (new_done, still_pending) = self.wait_round(pending, pool_size).await?;
                done.extend(new_done);
                pending = still_pending;

                if !done.is_empty() {
                    return Ok((done, pending));
                }
                tokio::time::sleep(poll_interval).await;
            },
            WaitMode::Always => {
                let (new_done, still_pending) = self.wait_round(pending, pool_size).await?;
                done.extend(new_done);
                Ok((done, still_pending))
            }
        }
    }

    /// One polling round: bulk signal, then shuffled direct probes through
    /// a bounded pool with early return.
    async fn wait_round(
        &self,
        handles: Vec<CallHandle>,
        pool_size: usize,
    ) -> Result<(Vec<CallHandle>, Vec<CallHandle>)> {
        if handles.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        // Already-terminal futures count as done without any I/O.
        let todo: Vec<CallHandle> = handles.iter().filter(|h| !h.is_done()).cloned().collect();

        // Bulk signal phase: one listing per distinct callset. The signal
        // may under-report (eventual consistency) but never over-reports.
        let callsets: HashSet<CallsetId> = todo.iter().map(CallHandle::callset_id).collect();
        let mut listed: HashMap<CallsetId, HashSet<CallId>> = HashMap::new();
        for callset_id in callsets {
            let ids = self.store.list_done_call_ids(&callset_id).await?;
            listed.insert(callset_id, ids);
        }

        let (confirmed, mut unconfirmed): (Vec<CallHandle>, Vec<CallHandle>) =
            todo.into_iter().partition(|h| {
                listed
                    .get(&h.callset_id())
                    .is_some_and(|ids| ids.contains(&h.call_id()))
            });

        tracing::debug!(
            confirmed = confirmed.len(),
            unconfirmed = unconfirmed.len(),
            "polling round"
        );

        // Futures the bulk signal confirmed: refresh them all to pull their
        // records; the listing never over-reports, so these reads resolve.
        self.probe(confirmed, pool_size, usize::MAX).await?;

        // Direct-probe phase: shuffled to avoid biasing toward low call ids
        // and to spread store load, bounded by the pool, returning early
        // once enough stragglers resolved this round.
        unconfirmed.shuffle(&mut rand::thread_rng());
        self.probe(unconfirmed, pool_size, self.return_early_n).await?;

        Ok(handles.into_iter().partition(|h| h.is_done()))
    }

    /// Refresh `handles` with at most `pool_size` reads in flight, stopping
    /// after `early_n` of them resolved.
    async fn probe(
        &self,
        handles: Vec<CallHandle>,
        pool_size: usize,
        early_n: usize,
    ) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }
        let store = Arc::clone(&self.store);
        let mut probes = futures::stream::iter(handles.into_iter().map(|handle| {
            let store = Arc::clone(&store);
            async move { handle.refresh(store.as_ref()).await }
        }))
        .buffer_unordered(pool_size.max(1));

        let mut resolved = 0usize;
        while let Some(result) = probes.next().await {
            if result? {
                resolved += 1;
                if resolved >= early_n {
                    break;
                }
            }
        }
        Ok(())
    }
}
