//! In-memory status store for tests and offline runs.

use async_trait::async_trait;
use fanout_core::{CallId, CallsetId, Result, StatusRecord, StatusStore};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// In-memory store. The bulk listing can be made to lag point lookups via
/// [`MemoryStore::hide_from_listing`], simulating the eventually-consistent
/// bulk signal: hidden calls are invisible to `list_done_call_ids` but still
/// resolve through `get_status` (under-reporting, never over-reporting).
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<(CallsetId, CallId), StatusRecord>,
    hidden: HashSet<(CallsetId, CallId)>,
    list_calls: u64,
    get_calls: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a completed call out of the bulk listing.
    pub fn hide_from_listing(&self, callset_id: &CallsetId, call_id: &CallId) {
        self.inner
            .lock()
            .hidden
            .insert((callset_id.clone(), call_id.clone()));
    }

    /// Make a previously hidden call visible to the bulk listing again.
    pub fn reveal(&self, callset_id: &CallsetId, call_id: &CallId) {
        self.inner
            .lock()
            .hidden
            .remove(&(callset_id.clone(), call_id.clone()));
    }

    /// Number of bulk listing calls observed, for round-count assertions.
    pub fn list_calls(&self) -> u64 {
        self.inner.lock().list_calls
    }

    /// Number of point lookups observed.
    pub fn get_calls(&self) -> u64 {
        self.inner.lock().get_calls
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn put_status(
        &self,
        callset_id: &CallsetId,
        call_id: &CallId,
        record: &StatusRecord,
    ) -> Result<()> {
        self.inner
            .lock()
            .records
            .insert((callset_id.clone(), call_id.clone()), record.clone());
        Ok(())
    }

    async fn get_status(
        &self,
        callset_id: &CallsetId,
        call_id: &CallId,
    ) -> Result<Option<StatusRecord>> {
        let mut inner = self.inner.lock();
        inner.get_calls += 1;
        Ok(inner
            .records
            .get(&(callset_id.clone(), call_id.clone()))
            .cloned())
    }

    async fn list_done_call_ids(&self, callset_id: &CallsetId) -> Result<HashSet<CallId>> {
        let mut inner = self.inner.lock();
        inner.list_calls += 1;
        let hidden = inner.hidden.clone();
        Ok(inner
            .records
            .keys()
            .filter(|(cs, call)| cs == callset_id && !hidden.contains(&(cs.clone(), call.clone())))
            .map(|(_, call)| call.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(callset: &str, call: usize) -> StatusRecord {
        StatusRecord::begin(CallsetId::new(callset), CallId::indexed(call), 0.0)
    }

    #[tokio::test]
    async fn hidden_records_lag_the_listing_but_not_lookups() {
        let store = MemoryStore::new();
        let callset = CallsetId::new("cs");
        let call = CallId::indexed(0);

        store.put_status(&callset, &call, &record("cs", 0)).await.unwrap();
        store.hide_from_listing(&callset, &call);

        assert!(store.list_done_call_ids(&callset).await.unwrap().is_empty());
        assert!(store.get_status(&callset, &call).await.unwrap().is_some());

        store.reveal(&callset, &call);
        assert_eq!(store.list_done_call_ids(&callset).await.unwrap().len(), 1);
    }
}
