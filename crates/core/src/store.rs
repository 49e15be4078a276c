//! Seams through which the dispatch and execution sides coordinate.
//!
//! There is no shared in-memory state between a client process and the
//! handlers it fans out to; the status store is the only rendezvous point.

use crate::errors::Result;
use crate::status::StatusRecord;
use crate::types::{CallId, CallsetId, Payload};
use async_trait::async_trait;
use std::collections::HashSet;

/// Status and result blob storage, keyed by `(callset_id, call_id)`.
///
/// Point lookups are eventually consistent. The bulk listing is a cheap
/// signal that may under-report completed calls but must never report a
/// pending call as done.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persist the status record for one call attempt. Write-once.
    async fn put_status(
        &self,
        callset_id: &CallsetId,
        call_id: &CallId,
        record: &StatusRecord,
    ) -> Result<()>;

    /// Point lookup of a call's status record, if visible yet.
    async fn get_status(
        &self,
        callset_id: &CallsetId,
        call_id: &CallId,
    ) -> Result<Option<StatusRecord>>;

    /// Bulk signal: call ids known complete for the callset. May lag.
    async fn list_done_call_ids(&self, callset_id: &CallsetId) -> Result<HashSet<CallId>>;
}

/// Executes a payload in-process instead of on the remote backend. Used by
/// the offline invoker to drain its queue without a compute fabric.
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    async fn execute(&self, payload: &Payload) -> Result<StatusRecord>;
}
