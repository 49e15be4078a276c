//! Client-side handle to one dispatched call.
//!
//! A `CallFuture` is a small state machine fed exclusively by status-store
//! reads (plus the invoker-side dispatch-failure mark). Once it reaches a
//! terminal state it is never mutated again.

use crate::errors::{Error, Result};
use crate::status::{Outcome, StatusRecord};
use crate::store::StatusStore;
use crate::types::{unix_now, CallId, CallsetId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of one dispatched call as seen from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Handed to the invoker; no status observed yet.
    Invoked,
    /// An interim status signal was observed. Reserved for backends that
    /// publish progress records; the reference stores publish only final
    /// records, so calls normally jump straight to a terminal state.
    Running,
    Success,
    Error,
    /// The attempt was cut off (wall-clock budget exceeded).
    Cancelled,
    /// The backend rejected the invocation at send time.
    DispatchFailed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Error | JobState::Cancelled | JobState::DispatchFailed
        )
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Invoked => "invoked",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Error => "error",
            JobState::Cancelled => "cancelled",
            JobState::DispatchFailed => "dispatch_failed",
        };
        write!(f, "{s}")
    }
}

/// Ordered lifecycle timestamps, each optional until observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleTimestamps {
    pub submit: Option<f64>,
    pub start: Option<f64>,
    pub setup: Option<f64>,
    pub done: Option<f64>,
}

/// State of one dispatched call. Access it through [`CallHandle`].
#[derive(Debug)]
pub struct CallFuture {
    callset_id: CallsetId,
    call_id: CallId,
    state: JobState,
    timestamps: LifecycleTimestamps,
    record: Option<StatusRecord>,
    dispatch_error: Option<String>,
}

impl CallFuture {
    pub fn new(callset_id: CallsetId, call_id: CallId) -> Self {
        Self {
            callset_id,
            call_id,
            state: JobState::Invoked,
            timestamps: LifecycleTimestamps {
                submit: Some(unix_now()),
                ..Default::default()
            },
            record: None,
            dispatch_error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn timestamps(&self) -> LifecycleTimestamps {
        self.timestamps
    }

    /// Fold an observed status record into the state machine. Terminal
    /// futures ignore further records.
    pub fn apply_record(&mut self, record: StatusRecord) {
        if self.state.is_terminal() {
            return;
        }
        self.timestamps.start = Some(record.start_time);
        self.timestamps.setup = Some(record.start_time + record.setup_time);
        self.timestamps.done = Some(record.end_time);
        self.state = match &record.outcome {
            Outcome::Completed => JobState::Success,
            Outcome::Failed { .. } => JobState::Error,
            Outcome::TimedOut { .. } => JobState::Cancelled,
        };
        self.record = Some(record);
    }

    /// Invoker-side mark when the backend rejected the send. Only an
    /// unresolved future can transition here.
    pub fn mark_dispatch_failed(&mut self, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::DispatchFailed;
        self.dispatch_error = Some(message.into());
    }
}

/// Shared handle to a [`CallFuture`]; cloned freely across the invoker's
/// dispatch tasks and the wait engine's probe pool.
#[derive(Debug, Clone)]
pub struct CallHandle {
    inner: Arc<Mutex<CallFuture>>,
}

impl CallHandle {
    pub fn new(callset_id: CallsetId, call_id: CallId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CallFuture::new(callset_id, call_id))),
        }
    }

    pub fn callset_id(&self) -> CallsetId {
        self.inner.lock().callset_id.clone()
    }

    pub fn call_id(&self) -> CallId {
        self.inner.lock().call_id.clone()
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn timestamps(&self) -> LifecycleTimestamps {
        self.inner.lock().timestamps
    }

    /// Refresh from the status store. Returns whether the future is now
    /// terminal. Terminal futures short-circuit without I/O.
    pub async fn refresh(&self, store: &dyn StatusStore) -> Result<bool> {
        let (callset_id, call_id) = {
            let inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Ok(true);
            }
            (inner.callset_id.clone(), inner.call_id.clone())
        };
        if let Some(record) = store.get_status(&callset_id, &call_id).await? {
            self.inner.lock().apply_record(record);
        }
        Ok(self.is_done())
    }

    pub fn apply_record(&self, record: StatusRecord) {
        self.inner.lock().apply_record(record);
    }

    pub fn mark_dispatch_failed(&self, message: impl Into<String>) {
        self.inner.lock().mark_dispatch_failed(message);
    }

    /// The resolved status record, mapped by terminal state: `Success`
    /// yields the record, `Error` the captured execution failure,
    /// `Cancelled` a timeout-class error, `DispatchFailed` the send error.
    pub fn result(&self) -> Result<StatusRecord> {
        let inner = self.inner.lock();
        match inner.state {
            JobState::Success => inner
                .record
                .clone()
                .ok_or_else(|| Error::configuration("successful future with no status record")),
            JobState::Error => {
                let (message, trace) = match inner.record.as_ref().map(|r| &r.outcome) {
                    Some(Outcome::Failed { message, trace, .. }) => {
                        (message.clone(), trace.clone())
                    }
                    _ => ("execution failed".to_string(), String::new()),
                };
                Err(Error::execution(message, trace))
            }
            JobState::Cancelled => {
                let elapsed = inner
                    .record
                    .as_ref()
                    .map(|r| r.end_time - r.start_time)
                    .unwrap_or(0.0);
                Err(Error::timeout(
                    Duration::from_secs_f64(elapsed.max(0.0)),
                    Duration::from_secs_f64(elapsed.max(0.0)),
                ))
            }
            JobState::DispatchFailed => Err(Error::dispatch(
                "backend",
                inner
                    .dispatch_error
                    .clone()
                    .unwrap_or_else(|| "invocation rejected".to_string()),
            )),
            state => Err(Error::NotResolved {
                call_id: inner.call_id.to_string(),
                state: state.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::FailureKind;

    fn record(callset: &str, call: usize, outcome: Outcome) -> StatusRecord {
        let mut r = StatusRecord::begin(CallsetId::new(callset), CallId::indexed(call), 0.0);
        r.start_time = 10.0;
        r.setup_time = 1.5;
        r.end_time = 20.0;
        r.outcome = outcome;
        r
    }

    #[test]
    fn new_future_is_invoked_with_submit_timestamp() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        assert_eq!(handle.state(), JobState::Invoked);
        assert!(!handle.is_done());
        assert!(handle.timestamps().submit.is_some());
        assert!(handle.timestamps().done.is_none());
    }

    #[test]
    fn applying_record_resolves_state_and_timestamps() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        handle.apply_record(record("cs", 0, Outcome::Completed));
        assert_eq!(handle.state(), JobState::Success);
        let ts = handle.timestamps();
        assert_eq!(ts.start, Some(10.0));
        assert_eq!(ts.setup, Some(11.5));
        assert_eq!(ts.done, Some(20.0));
    }

    #[test]
    fn terminal_future_ignores_later_records() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        handle.apply_record(record("cs", 0, Outcome::Completed));
        handle.apply_record(record(
            "cs",
            0,
            Outcome::failed(FailureKind::Execution, "late", ""),
        ));
        assert_eq!(handle.state(), JobState::Success);
        handle.mark_dispatch_failed("too late");
        assert_eq!(handle.state(), JobState::Success);
    }

    #[test]
    fn failed_outcome_surfaces_as_execution_error() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        handle.apply_record(record(
            "cs",
            0,
            Outcome::failed(FailureKind::Execution, "boom", "at line 3"),
        ));
        assert_eq!(handle.state(), JobState::Error);
        let err = handle.result().unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn timed_out_outcome_surfaces_as_timeout_error() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        handle.apply_record(record(
            "cs",
            0,
            Outcome::TimedOut {
                message: "over budget".into(),
            },
        ));
        assert_eq!(handle.state(), JobState::Cancelled);
        assert!(matches!(handle.result(), Err(Error::Timeout { .. })));
    }

    #[test]
    fn dispatch_failure_is_terminal_and_distinct() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        handle.mark_dispatch_failed("function not found");
        assert_eq!(handle.state(), JobState::DispatchFailed);
        assert!(handle.is_done());
        let err = handle.result().unwrap_err();
        assert!(matches!(err, Error::Dispatch { .. }));
        assert!(err.to_string().contains("function not found"));
    }

    #[test]
    fn unresolved_result_is_an_error() {
        let handle = CallHandle::new(CallsetId::new("cs"), CallId::indexed(0));
        assert!(matches!(handle.result(), Err(Error::NotResolved { .. })));
    }
}
