//! The write-once status record a handler reports for each call attempt.

use crate::types::{unix_now, CallId, CallsetId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Classifies a failed execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Dispatcher and handler disagree on the protocol version.
    ProtocolMismatch,
    /// The user function raised during execution.
    Execution,
    /// Internal handler fault (staging, artifact fetch, spawn, ...).
    Internal,
}

/// Tagged result of one execution attempt.
///
/// Replaces the ad hoc string-keyed exception fields of older dispatch
/// protocols with a closed set of outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The worker ran to completion; its value lives at the output key.
    Completed,
    /// The attempt failed; kind, message, and trace are captured as data.
    Failed {
        kind: FailureKind,
        message: String,
        trace: String,
    },
    /// The attempt exceeded its wall-clock budget and the process group was
    /// killed. A hard cutoff, never retried by this layer.
    TimedOut { message: String },
}

impl Outcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>, trace: impl Into<String>) -> Self {
        Outcome::Failed {
            kind,
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

/// Server/environment metadata echoed in every status record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub uname: String,
}

impl ServerInfo {
    /// Describe the host the handler is running on.
    pub fn collect() -> Self {
        let host = hostname_string();
        Self {
            uname: format!(
                "{} {} {}",
                std::env::consts::OS,
                host,
                std::env::consts::ARCH
            ),
        }
    }
}

fn hostname_string() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The result of one execution attempt, persisted to the status store under
/// a key derived from `(callset_id, call_id)`. Write-once; produced exactly
/// once per attempt, on every exit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Epoch seconds when the handler accepted the payload.
    pub start_time: f64,
    /// Seconds spent on staging and artifact setup, relative to start.
    pub setup_time: f64,
    /// Seconds spent executing the worker, relative to setup completion.
    pub exec_time: f64,
    /// Epoch seconds when execution finished (or was cut off).
    pub end_time: f64,
    /// Epoch seconds when the client submitted the payload, echoed back.
    pub host_submit_time: f64,
    /// Captured worker standard output.
    pub stdout: String,
    pub server_info: ServerInfo,
    pub call_id: CallId,
    pub callset_id: CallsetId,
    /// Whether the runtime artifact was already present on this host.
    pub runtime_cached: bool,
    /// Caller-supplied context metadata, echoed back verbatim.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl StatusRecord {
    /// Start a record for one attempt; timings and outcome are filled in as
    /// the handler progresses.
    pub fn begin(callset_id: CallsetId, call_id: CallId, host_submit_time: f64) -> Self {
        Self {
            outcome: Outcome::Completed,
            start_time: unix_now(),
            setup_time: 0.0,
            exec_time: 0.0,
            end_time: 0.0,
            host_submit_time,
            stdout: String::new(),
            server_info: ServerInfo::collect(),
            call_id,
            callset_id,
            runtime_cached: false,
            context: HashMap::new(),
        }
    }
}
