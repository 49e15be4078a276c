//! Call identifiers and the dispatch payload wire shape.

use crate::constants::PROTOCOL_VERSION;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of one `map`-style dispatch; groups all calls issued from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallsetId(String);

impl CallsetId {
    /// Generate a fresh callset identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CallsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one unit of work, unique within its callset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Zero-padded positional id, matching the on-store key layout.
    pub fn indexed(n: usize) -> Self {
        Self(format!("{n:05}"))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a payload carries real work or only pre-warms backend capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationKind {
    Normal,
    Warm,
}

/// Content-addressed description of the runtime artifact a handler needs,
/// with an optional list of mirror URLs the bundle is sharded across.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    /// Storage key (or canonical URL) of the runtime bundle.
    pub key: String,
    /// Mirror URLs; empty when the runtime has a single location.
    #[serde(default)]
    pub urls: Vec<String>,
}

impl RuntimeDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            urls: Vec::new(),
        }
    }

    /// Pick one mirror uniformly at random, fresh randomness per call.
    /// Returns `None` when no shard list is present.
    pub fn choose_shard(&self) -> Option<&str> {
        self.urls.choose(&mut rand::thread_rng()).map(|s| s.as_str())
    }
}

/// The serialized unit of work dispatched to the backend. Immutable once
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub callset_id: CallsetId,
    pub call_id: CallId,
    pub status_key: String,
    pub func_key: String,
    pub data_key: String,
    pub output_key: String,
    pub protocol_version: String,
    #[serde(default)]
    pub extra_env: HashMap<String, String>,
    pub host_submit_time: f64,
    #[serde(rename = "status")]
    pub kind: InvocationKind,
    pub runtime: RuntimeDescriptor,
    /// Shard URL selected at warm time; absent on normal payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_url: Option<String>,
}

impl Payload {
    /// Build a normal work payload with storage keys derived from the ids.
    pub fn new(callset_id: CallsetId, call_id: CallId, runtime: RuntimeDescriptor) -> Self {
        let prefix = format!("{}/{}", callset_id, call_id);
        Self {
            status_key: format!("{prefix}/status.json"),
            func_key: format!("{prefix}/func.json"),
            data_key: format!("{prefix}/data.bin"),
            output_key: format!("{prefix}/output.bin"),
            callset_id,
            call_id,
            protocol_version: PROTOCOL_VERSION.to_string(),
            extra_env: HashMap::new(),
            host_submit_time: unix_now(),
            kind: InvocationKind::Normal,
            runtime,
            runtime_url: None,
        }
    }

    /// Build a warm control payload for the given runtime, selecting one
    /// shard at random when a shard list is present.
    pub fn warm(runtime: RuntimeDescriptor) -> Self {
        let runtime_url = runtime.choose_shard().map(|s| s.to_string());
        let callset_id = CallsetId::new("warm");
        let call_id = CallId::new("warm");
        let mut payload = Self::new(callset_id, call_id, runtime);
        payload.kind = InvocationKind::Warm;
        payload.runtime_url = runtime_url;
        payload
    }

    pub fn with_extra_env(mut self, extra_env: HashMap<String, String>) -> Self {
        self.extra_env = extra_env;
        self
    }
}

/// Read-only descriptor of the backend an invoker targets, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub function_name: String,
    pub endpoint: String,
}

/// Current wall-clock time as f64 unix seconds, the wire timestamp format.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
