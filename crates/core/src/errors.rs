//! Error types for fanout operations.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for fanout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fanout operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dispatcher/handler protocol-version skew. Never retried: the same
    /// mismatch would reproduce on every attempt.
    #[error("protocol version mismatch: dispatcher sent '{theirs}', handler runs '{ours}'")]
    ProtocolMismatch { ours: String, theirs: String },

    /// Execution exceeded its wall-clock budget and was killed.
    #[error("execution exceeded maximum runtime of {budget:?} (ran {elapsed:?})")]
    Timeout { budget: Duration, elapsed: Duration },

    /// The user function raised during execution.
    #[error("execution failed: {message}")]
    Execution { message: String, trace: String },

    /// The backend rejected or failed an invocation at send time.
    #[error("dispatch to '{endpoint}' failed: {message}")]
    Dispatch { endpoint: String, message: String },

    /// The done/pending partition no longer sums to the future count. This
    /// is a programming-error-class fault, not a retryable condition.
    #[error("wait invariant violated: {done} done + {pending} pending != {total} futures")]
    ConsistencyViolation {
        done: usize,
        pending: usize,
        total: usize,
    },

    /// An unrecognized wait mode reached the wait engine.
    #[error("invalid wait mode: {value}")]
    InvalidWaitMode { value: String },

    /// A future's result was requested before it reached a terminal state.
    #[error("call {call_id} has not resolved yet (state: {state})")]
    NotResolved { call_id: String, state: String },

    /// Status-store operation failures.
    #[error("storage {operation} failed for '{key}': {message}")]
    Storage {
        operation: String,
        key: String,
        message: String,
    },

    /// File system operations
    #[error("file system {operation} failed for '{path}': {source}", path = .path.display())]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Network-related errors
    #[error("network error talking to '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

// Helper methods for creating errors with context
impl Error {
    /// Create a protocol mismatch error
    #[must_use]
    pub fn protocol_mismatch(ours: impl Into<String>, theirs: impl Into<String>) -> Self {
        Error::ProtocolMismatch {
            ours: ours.into(),
            theirs: theirs.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(budget: Duration, elapsed: Duration) -> Self {
        Error::Timeout { budget, elapsed }
    }

    /// Create an execution error with a captured trace
    #[must_use]
    pub fn execution(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// Create a dispatch failure error
    #[must_use]
    pub fn dispatch(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Dispatch {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    #[must_use]
    pub fn storage(
        operation: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Storage {
            operation: operation.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a JSON error
    #[must_use]
    pub fn json(message: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json {
            message: message.into(),
            source,
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::protocol_mismatch("0.4", "0.3");
        assert!(err.to_string().contains("0.4"));
        assert!(err.to_string().contains("0.3"));

        let err = Error::storage("get", "cs/00001", "not found");
        assert!(err.to_string().contains("cs/00001"));
    }

    #[test]
    fn consistency_violation_reports_counts() {
        let err = Error::ConsistencyViolation {
            done: 3,
            pending: 2,
            total: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('2') && msg.contains('6'));
    }
}
