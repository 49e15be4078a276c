//! Constants shared across the fanout workspace.

/// Protocol version carried in every dispatch payload. The handler refuses
/// payloads whose version does not match its own.
pub const PROTOCOL_VERSION: &str = "0.4";

// Dispatch defaults
pub const DEFAULT_BATCH_LIMIT: usize = 128;
pub const DEFAULT_DISPATCH_PARALLELISM: usize = 128;

// Polling defaults
pub const DEFAULT_PROBE_POOL_SIZE: usize = 128;
pub const DEFAULT_RETURN_EARLY_N: usize = 128;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

// Handler environment variable names
pub const PAYLOAD_FILE_VAR: &str = "FANOUT_PAYLOAD_FILE";
pub const STATUS_FILE_VAR: &str = "FANOUT_STATUS_FILE";
pub const FUNC_FILE_VAR: &str = "FANOUT_FUNC_FILE";
pub const DATA_FILE_VAR: &str = "FANOUT_DATA_FILE";
pub const OUTPUT_FILE_VAR: &str = "FANOUT_OUTPUT_FILE";

// Handler filesystem layout
pub const DEFAULT_MODULE_DIR: &str = "/tmp/fanout-modules";
pub const DEFAULT_RUNTIME_ROOT: &str = "/tmp/fanout-runtimes";
pub const DEFAULT_RUNTIME_LINK: &str = "/tmp/fanout-runtime";

/// Relative path of the worker entry point inside an extracted runtime.
pub const RUNTIME_WORKER_ENTRY: &str = "bin/worker";

/// Relative path of the runtime's binary directory, prefixed onto PATH.
pub const RUNTIME_BIN_DIR: &str = "bin";

/// Environment variable exporting the staged module directory to the worker.
pub const MODULE_PATH_VAR: &str = "FANOUT_MODULE_PATH";

/// Default wall-clock budget for one execution, in seconds.
pub const DEFAULT_MAX_RUNTIME_SECS: u64 = 280;

/// How long the timeout-watch loop sleeps between checks, in milliseconds.
pub const STDOUT_POLL_INTERVAL_MS: u64 = 200;
