//! Handler configuration, read from the execution environment.

use fanout_core::{
    Error, Result, DATA_FILE_VAR, DEFAULT_MAX_RUNTIME_SECS, DEFAULT_MODULE_DIR,
    DEFAULT_RUNTIME_LINK, DEFAULT_RUNTIME_ROOT, FUNC_FILE_VAR, OUTPUT_FILE_VAR, STATUS_FILE_VAR,
    STDOUT_POLL_INTERVAL_MS,
};
use std::path::PathBuf;
use std::time::Duration;

/// Paths and limits for one handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Staging root for the payload's embedded module files. Cleared and
    /// repopulated on every invocation.
    pub module_dir: PathBuf,
    /// Digest-keyed runtime artifact cache, shared read-only across
    /// invocations on the same host.
    pub runtime_root: PathBuf,
    /// Symlink pointing at the active runtime inside `runtime_root`.
    pub runtime_link: PathBuf,
    /// Local path of the serialized function bundle.
    pub func_file: PathBuf,
    /// Local path of the input data.
    pub data_file: PathBuf,
    /// Local path the worker writes its output to.
    pub output_file: PathBuf,
    /// Local path the status record is written to.
    pub status_file: PathBuf,
    /// Wall-clock budget for the worker process.
    pub max_runtime: Duration,
    /// How often the timeout watch wakes between stdout lines.
    pub poll_interval: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from(DEFAULT_MODULE_DIR),
            runtime_root: PathBuf::from(DEFAULT_RUNTIME_ROOT),
            runtime_link: PathBuf::from(DEFAULT_RUNTIME_LINK),
            func_file: PathBuf::from("/tmp/func.json"),
            data_file: PathBuf::from("/tmp/data.bin"),
            output_file: PathBuf::from("/tmp/output.bin"),
            status_file: PathBuf::from("/tmp/status.json"),
            max_runtime: Duration::from_secs(DEFAULT_MAX_RUNTIME_SECS),
            poll_interval: Duration::from_millis(STDOUT_POLL_INTERVAL_MS),
        }
    }
}

impl HandlerConfig {
    /// Build a config from the process environment. The file-path variables
    /// are required; cache locations and limits keep their defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            func_file: required_path(FUNC_FILE_VAR)?,
            data_file: required_path(DATA_FILE_VAR)?,
            output_file: required_path(OUTPUT_FILE_VAR)?,
            status_file: required_path(STATUS_FILE_VAR)?,
            ..Self::default()
        })
    }
}

fn required_path(var: &str) -> Result<PathBuf> {
    std::env::var(var)
        .map(PathBuf::from)
        .map_err(|_| Error::configuration(format!("environment variable {var} is not set")))
}
