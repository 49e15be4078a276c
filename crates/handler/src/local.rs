//! In-process payload execution for offline dispatch.

use crate::artifact::ArtifactSource;
use crate::config::HandlerConfig;
use crate::handler::handle;
use crate::report::write_status;
use fanout_core::{Error, LocalExecutor, Payload, Result, StatusRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Runs payloads through the full handler pipeline inside the client
/// process, using a directory tree in place of remote storage. Each call
/// gets its own staging directory; the runtime artifact cache is shared
/// across calls, same as on a warm backend host.
pub struct LocalRunner {
    base_dir: PathBuf,
    source: Arc<dyn ArtifactSource>,
    max_runtime: Duration,
}

impl LocalRunner {
    pub fn new(base_dir: impl Into<PathBuf>, source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            base_dir: base_dir.into(),
            source,
            max_runtime: HandlerConfig::default().max_runtime,
        }
    }

    pub fn with_max_runtime(mut self, max_runtime: Duration) -> Self {
        self.max_runtime = max_runtime;
        self
    }

    fn config_for(&self, payload: &Payload) -> Result<HandlerConfig> {
        let call_dir = self
            .base_dir
            .join(payload.callset_id.as_str())
            .join(payload.call_id.as_str());
        fs::create_dir_all(&call_dir)
            .map_err(|e| Error::file_system(&call_dir, "create call directory", e))?;

        let cfg = HandlerConfig {
            module_dir: call_dir.join("modules"),
            runtime_root: self.base_dir.join("runtimes"),
            runtime_link: self.base_dir.join("runtime"),
            func_file: call_dir.join("func.json"),
            data_file: call_dir.join("data.bin"),
            output_file: call_dir.join("output.bin"),
            status_file: call_dir.join("status.json"),
            max_runtime: self.max_runtime,
            ..HandlerConfig::default()
        };

        // The dispatching client may have staged func/data ahead of time;
        // fall back to an empty bundle so bare payloads still run.
        if !cfg.func_file.exists() {
            fs::write(&cfg.func_file, "{}")
                .map_err(|e| Error::file_system(&cfg.func_file, "write default bundle", e))?;
        }
        if !cfg.data_file.exists() {
            fs::write(&cfg.data_file, "")
                .map_err(|e| Error::file_system(&cfg.data_file, "write default data", e))?;
        }
        Ok(cfg)
    }
}

#[async_trait]
impl LocalExecutor for LocalRunner {
    async fn execute(&self, payload: &Payload) -> Result<StatusRecord> {
        let cfg = self.config_for(payload)?;
        let record = handle(payload, &cfg, self.source.as_ref(), HashMap::new()).await;
        write_status(&cfg.status_file, &record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::tests::{runtime_tarball, FixtureSource};
    use fanout_core::{CallId, CallsetId, RuntimeDescriptor};
    use tempfile::tempdir;

    #[tokio::test]
    async fn executes_payloads_and_writes_status_files() {
        let dir = tempdir().unwrap();
        let source = Arc::new(FixtureSource::new(
            "d1",
            runtime_tarball("#!/bin/sh\necho done\n"),
        ));
        let runner = LocalRunner::new(dir.path(), source.clone());

        let callset = CallsetId::new("cs");
        for n in 0..2 {
            let payload = Payload::new(
                callset.clone(),
                CallId::indexed(n),
                RuntimeDescriptor::new("runtimes/rt.tar.gz"),
            );
            let record = runner.execute(&payload).await.unwrap();
            assert!(record.outcome.is_success());
        }

        // One shared runtime fetch, one status file per call.
        assert_eq!(*source.fetch_calls.lock().unwrap(), 1);
        assert!(dir.path().join("cs/00000/status.json").exists());
        assert!(dir.path().join("cs/00001/status.json").exists());
    }
}
