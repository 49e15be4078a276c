//! Directory-backed status store.
//!
//! Layout: `<root>/<callset_id>/<call_id>/status.json`. Status files are
//! written to a temporary name and renamed into place so a concurrent
//! listing never observes a partially-written record.

use async_trait::async_trait;
use fanout_core::{CallId, CallsetId, Error, Result, StatusRecord, StatusStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const STATUS_FILE: &str = "status.json";

/// Status store over a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn call_dir(&self, callset_id: &CallsetId, call_id: &CallId) -> PathBuf {
        self.root.join(callset_id.as_str()).join(call_id.as_str())
    }
}

#[async_trait]
impl StatusStore for LocalStore {
    async fn put_status(
        &self,
        callset_id: &CallsetId,
        call_id: &CallId,
        record: &StatusRecord,
    ) -> Result<()> {
        let dir = self.call_dir(callset_id, call_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::file_system(&dir, "create status directory", e))?;

        let body = serde_json::to_vec(record)
            .map_err(|e| Error::json("serialize status record", e))?;

        // Write-then-rename keeps the listing free of partial records.
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let path = dir.join(STATUS_FILE);
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| Error::file_system(&tmp, "write status record", e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            Error::file_system(&path, "publish status record", e)
        })?;
        Ok(())
    }

    async fn get_status(
        &self,
        callset_id: &CallsetId,
        call_id: &CallId,
    ) -> Result<Option<StatusRecord>> {
        let path = self.call_dir(callset_id, call_id).join(STATUS_FILE);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::file_system(&path, "read status record", e)),
        };
        let record = serde_json::from_slice(&body)
            .map_err(|e| Error::json("deserialize status record", e))?;
        Ok(Some(record))
    }

    async fn list_done_call_ids(&self, callset_id: &CallsetId) -> Result<HashSet<CallId>> {
        let dir = self.root.join(callset_id.as_str());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(Error::file_system(&dir, "list callset", e)),
        };

        let mut done = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::file_system(&dir, "list callset", e))?
        {
            if !entry.path().join(STATUS_FILE).exists() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                done.insert(CallId::new(name));
            }
        }
        Ok(done)
    }
}
