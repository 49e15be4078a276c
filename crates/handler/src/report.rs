//! Payload intake and status reporting on the handler side.

use fanout_core::{Error, Payload, Result, StatusRecord};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Read and parse the dispatched payload from its staged local file.
pub fn read_payload(path: &Path) -> Result<Payload> {
    let body = fs::read(path).map_err(|e| Error::file_system(path, "read payload", e))?;
    serde_json::from_slice(&body).map_err(|e| Error::json("parse payload", e))
}

/// Write the status record next to the other staged files.
///
/// Written to a temporary name and renamed into place, so a reader never
/// observes a half-written record.
pub fn write_status(path: &Path, record: &StatusRecord) -> Result<()> {
    let body = serde_json::to_vec(record).map_err(|e| Error::json("serialize status record", e))?;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent, "create status directory", e))?;

    let tmp = parent.join(format!(".status-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, &body).map_err(|e| Error::file_system(&tmp, "write status record", e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::file_system(path, "publish status record", e)
    })?;
    Ok(())
}
