//! Module staging: unpack the payload's embedded module map onto disk.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fanout_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The function bundle as stored at the func key: serialized function plus
/// the base64-encoded module files it needs on the worker's search path.
#[derive(Debug, Default, Deserialize)]
pub struct FuncBundle {
    #[serde(default)]
    pub module_data: BTreeMap<String, String>,
}

/// Parse the function bundle from its staged local file.
pub fn load_bundle(path: &Path) -> Result<FuncBundle> {
    let body =
        fs::read(path).map_err(|e| Error::file_system(path, "read function bundle", e))?;
    serde_json::from_slice(&body).map_err(|e| Error::json("parse function bundle", e))
}

/// Clear and repopulate the module directory from the bundle's module map.
///
/// A leading path separator in a module's relative path is stripped, not
/// honored, so an embedded path cannot escape the staging root. Returns the
/// number of files written.
pub fn stage_modules(module_dir: &Path, module_data: &BTreeMap<String, String>) -> Result<usize> {
    if module_dir.exists() {
        fs::remove_dir_all(module_dir)
            .map_err(|e| Error::file_system(module_dir, "clear module directory", e))?;
    }
    fs::create_dir_all(module_dir)
        .map_err(|e| Error::file_system(module_dir, "create module directory", e))?;

    for (name, encoded) in module_data {
        let relative = name.trim_start_matches(['/', '\\']);
        let dest = module_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::file_system(parent, "create module subdirectory", e))?;
        }
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| Error::configuration(format!("module '{name}' is not valid base64: {e}")))?;
        fs::write(&dest, bytes)
            .map_err(|e| Error::file_system(&dest, "write module file", e))?;
    }
    Ok(module_data.len())
}
