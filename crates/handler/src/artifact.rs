//! Runtime artifact caching.
//!
//! Runtime bundles are content-addressed by their storage digest (etag).
//! Each digest gets its own directory under the cache root; the active
//! runtime is a symlink that is only ever swapped atomically, so it never
//! points at a partially-extracted tree.

use crate::config::HandlerConfig;
use async_trait::async_trait;
use fanout_core::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the runtime tree inside both the tarball and the digest dir.
const RUNTIME_DIR_NAME: &str = "runtime";

/// Where runtime bundles come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Content digest (etag) of the bundle at `key`, without fetching it.
    async fn head_digest(&self, key: &str) -> Result<String>;

    /// The gzipped tarball at `key`.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Artifact source over HTTP: HEAD for the etag, GET for the bundle.
pub struct HttpArtifactSource {
    client: reqwest::Client,
}

impl HttpArtifactSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpArtifactSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn head_digest(&self, key: &str) -> Result<String> {
        let response = self
            .client
            .head(key)
            .send()
            .await
            .map_err(|e| Error::network(key, e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::network(key, e.to_string()))?;

        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::network(key, "runtime bundle has no etag"))
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(key)
            .send()
            .await
            .map_err(|e| Error::network(key, e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::network(key, e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(key, e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Make the active runtime link point at the bundle identified by `key`.
///
/// Returns `true` on a cache hit (the link already points at a fully
/// extracted tree with the requested digest), `false` when the bundle was
/// fetched and extracted.
pub async fn ensure_runtime(
    cfg: &HandlerConfig,
    source: &dyn ArtifactSource,
    key: &str,
) -> Result<bool> {
    // Etags come back wrapped in double quotes; strip them.
    let digest = source.head_digest(key).await?.trim_matches('"').to_string();
    let target = cfg.runtime_root.join(&digest).join(RUNTIME_DIR_NAME);

    match fs::read_link(&cfg.runtime_link) {
        Ok(existing) if existing == target => {
            tracing::debug!(%digest, "runtime already linked, not re-downloading");
            return Ok(true);
        }
        Ok(_) => {}
        Err(_) => {
            if cfg.runtime_link.exists() {
                return Err(Error::configuration(format!(
                    "{} is not a symbolic link; runtime layout is broken",
                    cfg.runtime_link.display()
                )));
            }
        }
    }

    tracing::debug!(%digest, %key, "runtime not cached, downloading");
    let bytes = source.fetch(key).await?;

    let runtime_root = cfg.runtime_root.clone();
    let runtime_link = cfg.runtime_link.clone();
    let digest_dir = cfg.runtime_root.join(&digest);
    tokio::task::spawn_blocking(move || {
        extract_and_link(&bytes, &runtime_root, &digest_dir, &target, &runtime_link)
    })
    .await
    .map_err(|e| Error::configuration(format!("runtime extraction task failed: {e}")))??;

    Ok(false)
}

fn extract_and_link(
    bytes: &[u8],
    runtime_root: &Path,
    digest_dir: &Path,
    target: &Path,
    runtime_link: &Path,
) -> Result<()> {
    fs::create_dir_all(runtime_root)
        .map_err(|e| Error::file_system(runtime_root, "create runtime cache root", e))?;

    // Extract into a temporary sibling, then rename: the digest directory
    // only ever appears fully populated.
    let scratch = runtime_root.join(format!(".extract-{}", Uuid::new_v4()));
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    if let Err(e) = archive.unpack(&scratch) {
        let _ = fs::remove_dir_all(&scratch);
        return Err(Error::file_system(&scratch, "extract runtime bundle", e));
    }

    if digest_dir.exists() {
        fs::remove_dir_all(digest_dir)
            .map_err(|e| Error::file_system(digest_dir, "clear stale runtime", e))?;
    }
    fs::rename(&scratch, digest_dir)
        .map_err(|e| Error::file_system(digest_dir, "publish runtime", e))?;

    // Swap the active link atomically: symlink at a temporary name, then
    // rename over the old link.
    let link_scratch = link_scratch_name(runtime_link);
    let _ = fs::remove_file(&link_scratch);
    std::os::unix::fs::symlink(target, &link_scratch)
        .map_err(|e| Error::file_system(&link_scratch, "create runtime link", e))?;
    fs::rename(&link_scratch, runtime_link)
        .map_err(|e| Error::file_system(runtime_link, "swap runtime link", e))?;
    Ok(())
}

fn link_scratch_name(runtime_link: &Path) -> PathBuf {
    let name = runtime_link
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(RUNTIME_DIR_NAME);
    runtime_link.with_file_name(format!(".{name}-{}", Uuid::new_v4()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory artifact source with call counting.
    pub(crate) struct FixtureSource {
        pub digest: String,
        pub bundle: Vec<u8>,
        pub head_calls: Mutex<usize>,
        pub fetch_calls: Mutex<usize>,
    }

    impl FixtureSource {
        pub fn new(digest: &str, bundle: Vec<u8>) -> Self {
            Self {
                digest: format!("\"{digest}\""),
                bundle,
                head_calls: Mutex::new(0),
                fetch_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ArtifactSource for FixtureSource {
        async fn head_digest(&self, _key: &str) -> Result<String> {
            *self.head_calls.lock().unwrap() += 1;
            Ok(self.digest.clone())
        }

        async fn fetch(&self, _key: &str) -> Result<Vec<u8>> {
            *self.fetch_calls.lock().unwrap() += 1;
            Ok(self.bundle.clone())
        }
    }

    /// Build a gzipped runtime tarball whose `bin/worker` is `script`.
    pub(crate) fn runtime_tarball(script: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "runtime/bin/worker", script.as_bytes())
            .unwrap();

        let tarball = builder.into_inner().unwrap();
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&tarball).unwrap();
        gz.finish().unwrap()
    }

    pub(crate) fn cache_config(base: &Path) -> HandlerConfig {
        HandlerConfig {
            runtime_root: base.join("runtimes"),
            runtime_link: base.join("runtime"),
            module_dir: base.join("modules"),
            func_file: base.join("func.json"),
            data_file: base.join("data.bin"),
            output_file: base.join("output.bin"),
            status_file: base.join("status.json"),
            ..HandlerConfig::default()
        }
    }

    #[tokio::test]
    async fn same_digest_fetches_once_then_hits_cache() {
        let dir = tempdir().unwrap();
        let cfg = cache_config(dir.path());
        let source = FixtureSource::new("abc123", runtime_tarball("#!/bin/sh\nexit 0\n"));

        let cached = ensure_runtime(&cfg, &source, "runtimes/rt.tar.gz").await.unwrap();
        assert!(!cached);
        let cached = ensure_runtime(&cfg, &source, "runtimes/rt.tar.gz").await.unwrap();
        assert!(cached);

        assert_eq!(*source.fetch_calls.lock().unwrap(), 1);
        assert_eq!(*source.head_calls.lock().unwrap(), 2);

        let worker = dir.path().join("runtime").join("bin/worker");
        assert!(worker.exists());
    }

    #[tokio::test]
    async fn digest_change_replaces_the_active_link() {
        let dir = tempdir().unwrap();
        let cfg = cache_config(dir.path());

        let old = FixtureSource::new("old", runtime_tarball("#!/bin/sh\necho old\n"));
        ensure_runtime(&cfg, &old, "runtimes/rt.tar.gz").await.unwrap();

        let new = FixtureSource::new("new", runtime_tarball("#!/bin/sh\necho new\n"));
        let cached = ensure_runtime(&cfg, &new, "runtimes/rt.tar.gz").await.unwrap();
        assert!(!cached);

        let link = fs::read_link(&cfg.runtime_link).unwrap();
        assert!(link.to_string_lossy().contains("new"));
        let body = fs::read_to_string(cfg.runtime_link.join("bin/worker")).unwrap();
        assert!(body.contains("echo new"));
    }

    #[tokio::test]
    async fn non_symlink_at_the_active_path_is_rejected() {
        let dir = tempdir().unwrap();
        let cfg = cache_config(dir.path());
        fs::create_dir_all(&cfg.runtime_link).unwrap();

        let source = FixtureSource::new("abc", runtime_tarball("#!/bin/sh\n"));
        let err = ensure_runtime(&cfg, &source, "rt").await.unwrap_err();
        assert!(err.to_string().contains("not a symbolic link"));
    }
}
