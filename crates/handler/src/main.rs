//! Handler entry point for the compute backend.
//!
//! The backend stages the payload file and exports the file-path variables
//! before starting this binary; everything else comes from the payload.

use anyhow::Context;
use fanout_core::PAYLOAD_FILE_VAR;
use fanout_handler::report::{read_payload, write_status};
use fanout_handler::{handle, HandlerConfig, HttpArtifactSource};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let payload_path: PathBuf = std::env::var(PAYLOAD_FILE_VAR)
        .with_context(|| format!("environment variable {PAYLOAD_FILE_VAR} is not set"))?
        .into();
    let payload = read_payload(&payload_path)?;
    let cfg = HandlerConfig::from_env()?;

    tracing::info!(
        callset_id = %payload.callset_id,
        call_id = %payload.call_id,
        "handling payload"
    );

    let source = HttpArtifactSource::new();
    let record = handle(&payload, &cfg, &source, HashMap::new()).await;
    let success = record.outcome.is_success();

    write_status(&cfg.status_file, &record)
        .with_context(|| format!("write status for call {}", payload.call_id))?;

    tracing::info!(call_id = %payload.call_id, success, "status recorded");
    Ok(())
}
