//! One-payload orchestration: validate, stage, cache, execute, report.

use crate::artifact::{ensure_runtime, ArtifactSource};
use crate::config::HandlerConfig;
use crate::exec::{run_worker, WorkerStatus};
use crate::staging::{load_bundle, stage_modules};
use fanout_core::{
    unix_now, Error, FailureKind, InvocationKind, Outcome, Payload, StatusRecord,
    PROTOCOL_VERSION,
};
use std::collections::HashMap;

/// Process one dispatched payload end to end.
///
/// Always produces a status record, on success and on every failure path
/// alike; the record's outcome carries the failure classification instead of
/// this function returning an error.
pub async fn handle(
    payload: &Payload,
    cfg: &HandlerConfig,
    source: &dyn ArtifactSource,
    context: HashMap<String, String>,
) -> StatusRecord {
    let mut record = StatusRecord::begin(
        payload.callset_id.clone(),
        payload.call_id.clone(),
        payload.host_submit_time,
    );
    record.context = context;

    if let Err(e) = run(payload, cfg, source, &mut record).await {
        if record.end_time == 0.0 {
            record.end_time = unix_now();
        }
        tracing::warn!(call_id = %payload.call_id, error = %e, "attempt failed");
        record.outcome = outcome_for(e);
    }
    record
}

async fn run(
    payload: &Payload,
    cfg: &HandlerConfig,
    source: &dyn ArtifactSource,
    record: &mut StatusRecord,
) -> fanout_core::Result<()> {
    // Version check before any side effect: a mismatched payload must not
    // touch the module dir or the artifact cache.
    if payload.protocol_version != PROTOCOL_VERSION {
        return Err(Error::protocol_mismatch(
            PROTOCOL_VERSION,
            payload.protocol_version.clone(),
        ));
    }

    if payload.kind == InvocationKind::Warm {
        // Warm payloads only pre-pull the runtime; no modules, no worker.
        let key = payload
            .runtime_url
            .as_deref()
            .unwrap_or(payload.runtime.key.as_str());
        record.runtime_cached = ensure_runtime(cfg, source, key).await?;
        record.end_time = unix_now();
        return Ok(());
    }

    let bundle = load_bundle(&cfg.func_file)?;
    let staged = stage_modules(&cfg.module_dir, &bundle.module_data)?;
    tracing::debug!(call_id = %payload.call_id, staged, "modules staged");

    let key = payload
        .runtime_url
        .as_deref()
        .unwrap_or(payload.runtime.key.as_str());
    record.runtime_cached = ensure_runtime(cfg, source, key).await?;
    record.setup_time = unix_now() - record.start_time;

    let output = run_worker(cfg, payload).await?;
    record.stdout = output.stdout;
    record.end_time = unix_now();
    record.exec_time = record.end_time - record.start_time - record.setup_time;

    match output.status {
        WorkerStatus::Exited(Some(0)) => Ok(()),
        WorkerStatus::Exited(code) => {
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            Err(Error::execution(
                format!("worker exited with status {code}"),
                record.stdout.clone(),
            ))
        }
        WorkerStatus::TimedOut { elapsed } => Err(Error::timeout(cfg.max_runtime, elapsed)),
    }
}

fn outcome_for(error: Error) -> Outcome {
    match error {
        Error::ProtocolMismatch { .. } => {
            Outcome::failed(FailureKind::ProtocolMismatch, error.to_string(), String::new())
        }
        Error::Timeout { .. } => Outcome::TimedOut {
            message: error.to_string(),
        },
        Error::Execution { ref trace, .. } => {
            let trace = trace.clone();
            Outcome::failed(FailureKind::Execution, error.to_string(), trace)
        }
        other => Outcome::failed(FailureKind::Internal, other.to_string(), String::new()),
    }
}
