//! Sandboxed worker execution.
//!
//! The worker runs in its own process group so a timeout kill reaches the
//! whole tree, not just the direct child. Stdout and stderr are drained
//! concurrently while the process runs, so the captured output survives a
//! timeout kill up to the last line the worker managed to write.

use crate::config::HandlerConfig;
use fanout_core::{Error, Payload, Result, MODULE_PATH_VAR, RUNTIME_BIN_DIR, RUNTIME_WORKER_ENTRY};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// How the worker process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// The worker exited on its own. `None` means it died to a signal.
    Exited(Option<i32>),
    /// The worker blew its wall-clock budget and was killed.
    TimedOut { elapsed: Duration },
}

/// Captured output plus the final disposition of one worker run.
#[derive(Debug)]
pub struct ExecOutput {
    pub stdout: String,
    pub status: WorkerStatus,
}

/// Run the worker entry point of the active runtime against the staged
/// func/data files, enforcing the configured wall-clock budget.
pub async fn run_worker(cfg: &HandlerConfig, payload: &Payload) -> Result<ExecOutput> {
    let worker = cfg.runtime_link.join(RUNTIME_WORKER_ENTRY);
    let runtime_bin = cfg.runtime_link.join(RUNTIME_BIN_DIR);
    let path = match std::env::var("PATH") {
        Ok(existing) => format!("{}:{existing}", runtime_bin.display()),
        Err(_) => runtime_bin.display().to_string(),
    };

    let mut command = Command::new(&worker);
    command
        .arg(&cfg.func_file)
        .arg(&cfg.data_file)
        .arg(&cfg.output_file)
        // Pin BLAS-style thread pools to one thread each; parallelism
        // belongs to the fanout, not to any single worker.
        .env("OMP_NUM_THREADS", "1")
        .env("OPENBLAS_NUM_THREADS", "1")
        .env("MKL_NUM_THREADS", "1")
        .env(MODULE_PATH_VAR, &cfg.module_dir)
        .env("PATH", path)
        .envs(&payload.extra_env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| Error::file_system(&worker, "spawn worker", e))?;
    let pid = child.id();

    let (tx, mut rx) = mpsc::channel::<String>(1024);
    if let Some(stream) = child.stdout.take() {
        tokio::spawn(drain_lines(stream, tx.clone()));
    }
    if let Some(stream) = child.stderr.take() {
        tokio::spawn(drain_lines(stream, tx.clone()));
    }
    drop(tx);

    let started = Instant::now();
    let mut stdout = String::new();
    let mut exit: Option<std::process::ExitStatus> = None;

    loop {
        // The budget stays live until the pipes close: an exited worker can
        // leave a background grandchild holding stdout open, and that
        // grandchild is bound by the same wall clock as its parent.
        if started.elapsed() > cfg.max_runtime {
            let elapsed = started.elapsed();
            tracing::warn!(?elapsed, budget = ?cfg.max_runtime, "worker over budget, killing process group");
            kill_tree(&mut child, pid).await;
            while let Some(line) = rx.recv().await {
                push_line(&mut stdout, &line);
            }
            return Ok(ExecOutput {
                stdout,
                status: WorkerStatus::TimedOut { elapsed },
            });
        }

        tokio::select! {
            status = child.wait(), if exit.is_none() => {
                exit = Some(status.map_err(|e| Error::file_system(&worker, "wait for worker", e))?);
            }
            line = rx.recv() => match line {
                Some(line) => push_line(&mut stdout, &line),
                // Both pipes closed; output is complete.
                None => break,
            },
            _ = tokio::time::sleep(cfg.poll_interval) => {}
        }
    }

    let status = match exit {
        Some(status) => status,
        None => child
            .wait()
            .await
            .map_err(|e| Error::file_system(&worker, "wait for worker", e))?,
    };
    Ok(ExecOutput {
        stdout,
        status: WorkerStatus::Exited(status.code()),
    })
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

async fn drain_lines(stream: impl AsyncRead + Unpin, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// TERM the worker's process group, give it a short grace period, then KILL
/// whatever is left and reap the child.
async fn kill_tree(child: &mut tokio::process::Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        unsafe {
            libc::killpg(pid as i32, libc::SIGTERM);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        // The group can outlive an already-reaped direct child; KILL is
        // idempotent, so send it unconditionally.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    let _ = child.kill().await;
    let _ = child.wait().await;
}
