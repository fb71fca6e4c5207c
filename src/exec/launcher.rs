// src/exec/launcher.rs

//! Spawning worker processes.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::job_id::JobId;

/// Trait abstracting how the worker for a freshly created job is started.
///
/// Production code uses [`ProcessLauncher`]; tests can provide an
/// implementation that runs the worker in-process.
pub trait WorkerLauncher: Send + Sync {
    /// Start exactly one worker bound to `job` and `limit`.
    ///
    /// Must return as soon as the worker is started, without waiting for any
    /// of its progress. Called from within a tokio runtime.
    fn launch(&self, job: &JobId, limit: usize) -> Result<()>;
}

/// Starts each worker as a separate OS process running
/// `<program> <base args> worker --job <id> --limit <n>`.
///
/// A crashing worker can therefore never take readers down with it. The
/// child's stdin and stdout are detached; stderr (its log) is inherited.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    base_args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Re-execute the currently running binary.
    pub fn current_exe(base_args: Vec<OsString>) -> Result<Self> {
        let program = std::env::current_exe().context("locating the harvest executable")?;
        Ok(Self::new(program, base_args))
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, job: &JobId, limit: usize) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .arg("worker")
            .arg("--job")
            .arg(job.as_str())
            .arg("--limit")
            .arg(limit.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning worker process for job {job}"))?;

        let pid = child.id();
        info!(job = %job, ?pid, limit, "spawned worker process");

        // Reap the child when it exits so a long-lived caller does not
        // accumulate zombies. Readers learn the outcome from the mailbox.
        let job = job.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(job = %job, ?pid, "worker process exited");
                }
                Ok(status) => {
                    warn!(job = %job, ?pid, exit_code = ?status.code(), "worker process failed");
                }
                Err(e) => {
                    warn!(job = %job, ?pid, error = %e, "waiting for worker process");
                }
            }
        });

        Ok(())
    }
}
