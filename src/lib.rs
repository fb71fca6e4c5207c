// src/lib.rs

pub mod automation;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod job_id;
pub mod logging;
pub mod mailbox;
pub mod registry;
pub mod status;
pub mod types;
pub mod worker;

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::automation::CommandAutomation;
use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_or_default};
use crate::exec::ProcessLauncher;
use crate::job_id::JobId;
use crate::mailbox::Mailbox;
use crate::registry::JobRegistry;
use crate::status::{Status, StatusRecord};
use crate::worker::Worker;

/// High-level entry point used by `main.rs`.
///
/// Loads the config, then runs one subcommand:
/// - `create`: allocate a job and spawn its worker process
/// - `status` / `token` / `result`: read a job's mailbox
/// - `watch`: follow a job until it is terminal
/// - `worker`: the body of a spawned worker process
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&args.config)
        .with_context(|| format!("loading config from {:?}", args.config))?;
    let root = cfg.mailbox.effective_root();
    debug!(root = ?root, "using mailbox root");

    match args.command.clone() {
        Command::Create { limit } => {
            let limit = limit.unwrap_or(cfg.worker.default_limit);
            let launcher = ProcessLauncher::current_exe(worker_base_args(&args))?;
            let registry = JobRegistry::new(root, launcher);
            let id = registry.create_job(limit)?;
            println!("{id}");
        }
        Command::Status { job } => {
            let id: JobId = job.parse()?;
            let record = registry::get_status(&root, &id)?;
            println!("{}", serde_json::to_string(&record)?);
        }
        Command::Token { job } => {
            let id: JobId = job.parse()?;
            println!("{}", registry::get_token(&root, &id)?);
        }
        Command::Result { job } => {
            let id: JobId = job.parse()?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(registry::get_result(&root, &id)?.as_bytes())?;
            stdout.flush()?;
        }
        Command::Watch { job } => {
            let id: JobId = job.parse()?;
            let interval = cfg.worker.poll_interval();
            let mut stdout = std::io::stdout();

            tokio::select! {
                res = watch_job(&root, &id, interval, &mut stdout) => {
                    res?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(job = %id, "interrupted; no longer watching");
                }
            }
        }
        Command::Worker { job, limit } => {
            let id: JobId = job.parse()?;
            run_worker(cfg, &root, id, limit).await?;
        }
    }

    Ok(())
}

/// Arguments every spawned worker receives before its `worker` subcommand,
/// so it sees the same config and log level as its creator.
///
/// A config path that does not exist is not forwarded: the creator fell back
/// to defaults, and the worker (same working directory) will too.
fn worker_base_args(args: &CliArgs) -> Vec<OsString> {
    let mut base = Vec::new();
    if Path::new(&args.config).exists() {
        base.push(OsString::from("--config"));
        base.push(absolute_config_path(&args.config));
    }
    if let Some(level) = args.log_level {
        base.push(OsString::from("--log-level"));
        base.push(OsString::from(level.as_arg()));
    }
    base
}

fn absolute_config_path(config: &str) -> OsString {
    std::path::absolute(config)
        .map(|p| p.into_os_string())
        .unwrap_or_else(|_| OsString::from(config))
}

/// Body of a worker process: drive the job named `id` to `DONE` or `ERROR`.
async fn run_worker(cfg: ConfigFile, root: &Path, id: JobId, limit: usize) -> Result<()> {
    let mailbox = Mailbox::open(root, &id)?;
    let automation = CommandAutomation::from_config(&cfg.automation);

    Worker::new(mailbox, limit)
        .with_poll_interval(cfg.worker.poll_interval())
        .run(std::future::ready(Ok(automation)))
        .await?;

    Ok(())
}

/// Poll the status of job `id` every `interval` until it is terminal.
///
/// Each distinct status record is written to `out` as one JSON line.
/// Returns an error if the job ends in `ERROR`.
pub async fn watch_job<W: Write>(
    root: &Path,
    id: &JobId,
    interval: Duration,
    out: &mut W,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut last: Option<StatusRecord> = None;

    loop {
        ticker.tick().await;

        let record = registry::get_status(root, id)?;
        if last.as_ref() != Some(&record) {
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
            out.flush()?;
        }

        match record.status {
            Status::Done => return Ok(()),
            Status::Error => bail!(
                "job {id} failed: {}",
                record.message.as_deref().unwrap_or("no message")
            ),
            _ => {}
        }

        last = Some(record);
    }
}
