// src/automation/command.rs

//! Automation backed by an external bridge program.
//!
//! The bridge is whatever actually controls the browser. It is invoked once
//! per operation with a subcommand appended to the configured arguments:
//!
//! | subcommand            | stdout                                   |
//! |-----------------------|------------------------------------------|
//! | `login-token`         | the rendered token                       |
//! | `login-consumed`      | `true` or `false`                        |
//! | `units`               | one `{"id": .., "label": ..}` per line   |
//! | `records <unit-id>`   | one JSON record per line                 |
//!
//! Exiting with the configured timeout code (124 by default, like
//! `timeout(1)`) reports a timeout; any other non-zero exit is a failure.
//! `units` and `records` are read line by line as the worker pulls them, and
//! the child is killed if the worker stops early.

use std::marker::PhantomData;
use std::process::{ExitStatus, Stdio};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use crate::automation::{Automation, BoxFuture, Records, Sequence, WorkUnits};
use crate::config::AutomationSection;
use crate::errors::{HarvestError, Result};
use crate::types::WorkUnit;

#[derive(Debug, Clone)]
pub struct CommandAutomation {
    program: String,
    args: Vec<String>,
    timeout_exit_code: i32,
}

impl CommandAutomation {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_exit_code: i32) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_exit_code,
        }
    }

    pub fn from_config(cfg: &AutomationSection) -> Self {
        Self::new(cfg.command.clone(), cfg.args.clone(), cfg.timeout_exit_code)
    }

    fn command(&self, subcommand: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(subcommand)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Run a subcommand to completion and return its trimmed stdout.
    async fn run_to_string(&self, subcommand: &[&str]) -> Result<String> {
        debug!(program = %self.program, ?subcommand, "running bridge command");

        let output = self
            .command(subcommand)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| spawn_error(&self.program, subcommand, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        self.check_exit(&subcommand.join(" "), output.status, stderr.trim())?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Start a subcommand whose stdout is parsed lazily, one JSON value per
    /// line.
    fn stream<T>(&self, subcommand: &[&str]) -> Result<JsonLines<T>> {
        debug!(program = %self.program, ?subcommand, "streaming bridge command");

        let mut child = self
            .command(subcommand)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spawn_error(&self.program, subcommand, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            HarvestError::Automation(format!("bridge `{}` has no stdout", subcommand.join(" ")))
        })?;

        Ok(JsonLines {
            bridge: self.clone(),
            subcommand: subcommand.join(" "),
            child,
            lines: BufReader::new(stdout).lines(),
            finished: false,
            item: PhantomData,
        })
    }

    fn check_exit(&self, what: &str, status: ExitStatus, stderr: &str) -> Result<()> {
        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(code) if code == self.timeout_exit_code => {
                Err(HarvestError::Timeout(format!("bridge `{what}` timed out: {stderr}")))
            }
            Some(code) => Err(HarvestError::Automation(format!(
                "bridge `{what}` exited with code {code}: {stderr}"
            ))),
            None => Err(HarvestError::Automation(format!(
                "bridge `{what}` was terminated by a signal"
            ))),
        }
    }
}

impl Automation for CommandAutomation {
    fn render_login_token(&mut self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { self.run_to_string(&["login-token"]).await })
    }

    fn is_login_consumed(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let out = self.run_to_string(&["login-consumed"]).await?;
            match out.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(HarvestError::Automation(format!(
                    "bridge `login-consumed` printed {other:?} (expected \"true\" or \"false\")"
                ))),
            }
        })
    }

    fn work_units(&mut self) -> BoxFuture<'_, Result<WorkUnits>> {
        Box::pin(async move {
            let units: WorkUnits = Box::new(self.stream::<WorkUnit>(&["units"])?);
            Ok(units)
        })
    }

    fn extract_records<'a>(&'a mut self, unit: &'a WorkUnit) -> BoxFuture<'a, Result<Records>> {
        Box::pin(async move {
            let records: Records =
                Box::new(self.stream::<Value>(&["records", unit.id.as_str()])?);
            Ok(records)
        })
    }
}

/// Non-empty stdout lines of a running bridge command, each parsed as `T`.
///
/// After the last line the child's exit status is checked, so a bridge that
/// fails halfway surfaces as an error item rather than a short sequence.
/// Dropping the sequence early kills the child (`kill_on_drop`).
struct JsonLines<T> {
    bridge: CommandAutomation,
    subcommand: String,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    finished: bool,
    item: PhantomData<fn() -> T>,
}

impl<T> Sequence<T> for JsonLines<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn next(&mut self) -> BoxFuture<'_, Option<Result<T>>> {
        Box::pin(async move {
            if self.finished {
                return None;
            }

            loop {
                match self.lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        return Some(serde_json::from_str(&line).map_err(HarvestError::from));
                    }
                    Ok(None) => {
                        self.finished = true;
                        let status = match self.child.wait().await {
                            Ok(status) => status,
                            Err(e) => return Some(Err(HarvestError::Io(e))),
                        };
                        return self
                            .bridge
                            .check_exit(&self.subcommand, status, "see worker log")
                            .err()
                            .map(Err);
                    }
                    Err(e) => {
                        self.finished = true;
                        if let Err(kill_err) = self.child.kill().await {
                            debug!(
                                subcommand = %self.subcommand,
                                error = %kill_err,
                                "bridge already gone"
                            );
                        }
                        return Some(Err(HarvestError::Io(e)));
                    }
                }
            }
        })
    }
}

fn spawn_error(program: &str, subcommand: &[&str], e: std::io::Error) -> HarvestError {
    HarvestError::Automation(format!(
        "spawning bridge `{program} {}`: {e}",
        subcommand.join(" ")
    ))
}
