// src/status.rs

//! Job lifecycle states and the rules for advancing them.
//!
//! The status record is the object persisted in a mailbox's `status.json`:
//!
//! ```json
//! {"status": "SCRAPING", "progress": 50, "message": "Extracting unit 1/1 ..."}
//! ```
//!
//! Allowed transitions form a DAG:
//!
//! ```text
//! STARTING -> WAITING_SCAN* -> SCRAPING* -> DONE
//!     \            \               \
//!      +------------+---------------+--> ERROR
//! ```
//!
//! `DONE` and `ERROR` are terminal. [`StatusTracker`] is the pure state
//! machine the worker consults before every write; it never touches disk.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{HarvestError, Result};

/// Lifecycle state of a job. Encoded on the wire as its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Starting,
    WaitingScan,
    Scraping,
    Done,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }

    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Starting => "STARTING",
            Status::WaitingScan => "WAITING_SCAN",
            Status::Scraping => "SCRAPING",
            Status::Done => "DONE",
            Status::Error => "ERROR",
        }
    }

    /// Whether a job currently in `self` may next record `next`.
    ///
    /// Repeating `WAITING_SCAN` / `SCRAPING` is allowed here; the progress
    /// rules for repeats are checked by [`StatusTracker`].
    pub fn can_advance_to(self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (Done | Error, _) => false,
            (_, Error) => true,
            (Starting, WaitingScan | Scraping) => true,
            (WaitingScan, WaitingScan | Scraping) => true,
            (Scraping, Scraping | Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of `status.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusRecord {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            progress: None,
            message: None,
        }
    }

    pub fn starting() -> Self {
        Self::new(Status::Starting)
    }

    pub fn waiting_scan(progress: u32) -> Self {
        Self {
            status: Status::WaitingScan,
            progress: Some(progress),
            message: None,
        }
    }

    pub fn scraping(progress: u32, message: impl Into<String>) -> Self {
        Self {
            status: Status::Scraping,
            progress: Some(progress),
            message: Some(message.into()),
        }
    }

    pub fn done() -> Self {
        Self::new(Status::Done)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            progress: None,
            message: Some(message.into()),
        }
    }
}

/// Progress reported after the `index`-th (1-indexed) unit of an extraction
/// limited to `limit` units: `round(index * 100 / (limit + 1))`.
///
/// The `+ 1` keeps the last unit below 100 for small limits; for limits in
/// the hundreds rounding would still reach 100, so the result is capped at 99.
/// 100 is never reported while extracting. Halves round to even.
pub fn scrape_progress(index: usize, limit: usize) -> u32 {
    let pct = index as f64 * 100.0 / (limit as f64 + 1.0);
    (pct.round_ties_even() as u32).min(MAX_SCRAPE_PROGRESS)
}

const MAX_SCRAPE_PROGRESS: u32 = 99;

/// Writer-side guard for the lifecycle DAG.
///
/// Tracks the last status the worker recorded and rejects anything that would
/// move backwards, skip a phase, lower progress, or follow a terminal state.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    current: Option<Status>,
    progress: Option<u32>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Status> {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_some_and(Status::is_terminal)
    }

    /// Validate `next` against the current state and, if legal, make it the
    /// current state.
    pub fn advance(&mut self, next: &StatusRecord) -> Result<()> {
        match self.current {
            None => {
                if !matches!(next.status, Status::Starting | Status::Error) {
                    return Err(HarvestError::IllegalTransition(format!(
                        "first status must be STARTING or ERROR, got {}",
                        next.status
                    )));
                }
            }
            Some(current) => {
                if !current.can_advance_to(next.status) {
                    return Err(HarvestError::IllegalTransition(format!(
                        "{current} -> {}",
                        next.status
                    )));
                }
                if current == next.status {
                    self.check_repeat_progress(current, next.progress)?;
                }
            }
        }

        if self.current != Some(next.status) {
            self.progress = None;
        }
        self.current = Some(next.status);
        if next.progress.is_some() {
            self.progress = next.progress;
        }
        Ok(())
    }

    fn check_repeat_progress(&self, status: Status, next: Option<u32>) -> Result<()> {
        let (Some(prev), Some(next)) = (self.progress, next) else {
            return Ok(());
        };
        let ok = match status {
            // A repeat WAITING_SCAN means a new token was rendered.
            Status::WaitingScan => next > prev,
            _ => next >= prev,
        };
        if ok {
            Ok(())
        } else {
            Err(HarvestError::IllegalTransition(format!(
                "{status} progress {prev} -> {next}"
            )))
        }
    }
}
