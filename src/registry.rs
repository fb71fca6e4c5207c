// src/registry.rs

//! Job registry: the entry point for creating jobs and reading their state.
//!
//! Creating a job allocates a fresh [`JobId`], creates its mailbox and starts
//! its worker. Reading a job just opens the mailbox named by the id; readers
//! keep no state and never coordinate with each other.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::errors::{HarvestError, Result};
use crate::exec::WorkerLauncher;
use crate::job_id::JobId;
use crate::mailbox::Mailbox;
use crate::status::{Status, StatusRecord};
use crate::types::JobInfo;

#[derive(Debug)]
pub struct JobRegistry<L: WorkerLauncher> {
    root: PathBuf,
    launcher: L,
}

impl<L: WorkerLauncher> JobRegistry<L> {
    pub fn new(root: impl Into<PathBuf>, launcher: L) -> Self {
        Self {
            root: root.into(),
            launcher,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Create a job whose worker processes at most `limit` work units.
    ///
    /// Returns as soon as the worker has been started. If the worker cannot be
    /// started, the mailbox is left in `ERROR` and `Allocation` is returned.
    pub fn create_job(&self, limit: usize) -> Result<JobId> {
        let id = JobId::generate();
        let mailbox = Mailbox::create(&self.root, &id, &JobInfo::new(limit))?;

        if let Err(e) = self.launcher.launch(&id, limit) {
            let err = HarvestError::Allocation(format!("starting worker for job {id}: {}", e.detail()));
            if let Err(write_err) = mailbox.set_status(&StatusRecord::error(err.status_message())) {
                error!(job = %id, error = %write_err, "failed to record launch failure");
            }
            return Err(err);
        }

        info!(job = %id, limit, "created job");
        Ok(id)
    }

    pub fn get_status(&self, id: &JobId) -> Result<StatusRecord> {
        get_status(&self.root, id)
    }

    pub fn status_of(&self, id: &JobId) -> Result<Status> {
        status_of(&self.root, id)
    }

    pub fn get_token(&self, id: &JobId) -> Result<String> {
        get_token(&self.root, id)
    }

    pub fn get_result(&self, id: &JobId) -> Result<String> {
        get_result(&self.root, id)
    }
}

/// Full status record of job `id`.
pub fn get_status(root: &Path, id: &JobId) -> Result<StatusRecord> {
    Mailbox::open(root, id)?.get_status()
}

/// Just the lifecycle state of job `id`.
pub fn status_of(root: &Path, id: &JobId) -> Result<Status> {
    Ok(get_status(root, id)?.status)
}

/// Latest login token of job `id` (empty until the first one is rendered).
pub fn get_token(root: &Path, id: &JobId) -> Result<String> {
    Mailbox::open(root, id)?.read_token()
}

/// Raw result record of job `id`.
///
/// Only a `DONE` job is guaranteed to return a single JSON array; earlier
/// reads return the partial JSON-lines form.
pub fn get_result(root: &Path, id: &JobId) -> Result<String> {
    Mailbox::open(root, id)?.read_results()
}
