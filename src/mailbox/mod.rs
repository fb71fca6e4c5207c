// src/mailbox/mod.rs

//! Per-job, file-backed mailbox.
//!
//! A mailbox is the only channel between a worker process and the readers of
//! its job. It is a directory named by the job id under the mailbox root:
//!
//! ```text
//! <root>/<job id>/
//!   status.json   {"status": ..., "progress"?: .., "message"?: ..}
//!   token.txt     latest rendered login token
//!   result.json   JSON lines while extracting, one JSON array once DONE
//!   info.json     job metadata
//!   lock.file     cross-process lock guarding all of the above
//! ```
//!
//! Every accessor runs under the lock for exactly one record read or write.
//! Status, token and compaction writes go through [`atomic::atomic_write`],
//! so even a process dying mid-write leaves the previous record intact.
//! Result appends are plain appends.

mod atomic;
pub mod lock;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{HarvestError, Result};
use crate::job_id::JobId;
use crate::status::StatusRecord;
use crate::types::JobInfo;

use self::atomic::atomic_write;
use self::lock::MailboxLock;

pub const STATUS_FILE: &str = "status.json";
pub const TOKEN_FILE: &str = "token.txt";
pub const RESULT_FILE: &str = "result.json";
pub const INFO_FILE: &str = "info.json";
pub const LOCK_FILE: &str = "lock.file";

#[derive(Debug, Clone)]
pub struct Mailbox {
    id: JobId,
    dir: PathBuf,
}

impl Mailbox {
    /// Create the mailbox directory for `id` under `root` and seed its records.
    ///
    /// Fails with `Allocation` if the directory already exists or cannot be
    /// created owner-only. The seeded status is `STARTING`.
    pub fn create(root: &Path, id: &JobId, job_info: &JobInfo) -> Result<Self> {
        Self::create_with(root, id, |mailbox| mailbox.seed(job_info))
    }

    /// Create the directory, then run `seed` on it. If seeding fails the
    /// directory is removed again, so a failed allocation leaves no job.
    fn create_with(
        root: &Path,
        id: &JobId,
        seed: impl FnOnce(&Mailbox) -> Result<()>,
    ) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| {
            HarvestError::Allocation(format!("creating mailbox root {:?}: {e}", root))
        })?;

        let dir = root.join(id.as_str());
        create_private_dir(&dir).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => {
                HarvestError::Allocation(format!("mailbox for job {id} already exists"))
            }
            _ => HarvestError::Allocation(format!("creating mailbox {:?}: {e}", dir)),
        })?;

        let mailbox = Self {
            id: id.clone(),
            dir,
        };
        if let Err(e) = seed(&mailbox) {
            if let Err(rm_err) = fs::remove_dir_all(&mailbox.dir) {
                warn!(job = %id, error = %rm_err, "failed to remove half-created mailbox");
            }
            return Err(HarvestError::Allocation(format!(
                "initialising mailbox for job {id}: {}",
                e.detail()
            )));
        }

        info!(job = %id, dir = ?mailbox.dir, "created mailbox");
        Ok(mailbox)
    }

    /// Open the existing mailbox for `id`.
    pub fn open(root: &Path, id: &JobId) -> Result<Self> {
        let dir = root.join(id.as_str());
        if !dir.is_dir() {
            return Err(HarvestError::NotFound(id.to_string()));
        }
        Ok(Self {
            id: id.clone(),
            dir,
        })
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set_status(&self, record: &StatusRecord) -> Result<()> {
        let json = serde_json::to_vec(record)?;
        debug!(
            job = %self.id,
            status = %record.status,
            progress = ?record.progress,
            "writing status"
        );
        let _guard = self.lock()?;
        self.replace(STATUS_FILE, &json)
    }

    pub fn get_status(&self) -> Result<StatusRecord> {
        let raw = {
            let _guard = self.lock()?;
            self.read(STATUS_FILE)?
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_token(&self, token: &str) -> Result<()> {
        debug!(job = %self.id, "writing login token");
        let _guard = self.lock()?;
        self.replace(TOKEN_FILE, token.as_bytes())
    }

    pub fn read_token(&self) -> Result<String> {
        let _guard = self.lock()?;
        self.read(TOKEN_FILE)
    }

    /// Append each record as one JSON line. Never truncates.
    pub fn append_results(&self, records: &[Value]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let _guard = self.lock()?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path(RESULT_FILE))
            .map_err(|e| self.io_error(e))?;
        file.write_all(&buf)?;
        file.sync_data()?;

        debug!(job = %self.id, appended = records.len(), "appended results");
        Ok(())
    }

    /// Rewrite the JSON-lines result record as a single JSON array.
    ///
    /// Must run exactly once, after extraction succeeded and before `DONE` is
    /// written. Returns the number of records in the array.
    pub fn compact_results(&self) -> Result<usize> {
        let _guard = self.lock()?;
        let raw = self.read(RESULT_FILE)?;

        let records = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let json = serde_json::to_vec(&records)?;
        self.replace(RESULT_FILE, &json)?;

        info!(job = %self.id, records = records.len(), "compacted results");
        Ok(records.len())
    }

    /// Raw result record: a JSON array once the job is `DONE`, JSON lines
    /// before that. Callers should check the status before parsing.
    pub fn read_results(&self) -> Result<String> {
        let _guard = self.lock()?;
        self.read(RESULT_FILE)
    }

    pub fn read_info(&self) -> Result<JobInfo> {
        let raw = {
            let _guard = self.lock()?;
            self.read(INFO_FILE)?
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn seed(&self, job_info: &JobInfo) -> Result<()> {
        let _guard = self.lock()?;
        self.replace(INFO_FILE, &serde_json::to_vec(job_info)?)?;
        self.replace(TOKEN_FILE, b"")?;
        self.replace(RESULT_FILE, b"")?;
        self.replace(STATUS_FILE, &serde_json::to_vec(&StatusRecord::starting())?)
    }

    fn lock(&self) -> Result<MailboxLock> {
        MailboxLock::acquire(&self.path(LOCK_FILE)).map_err(|e| self.io_error(e))
    }

    fn read(&self, name: &str) -> Result<String> {
        fs::read_to_string(self.path(name)).map_err(|e| self.io_error(e))
    }

    fn replace(&self, name: &str, contents: &[u8]) -> Result<()> {
        atomic_write(&self.path(name), contents).map_err(|e| self.io_error(e))
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// A missing file means the mailbox was never created or has been
    /// cleaned up.
    fn io_error(&self, e: io::Error) -> HarvestError {
        if e.kind() == io::ErrorKind::NotFound {
            HarvestError::NotFound(self.id.to_string())
        } else {
            HarvestError::Io(e)
        }
    }
}

/// The write side of a mailbox, as used by a worker.
///
/// [`Mailbox`] is the production implementation. Tests wrap it to record or
/// fail individual writes.
pub trait MailboxWriter {
    fn job_id(&self) -> &JobId;
    fn set_status(&self, record: &StatusRecord) -> Result<()>;
    fn write_token(&self, token: &str) -> Result<()>;
    fn append_results(&self, records: &[Value]) -> Result<()>;
    fn compact_results(&self) -> Result<usize>;
}

impl MailboxWriter for Mailbox {
    fn job_id(&self) -> &JobId {
        self.id()
    }

    fn set_status(&self, record: &StatusRecord) -> Result<()> {
        Mailbox::set_status(self, record)
    }

    fn write_token(&self, token: &str) -> Result<()> {
        Mailbox::write_token(self, token)
    }

    fn append_results(&self, records: &[Value]) -> Result<()> {
        Mailbox::append_results(self, records)
    }

    fn compact_results(&self) -> Result<usize> {
        Mailbox::compact_results(self)
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new().mode(0o700).create(dir)?;

    let mode = fs::metadata(dir)?.permissions().mode();
    if mode & 0o077 != 0 {
        fs::remove_dir(dir)?;
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("mailbox directory is not owner-only (mode {:o})", mode & 0o777),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_seed_removes_the_mailbox_directory() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::generate();

        let result = Mailbox::create_with(root.path(), &id, |mailbox| {
            mailbox.replace(INFO_FILE, b"{}")?;
            Err(HarvestError::Io(io::Error::other("disk full")))
        });

        match result {
            Err(HarvestError::Allocation(msg)) => assert!(msg.contains("disk full")),
            other => panic!("Expected Allocation error, got: {:?}", other),
        }
        assert!(!root.path().join(id.as_str()).exists());
        assert!(matches!(
            Mailbox::open(root.path(), &id),
            Err(HarvestError::NotFound(_))
        ));
    }

    #[test]
    fn successful_create_keeps_the_seeded_directory() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::generate();

        let mailbox = Mailbox::create(root.path(), &id, &JobInfo::new(3)).unwrap();
        assert!(mailbox.dir().join(STATUS_FILE).is_file());
        assert!(mailbox.dir().join(INFO_FILE).is_file());
    }
}
