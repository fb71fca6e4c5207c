// src/mailbox/lock.rs

//! Cross-process mutual exclusion for a mailbox.
//!
//! Uses an advisory exclusive lock (`flock` on unix, `LockFileEx` on Windows)
//! on the mailbox's `lock.file`. The lock belongs to the open file
//! description, so two handles in the same process exclude each other just
//! like two processes do.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;
use tracing::warn;

/// RAII guard: the lock is held until the guard is dropped.
#[derive(Debug)]
pub struct MailboxLock {
    file: File,
}

impl MailboxLock {
    /// Block until the exclusive lock on `path` is acquired.
    ///
    /// Fails with `io::ErrorKind::NotFound` if the directory holding `path`
    /// no longer exists.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for MailboxLock {
    fn drop(&mut self) {
        // Closing the file releases the lock anyway; unlock explicitly so a
        // failure shows up in the logs.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "failed to release mailbox lock");
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}
