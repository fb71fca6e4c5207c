// src/worker/mod.rs

//! Worker control loop.
//!
//! A worker runs inside its own OS process (see `exec::launcher`), owns one
//! mailbox and one automation session for its whole lifetime, and is the only
//! writer of that mailbox. It goes through two polling phases:
//!
//! - [`token_wait`]: publish every new login token until it is consumed.
//! - [`extraction`]: pull at most `limit` work units, appending their records
//!   to the mailbox as it goes, then compact the result.
//!
//! Every failure, including failing to acquire the session, is caught once in
//! [`Worker::run`], recorded as a terminal `ERROR` status and returned so the
//! process exits non-zero. Nothing is retried.

pub mod extraction;
pub mod token_wait;

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::automation::Automation;
use crate::errors::{HarvestError, Result};
use crate::mailbox::{Mailbox, MailboxWriter};
use crate::status::{StatusRecord, StatusTracker};

/// Default delay between two polls of the automation capability.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct Worker<M = Mailbox> {
    mailbox: M,
    limit: usize,
    poll_interval: Duration,
    tracker: StatusTracker,
}

impl<M: MailboxWriter> Worker<M> {
    pub fn new(mailbox: M, limit: usize) -> Self {
        Self {
            mailbox,
            limit,
            poll_interval: DEFAULT_POLL_INTERVAL,
            tracker: StatusTracker::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the job to completion.
    ///
    /// `connect` acquires the automation session; it is only polled after
    /// `STARTING` has been written, inside the failure boundary. On success
    /// the mailbox ends in `DONE`; on failure it ends in `ERROR` and the error
    /// is returned.
    pub async fn run<A>(mut self, connect: impl Future<Output = Result<A>>) -> Result<()>
    where
        A: Automation,
    {
        let job = self.mailbox.job_id().clone();
        info!(job = %job, limit = self.limit, "worker started");

        match self.drive(connect).await {
            Ok(()) => {
                info!(job = %job, "worker finished");
                Ok(())
            }
            Err(err) => {
                error!(job = %job, error = %err, "worker failed");
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn drive<A>(&mut self, connect: impl Future<Output = Result<A>>) -> Result<()>
    where
        A: Automation,
    {
        self.publish(StatusRecord::starting())?;
        let mut session = connect.await?;
        self.wait_for_login(&mut session).await?;
        self.extract(&mut session).await?;
        self.publish(StatusRecord::done())
    }

    /// Check `record` against the lifecycle DAG, then persist it.
    ///
    /// The tracker only moves forward once the write has succeeded, so a
    /// failed write can still be followed by `ERROR`.
    fn publish(&mut self, record: StatusRecord) -> Result<()> {
        let mut next = self.tracker.clone();
        next.advance(&record)?;
        self.mailbox.set_status(&record)?;
        self.tracker = next;
        Ok(())
    }

    fn record_failure(&mut self, err: &HarvestError) {
        if self.tracker.is_terminal() {
            warn!(
                job = %self.mailbox.job_id(),
                status = ?self.tracker.current(),
                "job already terminal; not recording failure"
            );
            return;
        }

        let record = StatusRecord::error(err.status_message());
        if let Err(e) = self.publish(record) {
            error!(job = %self.mailbox.job_id(), error = %e, "failed to record ERROR status");
        }
    }

    async fn pause(&self) {
        if !self.poll_interval.is_zero() {
            sleep(self.poll_interval).await;
        }
    }
}
