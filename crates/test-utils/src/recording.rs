use std::sync::{Arc, Mutex};

use serde_json::Value;

use harvest::errors::{HarvestError, Result};
use harvest::job_id::JobId;
use harvest::mailbox::{Mailbox, MailboxWriter};
use harvest::status::StatusRecord;

/// One write a worker made to its mailbox, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Status(StatusRecord),
    Token(String),
    Append(usize),
    Compact(usize),
}

/// A mailbox writer that forwards to a real [`Mailbox`] and records every
/// write, so tests can assert on the full sequence rather than just the final
/// state.
///
/// `fail_status_writes_after(n)` makes every status write after the first `n`
/// fail with an I/O error without touching the mailbox.
#[derive(Debug, Clone)]
pub struct RecordingMailbox {
    inner: Mailbox,
    writes: Arc<Mutex<Vec<Write>>>,
    status_budget: Option<usize>,
}

impl RecordingMailbox {
    pub fn new(inner: Mailbox) -> Self {
        Self {
            inner,
            writes: Arc::new(Mutex::new(Vec::new())),
            status_budget: None,
        }
    }

    pub fn fail_status_writes_after(mut self, n: usize) -> Self {
        self.status_budget = Some(n);
        self
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                Write::Status(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                Write::Token(token) => Some(token),
                _ => None,
            })
            .collect()
    }

    fn status_writes(&self) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| matches!(w, Write::Status(_)))
            .count()
    }
}

impl MailboxWriter for RecordingMailbox {
    fn job_id(&self) -> &JobId {
        self.inner.id()
    }

    fn set_status(&self, record: &StatusRecord) -> Result<()> {
        if let Some(budget) = self.status_budget {
            if self.status_writes() >= budget {
                return Err(HarvestError::Io(std::io::Error::other(
                    "status write refused by test",
                )));
            }
        }
        self.inner.set_status(record)?;
        self.writes
            .lock()
            .unwrap()
            .push(Write::Status(record.clone()));
        Ok(())
    }

    fn write_token(&self, token: &str) -> Result<()> {
        self.inner.write_token(token)?;
        self.writes
            .lock()
            .unwrap()
            .push(Write::Token(token.to_string()));
        Ok(())
    }

    fn append_results(&self, records: &[Value]) -> Result<()> {
        self.inner.append_results(records)?;
        self.writes.lock().unwrap().push(Write::Append(records.len()));
        Ok(())
    }

    fn compact_results(&self) -> Result<usize> {
        let n = self.inner.compact_results()?;
        self.writes.lock().unwrap().push(Write::Compact(n));
        Ok(n)
    }
}
