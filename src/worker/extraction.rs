// src/worker/extraction.rs

//! Extraction phase.

use serde_json::Value;
use tracing::info;

use crate::automation::Automation;
use crate::errors::Result;
use crate::mailbox::MailboxWriter;
use crate::status::{StatusRecord, scrape_progress};

use super::Worker;

impl<M: MailboxWriter> Worker<M> {
    /// Process up to `limit` work units, then compact the result record.
    ///
    /// Records of a unit are appended before its progress is published, so
    /// everything reported so far survives a crash of this process. The limit
    /// is enforced here; the session's sequence may be longer or unbounded.
    pub(super) async fn extract<A: Automation>(&mut self, session: &mut A) -> Result<()> {
        let limit = self.limit;
        self.publish(StatusRecord::scraping(0, "Starting extraction"))?;

        let mut total = 0usize;
        let mut units = session.work_units().await?;

        for index in 1..=limit {
            let Some(unit) = units.next().await else {
                info!(job = %self.mailbox.job_id(), pulled = index - 1, "work units exhausted");
                break;
            };
            let unit = unit?;

            let mut records: Vec<Value> = Vec::new();
            let mut stream = session.extract_records(&unit).await?;
            while let Some(record) = stream.next().await {
                records.push(record?);
            }

            total += records.len();
            self.mailbox.append_results(&records)?;

            let progress = scrape_progress(index, limit);
            self.publish(StatusRecord::scraping(
                progress,
                format!(
                    "Extracted unit {index}/{limit}: {} [{total} records found]",
                    unit.display_name()
                ),
            ))?;
            info!(
                job = %self.mailbox.job_id(),
                unit = %unit.id,
                index,
                records = records.len(),
                total,
                progress,
                "extracted work unit"
            );
        }
        // Stop the unit producer before compacting.
        drop(units);

        let compacted = self.mailbox.compact_results()?;
        info!(job = %self.mailbox.job_id(), records = compacted, "extraction complete");
        Ok(())
    }
}
