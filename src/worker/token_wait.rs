// src/worker/token_wait.rs

//! Token-wait phase: keep the mailbox's login token current until the user
//! has consumed (scanned) it.

use tracing::{debug, info};

use crate::automation::Automation;
use crate::errors::{HarvestError, Result};
use crate::mailbox::MailboxWriter;
use crate::status::StatusRecord;

use super::Worker;

impl<M: MailboxWriter> Worker<M> {
    /// Poll the session until the login token is consumed.
    ///
    /// Each *distinct* rendered token is written to the mailbox and bumps the
    /// `WAITING_SCAN` progress by one; a repeated token changes nothing.
    ///
    /// A timeout while rendering is tolerated only if the login turns out to
    /// have been consumed in the meantime (the page was switching away from
    /// the token); otherwise it ends the job.
    pub(super) async fn wait_for_login<A: Automation>(&mut self, session: &mut A) -> Result<()> {
        let mut last_token: Option<String> = None;
        let mut rendered: u32 = 0;

        loop {
            if session.is_login_consumed().await? {
                info!(job = %self.mailbox.job_id(), tokens = rendered, "login token consumed");
                return Ok(());
            }

            debug!(job = %self.mailbox.job_id(), "checking login token");
            let token = match session.render_login_token().await {
                Ok(token) => token,
                Err(HarvestError::Timeout(detail)) => {
                    if session.is_login_consumed().await? {
                        info!(
                            job = %self.mailbox.job_id(),
                            "token render timed out but login was consumed meanwhile"
                        );
                        return Ok(());
                    }
                    return Err(HarvestError::Timeout(detail));
                }
                Err(e) => return Err(e),
            };

            if last_token.as_deref() != Some(token.as_str()) {
                self.mailbox.write_token(&token)?;
                rendered += 1;
                self.publish(StatusRecord::waiting_scan(rendered))?;
                info!(job = %self.mailbox.job_id(), progress = rendered, "published new login token");
                last_token = Some(token);
            }

            self.pause().await;
        }
    }
}
