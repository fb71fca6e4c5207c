use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

use harvest::errors::Result;
use harvest::exec::WorkerLauncher;
use harvest::job_id::JobId;
use harvest::mailbox::Mailbox;
use harvest::worker::Worker;

use crate::scripted::ScriptedAutomation;

/// A launcher that:
/// - records which jobs were launched and with which limit
/// - runs each worker as a tokio task against a clone of a scripted
///   automation session, without polling delays.
///
/// Must be used from within a tokio runtime (e.g. `#[tokio::test]`).
pub struct TaskLauncher {
    root: PathBuf,
    script: ScriptedAutomation,
    launched: Mutex<Vec<(JobId, usize)>>,
    handles: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl TaskLauncher {
    pub fn new(root: impl Into<PathBuf>, script: ScriptedAutomation) -> Self {
        Self {
            root: root.into(),
            script,
            launched: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn launched(&self) -> Vec<(JobId, usize)> {
        self.launched.lock().unwrap().clone()
    }

    /// Wait for every worker started so far and return their outcomes.
    pub async fn join_all(&self) -> Vec<Result<()>> {
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.expect("worker task panicked"));
        }
        outcomes
    }
}

impl WorkerLauncher for TaskLauncher {
    fn launch(&self, job: &JobId, limit: usize) -> Result<()> {
        let mailbox = Mailbox::open(&self.root, job)?;
        let script = self.script.clone();

        self.launched.lock().unwrap().push((job.clone(), limit));

        let handle = tokio::spawn(
            Worker::new(mailbox, limit)
                .with_poll_interval(Duration::ZERO)
                .run(std::future::ready(Ok(script))),
        );
        self.handles.lock().unwrap().push(handle);
        Ok(())
    }
}
