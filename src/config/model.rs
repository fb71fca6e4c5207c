// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [mailbox]
/// root = "/dev/shm/harvest"
///
/// [worker]
/// poll_interval_ms = 500
/// default_limit = 2
///
/// [automation]
/// command = "harvest-bridge"
/// args = ["--profile", "/var/lib/harvest/browser"]
/// timeout_exit_code = 124
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub mailbox: MailboxSection,

    #[serde(default)]
    pub worker: WorkerSection,

    #[serde(default)]
    pub automation: AutomationSection,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub mailbox: MailboxSection,
    pub worker: WorkerSection,
    pub automation: AutomationSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        mailbox: MailboxSection,
        worker: WorkerSection,
        automation: AutomationSection,
    ) -> Self {
        Self {
            mailbox,
            worker,
            automation,
        }
    }
}

/// `[mailbox]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailboxSection {
    /// Directory holding one mailbox per job.
    ///
    /// Mailboxes may hold extracted personal data, so this should live on
    /// volatile storage (e.g. `/dev/shm`). Defaults to `<temp dir>/harvest`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl MailboxSection {
    pub fn effective_root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("harvest"))
    }
}

/// `[worker]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSection {
    /// Delay between two polls of the automation capability.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Work-unit limit used when `create` is called without `--limit`.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_limit() -> usize {
    2
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            default_limit: default_limit(),
        }
    }
}

impl WorkerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[automation]` section: how to reach the bridge program.
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationSection {
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments placed before the subcommand on every invocation.
    #[serde(default)]
    pub args: Vec<String>,

    /// Exit code the bridge uses to report a timeout.
    #[serde(default = "default_timeout_exit_code")]
    pub timeout_exit_code: i32,
}

fn default_command() -> String {
    "harvest-bridge".to_string()
}

fn default_timeout_exit_code() -> i32 {
    124
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            timeout_exit_code: default_timeout_exit_code(),
        }
    }
}
