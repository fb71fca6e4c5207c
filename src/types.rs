// src/types.rs

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One addressable item (e.g. a conversation) the automation capability can
/// enumerate and extract records from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Identifier passed back to the automation capability on extraction.
    pub id: String,

    /// Human-readable name used in progress messages.
    #[serde(default)]
    pub label: String,
}

impl WorkUnit {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Label if present, otherwise the id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Contents of a mailbox's metadata record (`info.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Maximum number of work units the worker will process.
    pub limit: usize,

    /// Creation time, seconds since the Unix epoch.
    pub created_at: u64,
}

impl JobInfo {
    pub fn new(limit: usize) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { limit, created_at }
    }
}
