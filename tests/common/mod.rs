#![allow(dead_code)]

use std::path::Path;

use serde_json::Value;

use harvest::job_id::JobId;
use harvest::mailbox::Mailbox;
use harvest::types::JobInfo;

pub use harvest_test_utils::init_tracing;

/// A freshly created mailbox under `root`, seeded for a job of `limit` units.
pub fn fresh_mailbox(root: &Path, limit: usize) -> Mailbox {
    Mailbox::create(root, &JobId::generate(), &JobInfo::new(limit))
        .expect("failed to create mailbox")
}

/// Parse a compacted result record.
pub fn result_array(raw: &str) -> Vec<Value> {
    serde_json::from_str(raw).expect("result is not a JSON array")
}
