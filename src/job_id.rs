// src/job_id.rs

//! Unguessable job identifiers.
//!
//! A `JobId` is the only access-control mechanism for a job: whoever knows it
//! can read the job's status, login token and result. It is 32 bytes from the
//! OS random number generator, encoded as unpadded base64url (43 characters),
//! so it is safe to embed in URLs and file names.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;

use crate::errors::HarvestError;

/// Number of random bytes behind each id.
const ID_BYTES: usize = 32;

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{43}$").expect("static job id regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Allocate a fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        JobId(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an id coming from outside (CLI argument, URL segment).
///
/// Anything that could not have been produced by [`JobId::generate`] is
/// reported as `NotFound`: it cannot name a mailbox, and rejecting it here
/// keeps path separators and `..` out of mailbox paths.
impl FromStr for JobId {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if JOB_ID_RE.is_match(s) {
            Ok(JobId(s.to_string()))
        } else {
            Err(HarvestError::NotFound(s.to_string()))
        }
    }
}
