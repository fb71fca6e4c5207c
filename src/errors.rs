// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// A job id or its mailbox could not be allocated; no job exists.
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// The job id does not name an existing mailbox.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The automation capability stalled (e.g. rendering the login token).
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other failure reported by the automation capability.
    #[error("Automation failure: {0}")]
    Automation(String),

    /// A status write that would break the lifecycle DAG.
    #[error("Illegal status transition: {0}")]
    IllegalTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HarvestError {
    /// Stable name of the failure kind, used as the prefix of `ERROR`
    /// status messages (`"<kind>: <detail>"`).
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::Allocation(_) => "AllocationError",
            HarvestError::NotFound(_) => "NotFoundError",
            HarvestError::Timeout(_) => "TimeoutCondition",
            HarvestError::Automation(_) => "AutomationFailure",
            HarvestError::IllegalTransition(_) => "IllegalTransition",
            HarvestError::Config(_) => "ConfigError",
            HarvestError::Io(_) => "IoError",
            HarvestError::Json(_) => "JsonError",
            HarvestError::Toml(_) => "TomlError",
            HarvestError::Other(_) => "WorkerFailure",
        }
    }

    /// The failure detail without the variant's display prefix.
    pub fn detail(&self) -> String {
        match self {
            HarvestError::Allocation(msg)
            | HarvestError::NotFound(msg)
            | HarvestError::Timeout(msg)
            | HarvestError::Automation(msg)
            | HarvestError::IllegalTransition(msg)
            | HarvestError::Config(msg) => msg.clone(),
            HarvestError::Io(e) => e.to_string(),
            HarvestError::Json(e) => e.to_string(),
            HarvestError::Toml(e) => e.to_string(),
            HarvestError::Other(e) => format!("{e:#}"),
        }
    }

    /// Message recorded in the mailbox when a worker fails with this error:
    /// `"<kind>: <detail>"`.
    pub fn status_message(&self) -> String {
        format!("{}: {}", self.kind(), self.detail())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HarvestError>;
