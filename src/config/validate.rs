// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HarvestError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::HarvestError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.mailbox, raw.worker, raw.automation))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_mailbox(cfg)?;
    validate_worker(cfg)?;
    validate_automation(cfg)?;
    Ok(())
}

fn validate_mailbox(cfg: &RawConfigFile) -> Result<()> {
    if let Some(root) = &cfg.mailbox.root {
        if root.as_os_str().is_empty() {
            return Err(HarvestError::Config(
                "[mailbox].root must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_worker(cfg: &RawConfigFile) -> Result<()> {
    if cfg.worker.poll_interval_ms == 0 {
        return Err(HarvestError::Config(
            "[worker].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_automation(cfg: &RawConfigFile) -> Result<()> {
    if cfg.automation.command.trim().is_empty() {
        return Err(HarvestError::Config(
            "[automation].command must not be empty".to_string(),
        ));
    }
    if cfg.automation.timeout_exit_code == 0 {
        return Err(HarvestError::Config(
            "[automation].timeout_exit_code must be non-zero (0 means success)".to_string(),
        ));
    }
    Ok(())
}
