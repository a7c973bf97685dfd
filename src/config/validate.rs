// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{RenderError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RenderError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.renderer, raw.retry, raw.scene))
    }
}

/// Run every check on an unvalidated config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_retry(cfg)?;
    validate_renderer(cfg)?;
    cfg.scene.validate()?;
    Ok(())
}

fn validate_retry(cfg: &RawConfigFile) -> Result<()> {
    if cfg.retry.max_attempts == Some(0) {
        return Err(RenderError::ConfigError(
            "[retry].max_attempts must be >= 1 (got 0); omit it to retry indefinitely".to_string(),
        ));
    }
    Ok(())
}

fn validate_renderer(cfg: &RawConfigFile) -> Result<()> {
    if cfg.renderer.model.as_os_str().is_empty() {
        return Err(RenderError::ConfigError(
            "[renderer].model must not be empty".to_string(),
        ));
    }
    if cfg.renderer.diagnostics_log.as_os_str().is_empty() {
        return Err(RenderError::ConfigError(
            "[renderer].diagnostics_log must not be empty".to_string(),
        ));
    }
    Ok(())
}
