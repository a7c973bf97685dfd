// src/job.rs

//! Values exchanged between callers and the render supervisor.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::Result;
use crate::types::OutputFormat;

/// Default pause between a failed attempt and the next one.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// One request to render a scene to an output image.
///
/// The script text is opaque to the supervisor; it is written to a temporary
/// file and handed to the renderer unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub script_text: String,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    /// Where the scene script writes its parameter dump, if anywhere.
    pub params_path: Option<PathBuf>,
    pub run_in_background: bool,
    pub sample_count: u32,
}

impl JobSpec {
    /// Create a background job for `output_path`, deriving the image format
    /// from its extension.
    pub fn new(script_text: impl Into<String>, output_path: impl AsRef<Path>) -> Result<Self> {
        let output_path = output_path.as_ref().to_path_buf();
        let output_format = OutputFormat::from_path(&output_path)?;
        Ok(Self {
            script_text: script_text.into(),
            output_path,
            output_format,
            params_path: None,
            run_in_background: true,
            sample_count: 20,
        })
    }

    pub fn with_params_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params_path = Some(path.into());
        self
    }

    pub fn in_background(mut self, background: bool) -> Self {
        self.run_in_background = background;
        self
    }

    pub fn with_sample_count(mut self, samples: u32) -> Self {
        self.sample_count = samples;
        self
    }

    /// Whether the supervisor renders to a temporary file and moves the
    /// result to `output_path` afterwards.
    ///
    /// In foreground mode, or with zero samples, the renderer is not asked
    /// to render a frame and the scene script owns the output.
    pub fn renders_frame(&self) -> bool {
        self.run_in_background && self.sample_count > 0
    }
}

/// How often and how patiently failed attempts are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed; `None` retries until success or cancellation.
    pub max_attempts: Option<NonZeroU32>,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn unlimited() -> Self {
        Self {
            max_attempts: None,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// At most `attempts` attempts (clamped to at least one).
    pub fn bounded(attempts: u32) -> Self {
        Self {
            max_attempts: Some(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN)),
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max.get(),
            None => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The renderer exited cleanly; `artifact` is the requested output path.
    Success { artifact: PathBuf },
    /// Every allowed attempt failed.
    Failed {
        /// Exit code of the last attempt (`-1` for signals or spawn errors).
        exit_code: i32,
        attempts: u32,
        diagnostics_path: PathBuf,
        /// Full diagnostics log: command line, numbered script, all output.
        report: String,
    },
    /// The caller cancelled the job; the renderer was terminated.
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }
}
