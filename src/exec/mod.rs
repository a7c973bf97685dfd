// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the renderer, using
//! `tokio::process::Command`, and turning its output into progress reports
//! and a final [`JobOutcome`](crate::job::JobOutcome).
//!
//! - [`stream`] merges the child's stdout and stderr into one line sequence.
//! - [`supervisor`] owns the process lifecycle: spawn, drain output, retry
//!   failed attempts, and place the rendered image.

pub mod stream;
pub mod supervisor;

pub use stream::{MuxEvent, OutputLine, ReaderSummary, StreamMultiplexer};
pub use supervisor::{RenderSettings, Supervisor, build_args};
