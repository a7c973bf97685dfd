// src/diagnostics.rs

//! On-disk diagnostics log for render jobs.
//!
//! The log holds everything needed to reproduce a failed render without
//! rerunning it: the exact command line, the line-numbered scene script, and
//! every line the renderer printed (tagged `out`/`err`, grouped per attempt).
//! Lines are written and flushed as they arrive so a hung renderer can be
//! inspected live. The file is removed when the job succeeds.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::errors::Result;
use crate::types::StreamSource;

/// Default log location, relative to the working directory.
pub const DEFAULT_DIAGNOSTICS_LOG: &str = "blender_err.log";

#[derive(Debug)]
pub struct DiagnosticsSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl DiagnosticsSink {
    /// Create (or truncate) the log and write the invocation header.
    ///
    /// Failing to create the log is an error; once it exists, later write
    /// failures are only logged.
    pub fn open(
        path: impl Into<PathBuf>,
        command_line: &str,
        script_path: &Path,
        script_text: &str,
    ) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // The scene script appends its traceback to this same file, so every
        // write must land at the current end rather than at our own offset.
        File::create(&path)?;
        let file = OpenOptions::new().append(true).open(&path)?;
        let mut sink = Self {
            path,
            writer: Some(BufWriter::new(file)),
        };
        let header = render_header(command_line, script_path, script_text);
        sink.write_raw(&header);
        debug!(path = %sink.path.display(), "diagnostics log opened");
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the start of a new attempt so output can be attributed.
    pub fn begin_attempt(&mut self, attempt: u32) {
        self.write_raw(&format!("--- attempt {attempt} ---\n"));
    }

    /// Append one captured output line.
    pub fn append(&mut self, source: StreamSource, line: &str) {
        self.write_raw(&format!("{} | {}\n", source.tag(), line));
    }

    /// Append a free-form note (exit codes, spawn errors).
    pub fn note(&mut self, message: &str) {
        self.write_raw(&format!("# {message}\n"));
    }

    /// Finish the log.
    ///
    /// On success the file is deleted and `None` is returned. Otherwise the
    /// file is kept and its full contents are returned so the caller can
    /// surface them.
    pub fn close(mut self, success: bool) -> Option<String> {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "flushing diagnostics log failed");
            }
        }

        if success {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "removing diagnostics log failed");
            }
            return None;
        }

        let report = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "reading back diagnostics log failed");
                String::new()
            }
        };
        error!(path = %self.path.display(), bytes = report.len(), "render failed; diagnostics log kept");
        Some(report)
    }

    /// Flush and leave the log in place without surfacing it, returning its
    /// path. Used when a job is abandoned rather than failed.
    pub fn keep(mut self) -> PathBuf {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "flushing diagnostics log failed");
            }
        }
        self.path
    }

    fn write_raw(&mut self, text: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let res = writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush());
        if let Err(e) = res {
            warn!(path = %self.path.display(), error = %e, "writing diagnostics log failed");
        }
    }
}

/// Join arguments into a copy-pasteable command line, quoting any argument
/// that contains whitespace.
pub fn format_command_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .map(|arg| {
            let arg = arg.as_ref().to_string_lossy();
            if arg.chars().any(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prefix each script line with a right-aligned 1-based line number.
pub fn number_lines(text: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:>4} | {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_header(command_line: &str, script_path: &Path, script_text: &str) -> String {
    format!(
        "{command_line}\n\n{}:\n------\n{}\n------\n",
        script_path.display(),
        number_lines(script_text)
    )
}
