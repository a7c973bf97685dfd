// src/exec/supervisor.rs

//! Render job supervisor.
//!
//! Runs the renderer until it exits cleanly, retrying crashed attempts
//! according to the [`RetryPolicy`], and moves the rendered image into place.
//!
//! Every attempt owns its child process (spawned with `kill_on_drop`) and a
//! [`StreamMultiplexer`] whose readers are joined before the next attempt
//! starts, so no process or reader outlives the attempt that created it.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::diagnostics::{DEFAULT_DIAGNOSTICS_LOG, DiagnosticsSink, format_command_line};
use crate::errors::{RenderError, Result};
use crate::exec::stream::{MuxEvent, OutputLine, StreamMultiplexer};
use crate::job::{JobOutcome, JobSpec, RetryPolicy};
use crate::lease::RendererLease;
use crate::locate::BinaryLocator;
use crate::logging::RENDERER_OUTPUT_TARGET;
use crate::progress::{self, ProgressRecord};

/// Output file name the renderer produces for frame 0.
const RENDER_FILE_NAME: &str = "render0000";
/// Output template passed with `-o`; `####` is replaced by the frame number.
const RENDER_FILE_TEMPLATE: &str = "render####";
const SCRIPT_FILE_NAME: &str = "scene.py";

/// Knobs shared by every job a [`Supervisor`] runs.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Scene file loaded by the renderer before the script runs.
    pub model_path: PathBuf,
    /// Where the diagnostics log lives while a job is running or failed.
    pub diagnostics_path: PathBuf,
    pub retry: RetryPolicy,
    /// Upper bound on each wait for renderer output.
    pub poll_interval: Duration,
    /// Parent directory for per-job scratch directories; system temp if unset.
    pub scratch_root: Option<PathBuf>,
}

impl RenderSettings {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            diagnostics_path: PathBuf::from(DEFAULT_DIAGNOSTICS_LOG),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(100),
            scratch_root: None,
        }
    }
}

/// How a single attempt ended.
#[derive(Debug)]
enum AttemptEnd {
    Exited(i32),
    SpawnFailed(io::Error),
    Cancelled,
}

pub struct Supervisor<L> {
    settings: RenderSettings,
    locator: L,
}

impl<L: BinaryLocator> Supervisor<L> {
    pub fn new(settings: RenderSettings, locator: L) -> Self {
        Self { settings, locator }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `spec`, retrying failed attempts.
    ///
    /// Configuration problems (renderer not found, scratch files that cannot
    /// be created, a missing render result) are returned as errors. Renderer
    /// crashes are retried and only reported, as [`JobOutcome::Failed`], once
    /// the retry policy gives up. Cancelling `cancel` kills the renderer and
    /// yields [`JobOutcome::Cancelled`].
    pub async fn run<F>(
        &self,
        _lease: &RendererLease,
        spec: &JobSpec,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome>
    where
        F: FnMut(&ProgressRecord),
    {
        let binary = self.locator.locate()?;
        info!(
            binary = %binary.display(),
            output = %spec.output_path.display(),
            format = %spec.output_format,
            "starting render job"
        );

        let scratch = self.scratch_dir()?;
        let script_path = scratch.path().join(SCRIPT_FILE_NAME);
        fs::write(&script_path, &spec.script_text)?;
        let rendered = scratch.path().join(RENDER_FILE_NAME);

        let args = build_args(
            &self.settings.model_path,
            &script_path,
            &scratch.path().join(RENDER_FILE_TEMPLATE),
            spec,
        );
        let command_line = format_command_line(
            std::iter::once(binary.as_os_str()).chain(args.iter().map(OsString::as_os_str)),
        );
        debug!(%command_line, "renderer invocation");

        let mut sink = DiagnosticsSink::open(
            &self.settings.diagnostics_path,
            &command_line,
            &script_path,
            &spec.script_text,
        )?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            sink.begin_attempt(attempt);
            discard(&rendered);

            let end = self
                .run_attempt(attempt, &binary, &args, &mut sink, &mut on_progress, cancel)
                .await;

            let exit_code = match end {
                AttemptEnd::Exited(0) => {
                    info!(attempt, "renderer finished");
                    break;
                }
                AttemptEnd::Cancelled => return Ok(cancelled(sink)),
                AttemptEnd::Exited(code) => {
                    warn!(attempt, exit_code = code, "renderer failed");
                    sink.note(&format!("renderer exited with code {code}"));
                    code
                }
                AttemptEnd::SpawnFailed(e) => {
                    warn!(attempt, error = %e, "failed to start renderer");
                    sink.note(&format!("failed to start renderer: {e}"));
                    -1
                }
            };
            discard(&rendered);

            if !self.settings.retry.allows_retry_after(attempt) {
                let diagnostics_path = sink.path().to_path_buf();
                let report = sink.close(false).unwrap_or_default();
                return Ok(JobOutcome::Failed {
                    exit_code,
                    attempts: attempt,
                    diagnostics_path,
                    report,
                });
            }

            let backoff = self.settings.retry.backoff;
            info!(
                attempt,
                max_attempts = ?self.settings.retry.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                "retrying renderer after backoff"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(cancelled(sink)),
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        if spec.renders_frame() {
            if let Err(e) = place_artifact(&rendered, &spec.output_path) {
                sink.note(&format!("could not move render result into place: {e:#}"));
                sink.close(false);
                return Err(RenderError::Other(e));
            }
            info!(output = %spec.output_path.display(), "moved image into place");
        }

        sink.close(true);
        Ok(JobOutcome::Success {
            artifact: spec.output_path.clone(),
        })
    }

    async fn run_attempt<F>(
        &self,
        attempt: u32,
        binary: &Path,
        args: &[OsString],
        sink: &mut DiagnosticsSink,
        on_progress: &mut F,
        cancel: &CancellationToken,
    ) -> AttemptEnd
    where
        F: FnMut(&ProgressRecord),
    {
        if cancel.is_cancelled() {
            return AttemptEnd::Cancelled;
        }

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return AttemptEnd::SpawnFailed(e),
        };
        info!(attempt, pid = child.id(), "renderer started");

        let mut mux = StreamMultiplexer::attach(child.stdout.take(), child.stderr.take());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child, attempt).await;
                    mux.finish().await;
                    return AttemptEnd::Cancelled;
                }
                event = mux.next_event(self.settings.poll_interval) => match event {
                    MuxEvent::Line(line) => handle_line(&line, sink, on_progress),
                    MuxEvent::Idle => trace!(attempt, "renderer quiet"),
                    MuxEvent::Finished => break,
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child, attempt).await;
                mux.finish().await;
                return AttemptEnd::Cancelled;
            }
            status = child.wait() => status,
        };

        for summary in mux.finish().await {
            if let Some(e) = summary.error {
                sink.note(&format!("{} stream ended with error: {e}", summary.source));
            }
        }

        match status {
            Ok(status) => AttemptEnd::Exited(status.code().unwrap_or(-1)),
            Err(e) => {
                warn!(attempt, error = %e, "waiting for renderer failed");
                AttemptEnd::Exited(-1)
            }
        }
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("eyerender-");
        let dir = match &self.settings.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Renderer arguments after the binary, in the order the renderer expects.
pub fn build_args(
    model: &Path,
    script: &Path,
    output_template: &Path,
    spec: &JobSpec,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        model.into(),
        "--enable-autoexec".into(),
        "--verbose".into(),
        "0".into(),
        "--python".into(),
        script.into(),
        "-o".into(),
        output_template.into(),
        "--render-format".into(),
        spec.output_format.render_flag().into(),
        "-noaudio".into(),
        "--use-extension".into(),
        "0".into(),
    ];
    if spec.run_in_background {
        args.push("--background".into());
        if spec.sample_count > 0 {
            args.push("--render-frame".into());
            args.push("0".into());
        }
    }
    args
}

fn handle_line<F>(line: &OutputLine, sink: &mut DiagnosticsSink, on_progress: &mut F)
where
    F: FnMut(&ProgressRecord),
{
    sink.append(line.source, &line.text);
    match progress::parse(&line.text) {
        Some(record) => {
            info!(
                percent = record.percent(),
                tile = record.tile,
                sample = record.sample,
                remaining = %record.time_remaining,
                "render progress"
            );
            on_progress(&record);
        }
        None => trace!(
            target: RENDERER_OUTPUT_TARGET,
            stream = %line.source,
            seq = line.sequence,
            "{}",
            line.text
        ),
    }
}

async fn terminate(child: &mut Child, attempt: u32) {
    info!(attempt, "cancellation requested; killing renderer");
    if let Err(e) = child.kill().await {
        warn!(attempt, error = %e, "failed to kill renderer");
    }
}

fn cancelled(mut sink: DiagnosticsSink) -> JobOutcome {
    sink.note("render cancelled");
    let path = sink.keep();
    info!(diagnostics = %path.display(), "render cancelled");
    JobOutcome::Cancelled
}

/// Remove a stale render result, ignoring "not found".
fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "discarded render result"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not discard render result"),
    }
}

/// Replace `dest` with the file at `src`.
fn place_artifact(src: &Path, dest: &Path) -> anyhow::Result<()> {
    if !src.is_file() {
        anyhow::bail!("renderer exited cleanly but produced no image at {}", src.display());
    }
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    if dest.exists() {
        fs::remove_file(dest).with_context(|| format!("removing existing {}", dest.display()))?;
    }
    if fs::rename(src, dest).is_err() {
        // Scratch space may live on another filesystem.
        fs::copy(src, dest)
            .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
        fs::remove_file(src).with_context(|| format!("removing {}", src.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_render_args_match_renderer_contract() {
        let spec = JobSpec::new("", "eye.jpg").unwrap();
        let args = build_args(
            Path::new("model.blend"),
            Path::new("/tmp/s/scene.py"),
            Path::new("/tmp/s/render####"),
            &spec,
        );
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "model.blend",
                "--enable-autoexec",
                "--verbose",
                "0",
                "--python",
                "/tmp/s/scene.py",
                "-o",
                "/tmp/s/render####",
                "--render-format",
                "JPEG",
                "-noaudio",
                "--use-extension",
                "0",
                "--background",
                "--render-frame",
                "0",
            ]
        );
    }

    #[test]
    fn foreground_and_sampleless_jobs_skip_render_flags() {
        let spec = JobSpec::new("", "eye.png").unwrap();
        let template = Path::new("render####");

        let fg = build_args(Path::new("m"), Path::new("s"), template, &spec.clone().in_background(false));
        assert!(!fg.iter().any(|a| a == "--background" || a == "--render-frame"));

        let no_samples =
            build_args(Path::new("m"), Path::new("s"), template, &spec.with_sample_count(0));
        assert!(no_samples.iter().any(|a| a == "--background"));
        assert!(!no_samples.iter().any(|a| a == "--render-frame"));
    }

    #[test]
    fn progress_lines_log_at_info_and_raw_output_stays_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            DiagnosticsSink::open(dir.path().join("err.log"), "cmd", Path::new("s.py"), "").unwrap();
        let mut seen = Vec::new();

        let logs = crate::logging::capture_logs(tracing::Level::INFO, || {
            let mut on_progress = |r: &ProgressRecord| seen.push(r.percent());
            let status = OutputLine {
                source: crate::types::StreamSource::Stdout,
                text: "Fra:1 Mem:10.5M (0.00M, Peak 12.0M) | Remaining:00:01.23 | Scene, RenderLayer | Path Tracing Tile 3/10, Sample 5/20".to_string(),
                sequence: 0,
            };
            let chatter = OutputLine {
                source: crate::types::StreamSource::Stderr,
                text: "Read blend: model.blend".to_string(),
                sequence: 1,
            };
            handle_line(&status, &mut sink, &mut on_progress);
            handle_line(&chatter, &mut sink, &mut on_progress);
        });

        assert_eq!(seen, vec![22]);
        assert!(logs.contains("INFO"), "{logs}");
        assert!(logs.contains("render progress percent=22"), "{logs}");
        assert!(!logs.contains("Read blend"), "{logs}");
        sink.close(true);
    }

    #[test]
    fn placing_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("render0000");
        let dest = dir.path().join("out/eye.png");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        place_artifact(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!src.exists());
    }

    #[test]
    fn placing_without_a_render_result_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = place_artifact(&dir.path().join("render0000"), &dir.path().join("eye.png"))
            .unwrap_err();
        assert!(err.to_string().contains("produced no image"));
    }
}
