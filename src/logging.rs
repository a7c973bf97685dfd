// src/logging.rs

//! Logging setup for `eyerender` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `EYERENDER_LOG`, either a bare level ("debug") or full filter
//!    directives ("eyerender=debug,eyerender::renderer_output=trace")
//! 3. default to `info`
//!
//! A bare level applies to eyerender's own targets; other crates stay at
//! `warn`. Raw renderer output is logged under [`RENDERER_OUTPUT_TARGET`] and
//! is only shown at `trace`, or when a directive names that target.
//!
//! Logs are sent to STDERR so that stdout carries only render progress and
//! command output.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "EYERENDER_LOG";

/// Target of the per-line renderer output events.
pub const RENDERER_OUTPUT_TARGET: &str = "eyerender::renderer_output";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = log_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Build the filter from the CLI level or the `EYERENDER_LOG` value.
///
/// Unparseable environment values fall back to `info`.
pub fn log_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(default_directives(level_from_log_level(lvl)));
    }

    match env_value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => match parse_level_str(value) {
            Some(level) => EnvFilter::new(default_directives(level)),
            None => EnvFilter::try_new(value)
                .unwrap_or_else(|_| EnvFilter::new(default_directives(Level::INFO))),
        },
        None => EnvFilter::new(default_directives(Level::INFO)),
    }
}

fn default_directives(level: Level) -> String {
    let level_name = level.as_str().to_ascii_lowercase();
    let output = if level == Level::TRACE { "trace" } else { "off" };
    format!("warn,eyerender={level_name},{RENDERER_OUTPUT_TARGET}={output}")
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Run `f` with a subscriber at `level` and return what it logged.
#[cfg(test)]
pub(crate) fn capture_logs(level: Level, f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new(default_directives(level)))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_target(true)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
