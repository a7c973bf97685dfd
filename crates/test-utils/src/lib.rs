pub mod builders;
pub mod fake_renderer;

use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use eyerender::errors::{RenderError, Result};
use eyerender::job::JobSpec;
use eyerender::logging::{LOG_ENV_VAR, log_filter};
use tracing_subscriber::fmt;

static INIT: Once = Once::new();

/// Upper bound for any single supervisor run in tests.
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialise tracing for tests, using the same filter rules as the binary.
///
/// Logs are captured per-test and only printed for failing tests. Set e.g.
/// `EYERENDER_LOG=eyerender=debug,eyerender::renderer_output=trace` to see
/// supervisor decisions together with every line the fake renderer printed.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env = std::env::var(LOG_ENV_VAR).ok();
        fmt()
            .with_env_filter(log_filter(None, env.as_deref()))
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a supervisor future, failing the test after [`RENDER_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(RENDER_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("render did not finish within {RENDER_TIMEOUT:?}"))
}

/// A background PNG job writing to `dir/out/eye.png`.
pub fn png_job(dir: &Path) -> JobSpec {
    JobSpec::new("import bpy\nrender()", dir.join("out").join("eye.png"))
        .expect("png is a supported extension")
}

/// A locator that never finds a renderer.
pub fn missing_binary_locator() -> impl Fn() -> Result<PathBuf> + Send + Sync + 'static {
    || Err(RenderError::BinaryNotFound("nothing on PATH".to_string()))
}

/// A locator that resolves to a path nobody can execute, so every spawn
/// fails.
pub fn unspawnable_locator(dir: &Path) -> impl Fn() -> Result<PathBuf> + Send + Sync + 'static {
    let path = dir.join("no-such-blender");
    move || Ok(path.clone())
}
