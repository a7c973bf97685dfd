//! Shell scripts standing in for the renderer in integration tests.
//!
//! The script understands the `-o <template>` argument the supervisor
//! passes and writes a small file to the template with `####` replaced by
//! `0000`, just like a real frame-0 render. Every invocation bumps a counter
//! file so tests can count spawns.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Bytes the fake renderer writes as its "image".
pub const FAKE_IMAGE: &[u8] = b"fake-image";

/// Progress line printed on stdout by every invocation.
pub const PROGRESS_LINE: &str = "Fra:1 Mem:10.5M (0.00M, Peak 12.0M) | Remaining:00:01.23 | Scene, RenderLayer | Path Tracing Tile 3/10, Sample 5/20";

/// Traceback written by [`Behaviour::CrashWithTraceback`].
pub const FAKE_TRACEBACK: &str =
    "Traceback (most recent call last):\n  File \"scene.py\", line 3, in <module>\nNameError: name 'boom' is not defined";

#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Render and exit 0.
    Succeed,
    /// Exit with code 3 for the first `n` invocations, then succeed.
    FailTimes(u32),
    /// Never succeed; always exit with the given code.
    AlwaysFail(i32),
    /// Exit 0 without writing an image.
    SucceedWithoutImage,
    /// Append [`FAKE_TRACEBACK`] to the given log, as the scene script's
    /// exception handler does, then exit 1.
    CrashWithTraceback(PathBuf),
    /// Record the pid, then sleep far longer than any test runs.
    Hang,
}

pub struct FakeRenderer {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeRenderer {
    pub fn new(behaviour: Behaviour) -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new().prefix("fake-renderer-").tempdir()?;
        let binary = dir.path().join("blender");
        let script = render_script(dir.path(), behaviour);
        fs::write(&binary, script)?;
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))?;
        Ok(Self { dir, binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// How many times the script has been started.
    pub fn spawn_count(&self) -> u32 {
        fs::read_to_string(self.counter_path())
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Pid written by a [`Behaviour::Hang`] renderer, once it has started.
    pub fn pid(&self) -> Option<u32> {
        fs::read_to_string(self.pid_path())
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// A locator that always resolves to this script.
    pub fn locator(&self) -> impl Fn() -> eyerender::errors::Result<PathBuf> + Send + Sync + 'static {
        let binary = self.binary.clone();
        move || Ok(binary.clone())
    }

    fn counter_path(&self) -> PathBuf {
        self.dir.path().join("count")
    }

    fn pid_path(&self) -> PathBuf {
        self.dir.path().join("pid")
    }
}

fn render_script(dir: &Path, behaviour: Behaviour) -> String {
    let counter = dir.join("count");
    let pid_file = dir.join("pid");

    let tail = match behaviour {
        Behaviour::Succeed => "write_image\nexit 0".to_string(),
        Behaviour::FailTimes(n) => format!(
            "if [ \"$count\" -le {n} ]; then\n  echo \"crash on attempt $count\" >&2\n  exit 3\nfi\nwrite_image\nexit 0"
        ),
        Behaviour::AlwaysFail(code) => {
            format!("echo \"crash on attempt $count\" >&2\nexit {code}")
        }
        Behaviour::SucceedWithoutImage => "exit 0".to_string(),
        Behaviour::CrashWithTraceback(log) => format!(
            "printf '%s\\n' '{}' >> '{}'\necho 'Error: Python script fail, look in the console for now...' >&2\nexit 1",
            FAKE_TRACEBACK.replace('\'', "'\\''"),
            log.display()
        ),
        Behaviour::Hang => format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    };

    format!(
        r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
  esac
  shift
done

write_image() {{
  printf 'fake-image' > "$(printf '%s' "$out" | sed 's/####/0000/')"
}}

count=$(cat '{counter}' 2>/dev/null || echo 0)
count=$((count + 1))
echo "$count" > '{counter}'

echo "attempt $count starting"
echo '{PROGRESS_LINE}'
{tail}
"#,
        counter = counter.display(),
    )
}
